//! Tokenizer.
//!
//! Line-oriented lexer for the assembly surface syntax. Each source
//! line becomes a token sequence; classification is purely syntactic
//! and per-mnemonic arity is the assembler's business.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Instruction mnemonics.
pub static MNEMONICS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "CLS", "RET", "JP", "CALL", "SE", "SNE", "LD", "ADD", "OR", "AND", "XOR", "SUB", "SUBN",
        "SHR", "SHL", "RND", "DRW", "SKP", "SKNP",
    ]
    .iter()
    .copied()
    .collect()
});

static REGISTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[Vv][0-9A-Fa-f]$").unwrap());
static IMMEDIATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0[xX][0-9A-Fa-f]+|[0-9]+)$").unwrap());

/// Token kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    /// First lexeme on a line, with a trailing `:`.
    LabelDef,
    /// Instruction mnemonic.
    Mnemonic,
    /// General-purpose register `V0..VF`.
    Register,
    /// `I`, `DT` or `ST`.
    SpecialRegister,
    /// `F`, `B` or `K`.
    SpecialMnemonic,
    /// `[I]`.
    MemoryDereference,
    /// Decimal or `0x` hex literal.
    Immediate,
    /// `,` operand separator.
    Comma,
    /// `.byte` raw data directive.
    ByteDirective,
    /// Anything else in operand position.
    LabelRef,
}

/// A classified lexeme.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Raw text.
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: &str) -> Self {
        Token {
            kind,
            text: text.to_string(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]", self.kind, self.text)
    }
}

/// Tokenizer output: one token sequence per source line.
#[derive(Debug, Default)]
pub struct Tokenizer {
    token_lines: Vec<Vec<Token>>,
}

impl Tokenizer {
    /// Tokenize a source string.
    ///
    /// # Arguments
    ///
    /// * `source` - Source code.
    ///
    /// # Returns
    ///
    /// * Tokenizer instance.
    ///
    pub fn new(source: &str) -> Self {
        let token_lines = source
            .lines()
            .map(|line| {
                let stripped = strip_comments(line);
                let normalized = normalize(stripped);
                tokenize_line(&normalized)
            })
            .collect();

        Tokenizer { token_lines }
    }

    /// Get token lines.
    ///
    /// # Returns
    ///
    /// * Token lines.
    ///
    pub fn token_lines(&self) -> &[Vec<Token>] {
        &self.token_lines
    }
}

// Everything from the first `;` belongs to the comment.
fn strip_comments(line: &str) -> &str {
    match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

// Pad commas so they split as standalone lexemes.
fn normalize(line: &str) -> String {
    line.replace(',', " , ")
}

fn tokenize_line(line: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for lexeme in line.split_whitespace() {
        let kind = classify(lexeme, tokens.len());
        tokens.push(Token::new(kind, lexeme));
    }

    tokens
}

// Classification order matters: a label definition only counts at the
// start of a line, and anything unclaimed falls through to LabelRef.
fn classify(lexeme: &str, tokens_so_far: usize) -> TokenKind {
    if tokens_so_far == 0 && lexeme.ends_with(':') {
        TokenKind::LabelDef
    } else if MNEMONICS.contains(lexeme.to_uppercase().as_str()) {
        TokenKind::Mnemonic
    } else if lexeme == "," {
        TokenKind::Comma
    } else if REGISTER_RE.is_match(lexeme) {
        TokenKind::Register
    } else if lexeme == "I" || lexeme == "DT" || lexeme == "ST" {
        TokenKind::SpecialRegister
    } else if lexeme == "[I]" {
        TokenKind::MemoryDereference
    } else if IMMEDIATE_RE.is_match(lexeme) {
        TokenKind::Immediate
    } else if lexeme == "F" || lexeme == "B" || lexeme == "K" {
        TokenKind::SpecialMnemonic
    } else if lexeme == ".byte" {
        TokenKind::ByteDirective
    } else {
        TokenKind::LabelRef
    }
}
