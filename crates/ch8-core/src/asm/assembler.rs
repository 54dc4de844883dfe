//! Assembler.
//!
//! Two-pass translation. The first pass walks the token lines and
//! assigns an emit address to every label; the second validates
//! operand shapes per mnemonic and emits big-endian opcodes plus raw
//! `.byte` data. Label resolution therefore never needs forward
//! patching.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::tokenizer::{Token, TokenKind, Tokenizer};
use crate::core::types::{C8Addr, C8Byte, C8RegIdx};
use crate::errors::{AsmError, CResult};
use crate::peripherals::cartridge::Cartridge;
use crate::peripherals::memory::INITIAL_MEMORY_POINTER;

/// Label name to emit address mapping.
pub type LabelTable = HashMap<String, C8Addr>;

/// Assembler.
pub struct Assembler {
    tokenizer: Tokenizer,
}

impl Assembler {
    /// Creates new assembler from source contents.
    ///
    /// # Arguments
    ///
    /// * `contents` - Source code.
    ///
    /// # Returns
    ///
    /// * Assembler instance.
    ///
    pub fn from_string(contents: &str) -> Self {
        Self {
            tokenizer: Tokenizer::new(contents),
        }
    }

    /// Creates new assembler from path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path.
    ///
    /// # Returns
    ///
    /// * Assembler result.
    ///
    pub fn from_path<P: AsRef<Path>>(path: P) -> CResult<Self> {
        debug!("reading assembly source from {:?}", path.as_ref());

        let mut file = File::open(path.as_ref())?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Ok(Self::from_string(&contents))
    }

    /// Assemble to a byte vector.
    ///
    /// # Returns
    ///
    /// * Byte vector result.
    ///
    pub fn assemble(&self) -> Result<Vec<C8Byte>, AsmError> {
        let labels = self.layout_labels()?;
        self.emit(&labels)
    }

    /// Assemble to a cartridge.
    ///
    /// # Returns
    ///
    /// * Cartridge result.
    ///
    pub fn assemble_cartridge(&self) -> CResult<Cartridge> {
        let data = self.assemble()?;
        debug!("assembled {} bytes", data.len());

        let mut cartridge = Cartridge::new_empty();
        cartridge.set_data(data);
        Ok(cartridge)
    }

    // First pass: compute label addresses and space consumption only.
    fn layout_labels(&self) -> Result<LabelTable, AsmError> {
        let mut labels = LabelTable::new();
        let mut cursor = INITIAL_MEMORY_POINTER;

        for (idx, line) in self.tokenizer.token_lines().iter().enumerate() {
            let line_no = idx + 1;
            let mut rest = &line[..];

            if let Some(head) = rest.first() {
                if head.kind == TokenKind::LabelDef {
                    let name = head.text.trim_end_matches(':').to_string();
                    if labels.contains_key(&name) {
                        return Err(AsmError::DuplicateLabel {
                            line: line_no,
                            label: name,
                        });
                    }

                    debug!("label `{}` at 0x{:04X}", name, cursor);
                    labels.insert(name, cursor);
                    rest = &rest[1..];
                }
            }

            match rest.first() {
                None => {}
                Some(head) if head.kind == TokenKind::ByteDirective => {
                    let count = rest[1..]
                        .iter()
                        .filter(|tk| tk.kind == TokenKind::Immediate)
                        .count();
                    cursor += count as C8Addr;
                }
                Some(_) => cursor += 2,
            }
        }

        Ok(labels)
    }

    // Second pass: validate and emit.
    fn emit(&self, labels: &LabelTable) -> Result<Vec<C8Byte>, AsmError> {
        let mut bytes = Vec::new();

        for (idx, line) in self.tokenizer.token_lines().iter().enumerate() {
            let line_no = idx + 1;
            let mut rest = &line[..];

            if let Some(head) = rest.first() {
                if head.kind == TokenKind::LabelDef {
                    rest = &rest[1..];
                }
            }

            match rest.first() {
                None => {}
                Some(head) if head.kind == TokenKind::ByteDirective => {
                    emit_bytes(line_no, &rest[1..], &mut bytes)?;
                }
                Some(head) if head.kind == TokenKind::Mnemonic => {
                    let opcode = assemble_instruction(line_no, head, &rest[1..], labels)?;
                    bytes.push((opcode >> 8) as C8Byte);
                    bytes.push((opcode & 0xFF) as C8Byte);
                }
                Some(head) => {
                    return Err(invalid_instruction(line_no, head));
                }
            }
        }

        Ok(bytes)
    }
}

fn invalid_instruction(line: usize, token: &Token) -> AsmError {
    AsmError::InvalidInstruction {
        line,
        text: token.text.clone(),
    }
}

// `.byte` directive: each immediate is one byte of output.
fn emit_bytes(line: usize, tokens: &[Token], bytes: &mut Vec<C8Byte>) -> Result<(), AsmError> {
    for operand in split_operands(line, tokens)? {
        if operand.kind != TokenKind::Immediate {
            return Err(invalid_instruction(line, operand));
        }

        let value = parse_immediate(line, operand)?;
        if value > 0xFF {
            return Err(AsmError::ImmediateOutOfRange {
                line,
                text: operand.text.clone(),
            });
        }

        bytes.push(value as C8Byte);
    }

    Ok(())
}

// Operands are comma-separated; reject dangling or doubled commas.
fn split_operands(line: usize, tokens: &[Token]) -> Result<Vec<&Token>, AsmError> {
    let mut operands = Vec::new();
    let mut expect_operand = true;

    for token in tokens {
        match (expect_operand, token.kind) {
            (true, TokenKind::Comma) => return Err(invalid_instruction(line, token)),
            (true, _) => {
                operands.push(token);
                expect_operand = false;
            }
            (false, TokenKind::Comma) => expect_operand = true,
            (false, _) => return Err(invalid_instruction(line, token)),
        }
    }

    if expect_operand && !operands.is_empty() {
        // Trailing comma.
        return Err(AsmError::InvalidInstruction {
            line,
            text: ",".to_string(),
        });
    }

    Ok(operands)
}

fn parse_immediate(line: usize, token: &Token) -> Result<u16, AsmError> {
    let text = &token.text;
    let parsed = if text.starts_with("0x") || text.starts_with("0X") {
        u16::from_str_radix(&text[2..], 16)
    } else {
        text.parse::<u16>()
    };

    parsed.map_err(|_| AsmError::ImmediateOutOfRange {
        line,
        text: text.clone(),
    })
}

fn parse_byte(line: usize, token: &Token) -> Result<C8Byte, AsmError> {
    let value = parse_immediate(line, token)?;
    if value > 0xFF {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            text: token.text.clone(),
        });
    }

    Ok(value as C8Byte)
}

fn parse_nibble(line: usize, token: &Token) -> Result<C8Byte, AsmError> {
    let value = parse_immediate(line, token)?;
    if value > 0xF {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            text: token.text.clone(),
        });
    }

    Ok(value as C8Byte)
}

fn parse_register(line: usize, token: &Token) -> Result<C8RegIdx, AsmError> {
    let text = &token.text;
    let digit = text
        .strip_prefix('V')
        .or_else(|| text.strip_prefix('v'))
        .and_then(|d| C8RegIdx::from_str_radix(d, 16).ok());

    match digit {
        Some(idx) if idx <= 0xF => Ok(idx),
        _ => Err(AsmError::InvalidRegister {
            line,
            text: text.clone(),
        }),
    }
}

// Address operand: a 12-bit immediate or a label reference.
fn resolve_addr(line: usize, token: &Token, labels: &LabelTable) -> Result<C8Addr, AsmError> {
    match token.kind {
        TokenKind::Immediate => Ok(parse_immediate(line, token)? & 0x0FFF),
        TokenKind::LabelRef => labels.get(&token.text).copied().ok_or_else(|| {
            AsmError::UnknownLabel {
                line,
                label: token.text.clone(),
            }
        }),
        _ => Err(invalid_instruction(line, token)),
    }
}

fn reg_byte(base: C8Addr, reg: C8RegIdx, byte: C8Byte) -> C8Addr {
    base | (C8Addr::from(reg) << 8) | C8Addr::from(byte)
}

fn reg_pair(base: C8Addr, reg1: C8RegIdx, reg2: C8RegIdx) -> C8Addr {
    base | (C8Addr::from(reg1) << 8) | (C8Addr::from(reg2) << 4)
}

fn single_reg(base: C8Addr, reg: C8RegIdx) -> C8Addr {
    base | (C8Addr::from(reg) << 8)
}

// Dispatch over (mnemonic, operand shape). Anything that falls through
// the shape match is an invalid instruction.
fn assemble_instruction(
    line: usize,
    mnemonic: &Token,
    tokens: &[Token],
    labels: &LabelTable,
) -> Result<C8Addr, AsmError> {
    use TokenKind::*;

    let ops = split_operands(line, tokens)?;
    let shape: Vec<TokenKind> = ops.iter().map(|tk| tk.kind).collect();
    let invalid = || invalid_instruction(line, mnemonic);

    let opcode = match mnemonic.text.to_uppercase().as_str() {
        "CLS" if ops.is_empty() => 0x00E0,
        "RET" if ops.is_empty() => 0x00EE,
        "JP" => match shape.as_slice() {
            [Immediate] | [LabelRef] => 0x1000 | resolve_addr(line, ops[0], labels)?,
            [Register, Immediate] | [Register, LabelRef] => {
                if parse_register(line, ops[0])? != 0 {
                    return Err(invalid());
                }
                0xB000 | resolve_addr(line, ops[1], labels)?
            }
            _ => return Err(invalid()),
        },
        "CALL" => match shape.as_slice() {
            [Immediate] | [LabelRef] => 0x2000 | resolve_addr(line, ops[0], labels)?,
            _ => return Err(invalid()),
        },
        "SE" => match shape.as_slice() {
            [Register, Immediate] => reg_byte(
                0x3000,
                parse_register(line, ops[0])?,
                parse_byte(line, ops[1])?,
            ),
            [Register, Register] => reg_pair(
                0x5000,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "SNE" => match shape.as_slice() {
            [Register, Immediate] => reg_byte(
                0x4000,
                parse_register(line, ops[0])?,
                parse_byte(line, ops[1])?,
            ),
            [Register, Register] => reg_pair(
                0x9000,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "LD" => match shape.as_slice() {
            [Register, Immediate] => reg_byte(
                0x6000,
                parse_register(line, ops[0])?,
                parse_byte(line, ops[1])?,
            ),
            [Register, Register] => reg_pair(
                0x8000,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            [SpecialRegister, Immediate] | [SpecialRegister, LabelRef] if ops[0].text == "I" => {
                0xA000 | resolve_addr(line, ops[1], labels)?
            }
            [MemoryDereference, Register] => single_reg(0xF055, parse_register(line, ops[1])?),
            [Register, MemoryDereference] => single_reg(0xF065, parse_register(line, ops[0])?),
            [Register, SpecialRegister] if ops[1].text == "DT" => {
                single_reg(0xF007, parse_register(line, ops[0])?)
            }
            [SpecialRegister, Register] if ops[0].text == "DT" => {
                single_reg(0xF015, parse_register(line, ops[1])?)
            }
            [SpecialRegister, Register] if ops[0].text == "ST" => {
                single_reg(0xF018, parse_register(line, ops[1])?)
            }
            [SpecialMnemonic, Register] if ops[0].text == "F" => {
                single_reg(0xF029, parse_register(line, ops[1])?)
            }
            [SpecialMnemonic, Register] if ops[0].text == "B" => {
                single_reg(0xF033, parse_register(line, ops[1])?)
            }
            [Register, SpecialMnemonic] if ops[1].text == "K" => {
                single_reg(0xF00A, parse_register(line, ops[0])?)
            }
            _ => return Err(invalid()),
        },
        "ADD" => match shape.as_slice() {
            [Register, Immediate] => reg_byte(
                0x7000,
                parse_register(line, ops[0])?,
                parse_byte(line, ops[1])?,
            ),
            [Register, Register] => reg_pair(
                0x8004,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            [SpecialRegister, Register] if ops[0].text == "I" => {
                single_reg(0xF01E, parse_register(line, ops[1])?)
            }
            _ => return Err(invalid()),
        },
        "OR" => match shape.as_slice() {
            [Register, Register] => reg_pair(
                0x8001,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "AND" => match shape.as_slice() {
            [Register, Register] => reg_pair(
                0x8002,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "XOR" => match shape.as_slice() {
            [Register, Register] => reg_pair(
                0x8003,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "SUB" => match shape.as_slice() {
            [Register, Register] => reg_pair(
                0x8005,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "SUBN" => match shape.as_slice() {
            [Register, Register] => reg_pair(
                0x8007,
                parse_register(line, ops[0])?,
                parse_register(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "SHR" => match shape.as_slice() {
            [Register] => single_reg(0x8006, parse_register(line, ops[0])?),
            _ => return Err(invalid()),
        },
        "SHL" => match shape.as_slice() {
            [Register] => single_reg(0x800E, parse_register(line, ops[0])?),
            _ => return Err(invalid()),
        },
        "RND" => match shape.as_slice() {
            [Register, Immediate] => reg_byte(
                0xC000,
                parse_register(line, ops[0])?,
                parse_byte(line, ops[1])?,
            ),
            _ => return Err(invalid()),
        },
        "SKP" => match shape.as_slice() {
            [Register] => single_reg(0xE09E, parse_register(line, ops[0])?),
            _ => return Err(invalid()),
        },
        "SKNP" => match shape.as_slice() {
            [Register] => single_reg(0xE0A1, parse_register(line, ops[0])?),
            _ => return Err(invalid()),
        },
        "DRW" => match shape.as_slice() {
            [Register, Register, Immediate] => {
                reg_pair(
                    0xD000,
                    parse_register(line, ops[0])?,
                    parse_register(line, ops[1])?,
                ) | C8Addr::from(parse_nibble(line, ops[2])?)
            }
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };

    Ok(opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(source: &str) -> Result<Vec<C8Byte>, AsmError> {
        Assembler::from_string(source).assemble()
    }

    fn assemble_words(source: &str) -> Vec<C8Addr> {
        let bytes = assemble(source).unwrap();
        bytes
            .chunks(2)
            .map(|pair| (C8Addr::from(pair[0]) << 8) | C8Addr::from(pair[1]))
            .collect()
    }

    #[test]
    fn test_no_operand_forms() {
        assert_eq!(assemble_words("CLS\nRET"), vec![0x00E0, 0x00EE]);
    }

    #[test]
    fn test_jump_and_call_forms() {
        assert_eq!(
            assemble_words("JP 0x234\nJP V0, 0x222\nCALL 0x345"),
            vec![0x1234, 0xB222, 0x2345]
        );
    }

    #[test]
    fn test_jp_offset_requires_v0() {
        assert!(matches!(
            assemble("JP V1, 0x222"),
            Err(AsmError::InvalidInstruction { line: 1, .. })
        ));
    }

    #[test]
    fn test_skip_forms() {
        assert_eq!(
            assemble_words("SE V1, 0x22\nSE V1, V2\nSNE V1, 0x22\nSNE V1, V2"),
            vec![0x3122, 0x5120, 0x4122, 0x9120]
        );
    }

    #[test]
    fn test_ld_forms() {
        let source = "\
LD V1, 0x22
LD V1, V2
LD I, 0x333
LD [I], V4
LD V5, [I]
LD V6, DT
LD DT, V7
LD ST, V8
LD F, V9
LD B, VA
LD VB, K";
        assert_eq!(
            assemble_words(source),
            vec![
                0x6122, 0x8120, 0xA333, 0xF455, 0xF565, 0xF607, 0xF715, 0xF818, 0xF929, 0xFA33,
                0xFB0A,
            ]
        );
    }

    #[test]
    fn test_add_forms() {
        assert_eq!(
            assemble_words("ADD V1, 0x22\nADD V1, V2\nADD I, VF"),
            vec![0x7122, 0x8124, 0xFF1E]
        );
    }

    #[test]
    fn test_logic_and_shift_forms() {
        assert_eq!(
            assemble_words("OR V1, V2\nAND V2, V3\nXOR V3, V4\nSUB V4, V5\nSUBN V5, V6\nSHR V6\nSHL V7"),
            vec![0x8121, 0x8232, 0x8343, 0x8455, 0x8567, 0x8606, 0x870E]
        );
    }

    #[test]
    fn test_misc_forms() {
        assert_eq!(
            assemble_words("RND V0, 0x22\nSKP V0\nSKNP V9\nDRW V0, V1, 5"),
            vec![0xC022, 0xE09E, 0xE9A1, 0xD015]
        );
    }

    #[test]
    fn test_mnemonics_case_insensitive() {
        assert_eq!(assemble_words("cls\nld v1, 0x22"), vec![0x00E0, 0x6122]);
    }

    #[test]
    fn test_labels_resolve() {
        let source = "\
start:
    LD V0, 0x0A
    LD V1, 0x05
    JP start";
        assert_eq!(
            assemble(source).unwrap(),
            vec![0x60, 0x0A, 0x61, 0x05, 0x12, 0x00]
        );
    }

    #[test]
    fn test_forward_label() {
        let source = "\
    JP end
    CLS
end:
    RET";
        assert_eq!(assemble_words(source), vec![0x1204, 0x00E0, 0x00EE]);
    }

    #[test]
    fn test_label_with_instruction_on_same_line() {
        let source = "\
main: LD I, data
    JP main
data: .byte 0xF0, 0x90";
        assert_eq!(
            assemble(source).unwrap(),
            vec![0xA2, 0x04, 0x12, 0x00, 0xF0, 0x90]
        );
    }

    #[test]
    fn test_byte_directive_layout() {
        // Three data bytes shift the label after them by three.
        let source = "\
    JP after
sprite: .byte 1, 2, 3
after:
    CLS";
        assert_eq!(
            assemble(source).unwrap(),
            vec![0x12, 0x05, 1, 2, 3, 0x00, 0xE0]
        );
    }

    #[test]
    fn test_duplicate_label() {
        assert_eq!(
            assemble("a:\na:"),
            Err(AsmError::DuplicateLabel {
                line: 2,
                label: "a".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(
            assemble("JP nowhere"),
            Err(AsmError::UnknownLabel {
                line: 1,
                label: "nowhere".to_string()
            })
        );
    }

    #[test]
    fn test_immediate_out_of_range() {
        assert!(matches!(
            assemble("LD V0, 0x100"),
            Err(AsmError::ImmediateOutOfRange { line: 1, .. })
        ));
        assert!(matches!(
            assemble("DRW V0, V1, 16"),
            Err(AsmError::ImmediateOutOfRange { line: 1, .. })
        ));
        assert!(matches!(
            assemble(".byte 256"),
            Err(AsmError::ImmediateOutOfRange { line: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            assemble("SHR V1, V2"),
            Err(AsmError::InvalidInstruction { line: 1, .. })
        ));
        assert!(matches!(
            assemble("LD DT, 0x22"),
            Err(AsmError::InvalidInstruction { line: 1, .. })
        ));
        assert!(matches!(
            assemble("ADD"),
            Err(AsmError::InvalidInstruction { line: 1, .. })
        ));
        assert!(matches!(
            assemble("SE V0,, V1"),
            Err(AsmError::InvalidInstruction { line: 1, .. })
        ));
    }

    #[test]
    fn test_label_layout_matches_emission() {
        // The pass-1 cursor must equal 0x200 plus the bytes emitted by
        // pass 2, for every prefix of the program.
        let source = "\
a:  CLS
b:  .byte 1, 2, 3
c:  RET
d:";
        let assembler = Assembler::from_string(source);
        let labels = assembler.layout_labels().unwrap();
        let bytes = assembler.assemble().unwrap();

        assert_eq!(labels["a"], 0x200);
        assert_eq!(labels["b"], 0x202);
        assert_eq!(labels["c"], 0x205);
        assert_eq!(labels["d"], 0x207);
        assert_eq!(0x200 + bytes.len(), 0x207);
    }
}
