//! Debugger stream.
//!
//! Output sink for debugger messages. In console mode lines go
//! straight to stdout/stderr; otherwise they are captured so an
//! embedding front-end can render them.

/// One output line.
pub struct StreamLine {
    /// Error line?
    pub error: bool,
    /// Line content.
    pub content: String,
}

/// Debugger stream.
#[derive(Default)]
pub struct DebuggerStream {
    lines: Vec<StreamLine>,
    console: bool,
}

impl DebuggerStream {
    /// Create new stream.
    pub fn new() -> Self {
        Default::default()
    }

    /// Route lines to the console instead of capturing them.
    ///
    /// # Arguments
    ///
    /// * `v` - Value.
    ///
    pub fn use_console(&mut self, v: bool) {
        self.console = v;
    }

    /// Write an output line.
    ///
    /// # Arguments
    ///
    /// * `s` - String line.
    ///
    pub fn writeln_out<T: AsRef<str>>(&mut self, s: T) {
        if self.console {
            println!("{}", s.as_ref());
        } else {
            self.lines.push(StreamLine {
                error: false,
                content: s.as_ref().to_string(),
            });
        }
    }

    /// Write an error line.
    ///
    /// # Arguments
    ///
    /// * `s` - String line.
    ///
    pub fn writeln_err<T: AsRef<str>>(&mut self, s: T) {
        if self.console {
            eprintln!("{}", s.as_ref());
        } else {
            self.lines.push(StreamLine {
                error: true,
                content: s.as_ref().to_string(),
            });
        }
    }

    /// Get captured lines.
    ///
    /// # Returns
    ///
    /// * Stream lines.
    ///
    pub fn lines(&self) -> &[StreamLine] {
        &self.lines
    }
}
