//! Console abstraction behind the `put` and `getline` intrinsics.
//!
//! Implement [`Console`] to capture or redirect script output and to supply
//! script input. The default implementation [`StdConsole`] uses the process's
//! standard streams; [`CollectConsole`] records output and serves scripted
//! input lines, which is what the test suite uses throughout.

use std::{
    collections::VecDeque,
    io::{self, Write as _},
};

/// Output and line-input channel used by the interpreter.
pub trait Console {
    /// Writes already-formatted output. `put` concatenates its arguments and
    /// calls this once per intrinsic invocation; no separators or terminators
    /// are added by the interpreter.
    fn stdout_write(&mut self, output: &str);

    /// Reads one line of input without its trailing newline. `None` signals
    /// end of input or an unreadable stream; `getline` maps it to `<void>`.
    fn read_line(&mut self) -> Option<String>;
}

/// Console backed by the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn stdout_write(&mut self, output: &str) {
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(output.as_bytes());
        let _ = stdout.flush();
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                if line.ends_with('\n') {
                    line.pop();
                    if line.ends_with('\r') {
                        line.pop();
                    }
                }
                Some(line)
            }
        }
    }
}

/// Console that discards output and is always at end of input.
#[derive(Debug, Default)]
pub struct NoConsole;

impl Console for NoConsole {
    fn stdout_write(&mut self, _output: &str) {}

    fn read_line(&mut self) -> Option<String> {
        None
    }
}

/// Console that accumulates output in memory and serves pre-seeded input.
#[derive(Debug, Default)]
pub struct CollectConsole {
    output: String,
    input: VecDeque<String>,
}

impl CollectConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A console whose `read_line` serves the given lines in order.
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output: String::new(),
            input: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Everything written so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Console for CollectConsole {
    fn stdout_write(&mut self, output: &str) {
        self.output.push_str(output);
    }

    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }
}
