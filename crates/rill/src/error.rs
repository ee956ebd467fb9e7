//! Source locations and the error carrier shared by the lexer, parser, and evaluator.
//!
//! Every failure the library reports is an [`Error`]: a [`SourceLocation`] plus an
//! [`ErrorKind`] whose static message is what scripts and hosts observe. No panics
//! cross the library boundary; internal invariant breaches are assertions.

use std::fmt;

/// Result type alias for operations that can produce a script-level error.
pub type RunResult<T> = Result<T, Error>;

/// A `(line, column)` position in script source text.
///
/// Lines and columns are 1-based. Non-positive components mean the location is
/// synthetic (host-bridge nodes) or unknown, and display as `(SourceLocation N/A)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: i32,
    pub col: i32,
}

impl SourceLocation {
    /// The synthetic location attached to nodes created outside any source text.
    pub const UNKNOWN: Self = Self { line: -1, col: -1 };

    /// The start of a source file.
    pub(crate) const START: Self = Self { line: 1, col: 1 };

    /// Advances this location past `c`, moving to the next line on a newline.
    pub(crate) fn update(&mut self, c: char) {
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line <= 0 || self.col <= 0 {
            write!(f, "(SourceLocation N/A)")
        } else {
            write!(f, "(SourceLocation {} {})", self.line, self.col)
        }
    }
}

/// Every failure the interpreter can report, with its user-facing message.
///
/// The serialized strings are part of the observable surface: they appear in
/// [`Error`]'s `Display` output and tests assert on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum ErrorKind {
    // lexical
    #[strum(serialize = "unsupported character")]
    UnsupportedCharacter,
    #[strum(serialize = "unsupported token starting character")]
    UnsupportedTokenStart,
    #[strum(serialize = "invalid number literal")]
    InvalidNumberLiteral,
    #[strum(serialize = "incomplete string literal")]
    IncompleteStringLiteral,

    // syntactic
    #[strum(serialize = "incomplete token stream")]
    IncompleteTokenStream,
    #[strum(serialize = "unexpected token")]
    UnexpectedToken,
    #[strum(serialize = "unrecognized token")]
    UnrecognizedToken,
    #[strum(serialize = "redundant token(s)")]
    RedundantTokens,
    #[strum(serialize = "unsupported escape sequence")]
    UnsupportedEscape,
    #[strum(serialize = "incomplete escape sequence")]
    IncompleteEscape,
    #[strum(serialize = "zero-length sequence")]
    ZeroLengthSequence,
    #[strum(serialize = "incorrect variable name")]
    ReservedName,
    #[strum(serialize = "expression nesting too deep")]
    ExpressionTooDeep,

    // name resolution
    #[strum(serialize = "undefined variable")]
    UndefinedVariable,
    #[strum(serialize = "variable access applied to a non-closure object")]
    AccessNonClosure,

    // types and arity
    #[strum(serialize = "wrong condition type")]
    WrongConditionType,
    #[strum(serialize = "wrong number of arguments given to callee")]
    WrongArgumentCount,
    #[strum(serialize = "wrong type of arguments given to callee")]
    WrongArgumentType,
    #[strum(serialize = "calling non-callable object")]
    NotCallable,

    // numeric
    #[strum(serialize = "dividing by zero")]
    DivisionByZero,

    // host bridge
    #[strum(serialize = "native function not registered")]
    UnregisteredNative,
    #[strum(serialize = "unsupported host value type")]
    UnsupportedHostValue,

    // a heap address that no longer denotes a live cell, e.g. held by a value
    // that escaped an `eval` sub-interpreter
    #[strum(serialize = "dangling heap address")]
    DanglingAddress,
}

/// An error with the source position it was raised at.
///
/// Displays as `[Error (SourceLocation L C)] message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub location: SourceLocation,
    pub kind: ErrorKind,
}

impl Error {
    pub(crate) fn new(location: SourceLocation, kind: ErrorKind) -> Self {
        Self { location, kind }
    }

    /// The static message for this error's kind.
    #[must_use]
    pub fn message(&self) -> &'static str {
        self.kind.into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Error {}] {}", self.location, self.kind)
    }
}

impl std::error::Error for Error {}
