//! rill is a small expression-oriented scripting language with exact rational
//! numbers, lexically- and dynamically-scoped variables, mutually recursive
//! bindings, first-class closures, and first-class continuations.
//!
//! The evaluator is a continuation-passing tree walker over an explicit
//! control stack and an explicit value heap, paired with a tracing,
//! compacting garbage collector that relocates heap addresses in place,
//! including inside captured continuations, which hold deep copies of the
//! stack. Hosts can register native functions callable from scripts and call
//! script functions by name.
//!
//! ```
//! use rill::{CollectConsole, Interpreter};
//!
//! let mut interpreter = Interpreter::with_defaults(r#"(put (add 0.3 2/3) "\n")"#).unwrap();
//! let mut console = CollectConsole::new();
//! interpreter.execute(&mut console).unwrap();
//! assert_eq!(console.output(), "29/30\n");
//! ```

mod builtins;
mod config;
mod error;
mod expressions;
mod gc;
mod heap;
mod io;
mod lex;
mod object;
mod parse;
mod run;
mod stack;
mod value;
mod vm;

pub use crate::{
    config::{AlwaysGc, Config, EveryN, GcTrigger, NeverGc},
    error::{Error, ErrorKind, RunResult, SourceLocation},
    io::{CollectConsole, Console, NoConsole, StdConsole},
    object::{NativeFn, Object},
    run::Interpreter,
};
