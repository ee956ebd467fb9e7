//! Public interface for running rill code.
//!
//! [`Interpreter`] owns one machine state for its whole life: a program given
//! at construction runs on [`execute`](Interpreter::execute), further snippets
//! can be evaluated against the same root environment with
//! [`evaluate`](Interpreter::evaluate) (this is what the REPL does), native
//! functions registered with [`register`](Interpreter::register) become
//! callable from scripts via `go`, and script functions registered via `reg`
//! become callable from the host with [`call`](Interpreter::call).

use std::rc::Rc;

use crate::{
    config::Config,
    error::{Error, RunResult, SourceLocation},
    expressions::{Expr, ExprKind, Variable},
    io::Console,
    lex::lex,
    object::{Object, to_object},
    parse::parse,
    value::Value,
    vm::Machine,
};

/// Std scripts bundled into the binary; run as a preamble when
/// [`Config::use_std`] is set.
const STD_SOURCES: &[&str] = &[include_str!("../std/prelude.rill")];

/// One interpreter state with its configuration.
pub struct Interpreter {
    machine: Machine,
    config: Config,
    program: Option<Rc<Expr>>,
    std_loaded: bool,
}

impl Interpreter {
    /// Parses `code` and prepares a state to run it.
    pub fn new(code: &str, config: Config) -> Result<Self, Error> {
        let program = parse(lex(code)?)?;
        Ok(Self {
            machine: Machine::new(),
            config,
            program: Some(program),
            std_loaded: false,
        })
    }

    /// Parses `code` under the default configuration.
    pub fn with_defaults(code: &str) -> Result<Self, Error> {
        Self::new(code, Config::default())
    }

    /// A state with no program, for feeding snippets via
    /// [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn session(config: Config) -> Self {
        Self {
            machine: Machine::new(),
            config,
            program: None,
            std_loaded: false,
        }
    }

    /// Runs the program to completion (loading the std preamble first when
    /// configured). The final value is available via [`value`](Self::value)
    /// and [`result`](Self::result).
    pub fn execute(&mut self, console: &mut impl Console) -> Result<(), Error> {
        self.load_std(console)?;
        if let Some(program) = self.program.take() {
            self.machine.push_program(program);
        }
        self.run_machine(console)
    }

    /// Parses and runs one more program against the persistent root
    /// environment, returning its value.
    pub fn evaluate(&mut self, code: &str, console: &mut impl Console) -> Result<Object, Error> {
        self.load_std(console)?;
        let program = parse(lex(code)?)?;
        self.machine.push_program(program);
        self.run_machine(console)?;
        Ok(self.result())
    }

    /// The display form of the value register.
    #[must_use]
    pub fn value(&self) -> String {
        self.machine.value.to_string()
    }

    /// The value register as a host object.
    #[must_use]
    pub fn result(&self) -> Object {
        to_object(&self.machine.value)
    }

    /// Number of live heap cells, as of the last collection.
    #[must_use]
    pub fn heap_size(&self) -> usize {
        self.machine.heap.len()
    }

    /// Registers a native function callable from scripts as `(go "name" …)`.
    /// Registering an existing name replaces the previous function.
    pub fn register(
        &mut self,
        name: &str,
        native: impl FnMut(&[Object]) -> Result<Object, Error> + 'static,
    ) -> &mut Self {
        self.machine.natives.insert(name.to_owned(), Box::new(native));
        self
    }

    /// Calls a script function by the name it was registered under with `reg`.
    ///
    /// Builds a synthetic call node (the callee resolves lexically first,
    /// then dynamically), pushes it under a fresh copy of the root
    /// environment, and resumes the driver loop. Only numbers and text may be
    /// passed in.
    pub fn call(&mut self, name: &str, args: &[Object], console: &mut impl Console) -> Result<Object, Error> {
        self.load_std(console)?;
        let arg_nodes = args.iter().map(literal).collect::<RunResult<Vec<_>>>()?;
        let callee = Rc::new(Expr {
            location: SourceLocation::UNKNOWN,
            kind: ExprKind::Variable(Variable::synthetic(name)),
        });
        let call = Rc::new(Expr {
            location: SourceLocation::UNKNOWN,
            kind: ExprKind::Call {
                callee,
                args: arg_nodes,
            },
        });
        self.machine.push_call(call);
        self.run_machine(console)?;
        Ok(self.result())
    }

    fn run_machine(&mut self, console: &mut impl Console) -> Result<(), Error> {
        match self.machine.run(&mut self.config, console) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.machine.reset_to_root();
                Err(err)
            }
        }
    }

    /// Runs the bundled std scripts once, then collects.
    fn load_std(&mut self, console: &mut impl Console) -> Result<(), Error> {
        if !self.config.use_std || self.std_loaded {
            return Ok(());
        }
        self.std_loaded = true;
        for source in STD_SOURCES {
            let program = parse(lex(source)?)?;
            self.machine.push_program(program);
            self.run_machine(console)?;
        }
        let removed = self.machine.collect();
        if self.config.enable_debug {
            console.stdout_write(&format!("[DEBUG] GC collect {removed} cells\n"));
        }
        Ok(())
    }
}

/// A literal node for a host-supplied argument.
fn literal(object: &Object) -> RunResult<Rc<Expr>> {
    let value = crate::object::to_value(object, SourceLocation::UNKNOWN)?;
    let kind = match value {
        Value::Rational(rational) => ExprKind::Number {
            num: rational.numer(),
            den: rational.denom(),
        },
        Value::Text(text) => ExprKind::Str(text),
        // host-initiated calls take numbers and text only
        _ => {
            return Err(Error::new(
                SourceLocation::UNKNOWN,
                crate::error::ErrorKind::UnsupportedHostValue,
            ));
        }
    };
    Ok(Rc::new(Expr {
        location: SourceLocation::UNKNOWN,
        kind,
    }))
}
