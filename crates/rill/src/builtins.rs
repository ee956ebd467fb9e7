//! The built-in operations reachable as call callees.
//!
//! By the time [`apply`] runs, every argument has been evaluated and collected
//! on the intrinsic call's own layer. `apply` pops that layer, checks arity
//! and types, and either writes the value register (the common case) or
//! manipulates the stack itself (`callcc` pushes the receiving closure's body;
//! `reg` extends the root environment).

use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    config::Config,
    error::{Error, ErrorKind, RunResult, SourceLocation},
    expressions::Intrinsic,
    io::Console,
    lex::lex,
    object::{Object, to_object, to_value},
    parse::parse,
    stack::{EnvEntry, Layer, deep_copy_stack, new_env_cell},
    value::{Continuation, Rational, Value},
    vm::Machine,
};

/// What an intrinsic expects in one argument position.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Any,
    Rational,
    Text,
    Closure,
}

/// Checks argument count and per-position kinds.
fn check(location: SourceLocation, args: &[Value], expected: &[Expect]) -> RunResult<()> {
    if args.len() != expected.len() {
        return Err(Error::new(location, ErrorKind::WrongArgumentCount));
    }
    for (arg, expect) in args.iter().zip(expected) {
        let ok = match expect {
            Expect::Any => true,
            Expect::Rational => matches!(arg, Value::Rational(_)),
            Expect::Text => matches!(arg, Value::Text(_)),
            Expect::Closure => matches!(arg, Value::Closure(_)),
        };
        if !ok {
            return Err(Error::new(location, ErrorKind::WrongArgumentType));
        }
    }
    Ok(())
}

fn two_rationals(location: SourceLocation, args: &[Value]) -> RunResult<(Rational, Rational)> {
    check(location, args, &[Expect::Rational, Expect::Rational])?;
    match (&args[0], &args[1]) {
        (Value::Rational(a), Value::Rational(b)) => Ok((*a, *b)),
        _ => unreachable!("checked above"),
    }
}

fn one_rational(location: SourceLocation, args: &[Value]) -> RunResult<Rational> {
    check(location, args, &[Expect::Rational])?;
    match &args[0] {
        Value::Rational(a) => Ok(*a),
        _ => unreachable!("checked above"),
    }
}

/// Wraps `text` in quotes, escaping backslashes, quotes, tabs, and newlines:
/// the inverse of the parser's string-literal unescaping.
fn quote_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Applies `intrinsic` to the arguments accumulated on the top layer.
///
/// Pops the intrinsic call's layer first; errors therefore abort with the
/// layer already gone, which is fine since the driver stops on error anyway.
pub(crate) fn apply<C: Console>(
    machine: &mut Machine,
    intrinsic: Intrinsic,
    call_location: SourceLocation,
    location: SourceLocation,
    console: &mut C,
) -> RunResult<()> {
    let layer = machine
        .stack
        .pop()
        .expect("intrinsic application runs on a live call layer");
    let args: SmallVec<[Value; 4]> = layer.args;

    match intrinsic {
        Intrinsic::Void => {
            check(location, &args, &[])?;
            machine.value = Value::Void;
        }
        Intrinsic::IsVoid => {
            check(location, &args, &[Expect::Any])?;
            machine.value = Value::truth(matches!(args[0], Value::Void));
        }
        Intrinsic::IsNum => {
            check(location, &args, &[Expect::Any])?;
            machine.value = Value::truth(matches!(args[0], Value::Rational(_)));
        }
        Intrinsic::IsStr => {
            check(location, &args, &[Expect::Any])?;
            machine.value = Value::truth(matches!(args[0], Value::Text(_)));
        }
        Intrinsic::IsClo => {
            check(location, &args, &[Expect::Any])?;
            machine.value = Value::truth(matches!(args[0], Value::Closure(_)));
        }
        Intrinsic::IsCont => {
            check(location, &args, &[Expect::Any])?;
            machine.value = Value::truth(matches!(args[0], Value::Continuation(_)));
        }
        Intrinsic::Add => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::Rational(a.add(b));
        }
        Intrinsic::Sub => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::Rational(a.sub(b));
        }
        Intrinsic::Mul => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::Rational(a.mul(b));
        }
        Intrinsic::Div => {
            let (a, b) = two_rationals(location, &args)?;
            let quotient = a.div(b).ok_or_else(|| Error::new(location, ErrorKind::DivisionByZero))?;
            machine.value = Value::Rational(quotient);
        }
        Intrinsic::Lt => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a < b);
        }
        Intrinsic::Gt => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a > b);
        }
        Intrinsic::Le => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a <= b);
        }
        Intrinsic::Ge => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a >= b);
        }
        Intrinsic::Eq | Intrinsic::Ne => {
            check(location, &args, &[Expect::Any, Expect::Any])?;
            // value equality is defined for rationals and text only
            let equal = match (&args[0], &args[1]) {
                (Value::Rational(a), Value::Rational(b)) => a == b,
                (Value::Text(a), Value::Text(b)) => a == b,
                _ => return Err(Error::new(location, ErrorKind::WrongArgumentType)),
            };
            machine.value = Value::truth(if intrinsic == Intrinsic::Eq { equal } else { !equal });
        }
        Intrinsic::And => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a.is_true() && b.is_true());
        }
        Intrinsic::Or => {
            let (a, b) = two_rationals(location, &args)?;
            machine.value = Value::truth(a.is_true() || b.is_true());
        }
        Intrinsic::Not => {
            let a = one_rational(location, &args)?;
            machine.value = Value::truth(!a.is_true());
        }
        Intrinsic::Put => {
            if args.is_empty() {
                return Err(Error::new(location, ErrorKind::WrongArgumentCount));
            }
            let mut out = String::new();
            for arg in &args {
                out.push_str(&arg.to_string());
            }
            console.stdout_write(&out);
            machine.value = Value::Void;
        }
        Intrinsic::GetLine => {
            check(location, &args, &[])?;
            machine.value = match console.read_line() {
                Some(line) => Value::Text(Rc::from(line)),
                None => Value::Void,
            };
        }
        Intrinsic::Quote => {
            check(location, &args, &[Expect::Text])?;
            let Value::Text(text) = &args[0] else {
                unreachable!("checked above")
            };
            machine.value = Value::Text(Rc::from(quote_text(text)));
        }
        Intrinsic::Concat => {
            check(location, &args, &[Expect::Text, Expect::Text])?;
            let (Value::Text(a), Value::Text(b)) = (&args[0], &args[1]) else {
                unreachable!("checked above")
            };
            machine.value = Value::Text(Rc::from(format!("{a}{b}")));
        }
        Intrinsic::Eval => {
            check(location, &args, &[Expect::Text])?;
            let Value::Text(source) = &args[0] else {
                unreachable!("checked above")
            };
            // a fresh interpreter state with default configuration; only the
            // console is shared, so nested programs print to the same place
            let program = parse(lex(source)?)?;
            let mut inner = Machine::new();
            inner.push_program(program);
            inner.run(&mut Config::default(), console)?;
            machine.value = inner.value;
        }
        Intrinsic::CallCc => {
            check(location, &args, &[Expect::Closure])?;
            let Value::Closure(closure) = &args[0] else {
                unreachable!("checked above")
            };
            if closure.fun.params.len() != 1 {
                return Err(Error::new(location, ErrorKind::WrongArgumentCount));
            }
            // the call's own layer is already popped, so the snapshot resumes
            // at the caller with the value register as the call's result
            let snapshot = deep_copy_stack(&machine.stack);
            let continuation = Value::Continuation(Rc::new(Continuation {
                location: call_location,
                stack: snapshot,
            }));
            let addr = machine.heap.alloc(continuation);
            let mut env = closure.env.borrow().clone();
            env.push(EnvEntry {
                name: Rc::clone(&closure.fun.params[0].name),
                addr,
            });
            machine
                .stack
                .push(Layer::new_frame(new_env_cell(env), Rc::clone(&closure.fun.body)));
        }
        Intrinsic::Reg => {
            check(location, &args, &[Expect::Text, Expect::Closure])?;
            let Value::Text(name) = &args[0] else {
                unreachable!("checked above")
            };
            let addr = machine.heap.alloc(args[1].clone());
            machine.stack[0].env.borrow_mut().insert(
                0,
                EnvEntry {
                    name: Rc::clone(name),
                    addr,
                },
            );
            machine.value = Value::Void;
        }
        Intrinsic::Go => {
            if args.is_empty() {
                return Err(Error::new(location, ErrorKind::WrongArgumentCount));
            }
            let Value::Text(name) = &args[0] else {
                return Err(Error::new(location, ErrorKind::WrongArgumentType));
            };
            let objects: Vec<Object> = args[1..].iter().map(to_object).collect();
            let Some(native) = machine.natives.get_mut(name.as_ref()) else {
                return Err(Error::new(location, ErrorKind::UnregisteredNative));
            };
            let result = native(&objects)?;
            machine.value = to_value(&result, location)?;
        }
    }
    Ok(())
}
