//! The public, host-side mirror of runtime values.
//!
//! Values cross the host boundary by value: rationals and text convert losslessly
//! in both directions, while closures and continuations cross outward only, as
//! display-only markers carrying the location they were built at. Host-supplied
//! arguments are restricted to numbers and strings; anything else is a host
//! bridge error.

use std::{fmt, rc::Rc};

use crate::{
    error::{Error, ErrorKind, RunResult, SourceLocation},
    value::{Rational, Value},
};

/// A native function callable from scripts via the `go` intrinsic.
///
/// Receives the script-side argument values and returns one value (or an
/// error, which aborts the run).
pub type NativeFn = Box<dyn FnMut(&[Object]) -> Result<Object, Error>>;

/// A script value as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Void,
    /// An exact fraction; canonical when produced by the interpreter.
    Rational(i64, i64),
    Text(String),
    /// Marker for a script closure; records where its `lambda` was written.
    Closure(SourceLocation),
    /// Marker for a captured continuation; records where it was captured.
    Continuation(SourceLocation),
}

impl Object {
    /// Convenience constructor for whole numbers.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::Rational(value, 1)
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "<void>"),
            Self::Rational(num, den) => {
                if *den == 1 {
                    write!(f, "{num}")
                } else {
                    write!(f, "{num}/{den}")
                }
            }
            Self::Text(text) => f.write_str(text),
            Self::Closure(location) => write!(f, "<closure evaluated at {location}>"),
            Self::Continuation(location) => write!(f, "<continuation evaluated at {location}>"),
        }
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Object {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Converts a runtime value into its host mirror.
pub(crate) fn to_object(value: &Value) -> Object {
    match value {
        Value::Void => Object::Void,
        Value::Rational(rational) => Object::Rational(rational.numer(), rational.denom()),
        Value::Text(text) => Object::Text(text.to_string()),
        Value::Closure(closure) => Object::Closure(closure.fun.location),
        Value::Continuation(continuation) => Object::Continuation(continuation.location),
    }
}

/// Converts a host value into a runtime value.
///
/// Only immediates cross inward; markers (and zero denominators) are rejected.
pub(crate) fn to_value(object: &Object, location: SourceLocation) -> RunResult<Value> {
    match object {
        Object::Void => Ok(Value::Void),
        Object::Rational(num, den) => {
            if *den == 0 {
                return Err(Error::new(location, ErrorKind::UnsupportedHostValue));
            }
            Ok(Value::Rational(Rational::new(*num, *den)))
        }
        Object::Text(text) => Ok(Value::Text(Rc::from(text.as_str()))),
        Object::Closure(_) | Object::Continuation(_) => Err(Error::new(location, ErrorKind::UnsupportedHostValue)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_value_contract() {
        assert_eq!(Object::Void.to_string(), "<void>");
        assert_eq!(Object::integer(3).to_string(), "3");
        assert_eq!(Object::Rational(29, 30).to_string(), "29/30");
        assert_eq!(Object::Text("raw".into()).to_string(), "raw");
    }

    #[test]
    fn markers_do_not_cross_inward() {
        let err = to_value(&Object::Closure(SourceLocation::UNKNOWN), SourceLocation::UNKNOWN).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedHostValue);
        let err = to_value(&Object::Rational(1, 0), SourceLocation::UNKNOWN).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedHostValue);
    }

    #[test]
    fn rationals_round_trip_normalised() {
        let value = to_value(&Object::Rational(10, -4), SourceLocation::UNKNOWN).unwrap();
        assert_eq!(to_object(&value), Object::Rational(-5, 2));
    }
}
