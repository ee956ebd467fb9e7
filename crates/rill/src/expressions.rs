//! The abstract syntax tree produced by the parser and walked by the evaluator.
//!
//! Nodes are immutable once built and shared by reference counting: closures keep
//! their `lambda` node alive, and control-stack layers point at the node they are
//! evaluating. Every node carries the [`SourceLocation`] it was parsed at.

use std::rc::Rc;

use crate::error::SourceLocation;

/// How a variable reference is resolved at runtime.
///
/// The kind is derived from the name's first character: lower-case names are
/// lexical (resolved in the enclosing environment chain and captured by
/// closures), upper-case names are dynamic (resolved by walking the live
/// control stack's frames). `Unknown` only appears on synthetic nodes built by
/// the host bridge, which try lexical resolution first and fall back to dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Unknown,
    Lexical,
    Dynamic,
}

/// A variable reference or binding occurrence.
#[derive(Debug, Clone)]
pub(crate) struct Variable {
    pub location: SourceLocation,
    pub name: Rc<str>,
    pub kind: ScopeKind,
}

impl Variable {
    /// Creates a variable, deriving its scope kind from the name's first character.
    pub fn new(location: SourceLocation, name: &str) -> Self {
        let kind = if name.chars().next().is_some_and(char::is_uppercase) {
            ScopeKind::Dynamic
        } else {
            ScopeKind::Lexical
        };
        Self {
            location,
            name: Rc::from(name),
            kind,
        }
    }

    /// Creates a host-bridge variable with no source position and unknown scope.
    pub fn synthetic(name: &str) -> Self {
        Self {
            location: SourceLocation::UNKNOWN,
            name: Rc::from(name),
            kind: ScopeKind::Unknown,
        }
    }
}

/// The built-in operations recognised by the evaluator.
///
/// Intrinsic names are reserved: the parser rejects them as variable names and
/// recognises them only in callee position of a call form. The lower-case
/// spelling produced by `strum(serialize_all = "lowercase")` is the canonical
/// surface name of each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Intrinsic {
    Void,
    IsVoid,
    IsNum,
    IsStr,
    IsClo,
    IsCont,
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Put,
    GetLine,
    Quote,
    Concat,
    Eval,
    CallCc,
    Reg,
    Go,
}

impl Intrinsic {
    /// Returns the intrinsic with the given surface name, if any.
    pub fn lookup(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

/// A function literal: ordered parameters and a single body expression.
///
/// Kept behind its own `Rc` so closures can hold the node without copying it.
#[derive(Debug)]
pub(crate) struct LambdaExpr {
    pub location: SourceLocation,
    pub params: Vec<Variable>,
    pub body: Rc<Expr>,
}

/// One expression node with its source position.
#[derive(Debug)]
pub(crate) struct Expr {
    pub location: SourceLocation,
    pub kind: ExprKind,
}

/// The expression forms of the language.
#[derive(Debug)]
pub(crate) enum ExprKind {
    /// A rational literal, already normalised by the parser (`den > 0`, gcd 1).
    Number { num: i64, den: i64 },
    /// A string literal with escapes already resolved.
    Str(Rc<str>),
    /// A built-in operation; only ever appears as the callee of a `Call`.
    Intrinsic(Intrinsic),
    Variable(Variable),
    Lambda(Rc<LambdaExpr>),
    /// Mutually recursive bindings: every name is bound before any initialiser runs.
    Letrec {
        bindings: Vec<(Variable, Rc<Expr>)>,
        body: Rc<Expr>,
    },
    If {
        cond: Rc<Expr>,
        then: Rc<Expr>,
        otherwise: Rc<Expr>,
    },
    Call {
        callee: Rc<Expr>,
        args: Vec<Rc<Expr>>,
    },
    /// `[ e… ]`: evaluates each element in order, yielding the last value.
    Sequence(Vec<Rc<Expr>>),
    /// `&v e`: reads `v` out of the captured environment of the closure `e`.
    Access { var: Variable, expr: Rc<Expr> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_kind_from_first_character() {
        assert_eq!(Variable::new(SourceLocation::UNKNOWN, "count").kind, ScopeKind::Lexical);
        assert_eq!(Variable::new(SourceLocation::UNKNOWN, "Count").kind, ScopeKind::Dynamic);
        assert_eq!(Variable::synthetic("anything").kind, ScopeKind::Unknown);
    }

    #[test]
    fn intrinsic_names_are_lowercase() {
        assert_eq!(Intrinsic::lookup("callcc"), Some(Intrinsic::CallCc));
        assert_eq!(Intrinsic::lookup("isvoid"), Some(Intrinsic::IsVoid));
        assert_eq!(Intrinsic::lookup("getline"), Some(Intrinsic::GetLine));
        assert_eq!(Intrinsic::lookup("callCC"), None);
        assert_eq!(Intrinsic::lookup("exit"), None);
        assert_eq!(Intrinsic::CallCc.to_string(), "callcc");
    }
}
