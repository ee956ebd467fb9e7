//! Recursive-descent parser producing the rill AST.
//!
//! The grammar is prefix-oriented and unambiguous from one token of lookahead:
//! number and string literals, variables, `lambda (params) { body }`,
//! `letrec (name = expr …) { body }`, `if cond then a else b`,
//! `(callee args…)`, `[expr…]` sequences, and `&name expr` closure access.
//!
//! Intrinsic names are reserved: they parse only in callee position and are
//! rejected as variable names. Number literals are normalised here so the
//! evaluator only ever sees canonical rationals.

use std::rc::Rc;

use crate::{
    error::{Error, ErrorKind, RunResult, SourceLocation},
    expressions::{Expr, ExprKind, Intrinsic, LambdaExpr, Variable},
    lex::{Token, TokenKind},
    value::Rational,
};

/// Maximum expression nesting depth accepted by the parser.
///
/// Parsing recurses over the host stack, so unbounded nesting in hostile input
/// would overflow it; past this depth the parser reports an error instead.
pub(crate) const MAX_NESTING_DEPTH: usize = 200;

/// Parses a complete token stream into a single expression.
pub(crate) fn parse(tokens: Vec<Token>) -> RunResult<Rc<Expr>> {
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.index < parser.tokens.len() {
        return Err(Error::new(
            parser.tokens[parser.index].location,
            ErrorKind::RedundantTokens,
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    /// Consumes the next token if it satisfies `predicate`.
    fn consume(&mut self, predicate: impl Fn(&Token) -> bool) -> RunResult<Token> {
        let Some(token) = self.tokens.get(self.index).cloned() else {
            return Err(Error::new(SourceLocation::UNKNOWN, ErrorKind::IncompleteTokenStream));
        };
        self.index += 1;
        if !predicate(&token) {
            return Err(Error::new(token.location, ErrorKind::UnexpectedToken));
        }
        Ok(token)
    }

    fn consume_exactly(&mut self, source: &str) -> RunResult<Token> {
        self.consume(|token| token.source == source)
    }

    fn parse_expr(&mut self) -> RunResult<Rc<Expr>> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            let location = self.peek().map_or(SourceLocation::UNKNOWN, |t| t.location);
            return Err(Error::new(location, ErrorKind::ExpressionTooDeep));
        }
        let expr = self.parse_expr_inner();
        self.depth -= 1;
        expr
    }

    fn parse_expr_inner(&mut self) -> RunResult<Rc<Expr>> {
        let Some(token) = self.peek() else {
            return Err(Error::new(SourceLocation::UNKNOWN, ErrorKind::IncompleteTokenStream));
        };
        match token.kind {
            TokenKind::Number => self.parse_number(),
            TokenKind::Str => self.parse_string(),
            TokenKind::Keyword => match token.source.as_str() {
                "lambda" => self.parse_lambda(),
                "letrec" => self.parse_letrec(),
                "if" => self.parse_if(),
                _ => Err(Error::new(token.location, ErrorKind::UnrecognizedToken)),
            },
            TokenKind::Identifier => {
                let variable = self.parse_variable()?;
                Ok(Rc::new(Expr {
                    location: variable.location,
                    kind: ExprKind::Variable(variable),
                }))
            }
            TokenKind::Symbol => match token.source.as_str() {
                "(" => self.parse_call(),
                "[" => self.parse_sequence(),
                "&" => self.parse_access(),
                _ => Err(Error::new(token.location, ErrorKind::UnrecognizedToken)),
            },
        }
    }

    fn parse_number(&mut self) -> RunResult<Rc<Expr>> {
        let token = self.consume(|t| t.kind == TokenKind::Number)?;
        let invalid = || Error::new(token.location, ErrorKind::InvalidNumberLiteral);

        let source = token.source.as_str();
        let (num, den) = if let Some((n, d)) = source.split_once('/') {
            let num = n.parse::<i64>().map_err(|_| invalid())?;
            let den = d.parse::<i64>().map_err(|_| invalid())?;
            (num, den)
        } else if let Some((int, frac)) = source.split_once('.') {
            // `a.b` is the exact decimal ab̅ / 10^len(b)
            let digits = format!("{int}{frac}");
            let num = digits.parse::<i64>().map_err(|_| invalid())?;
            let den = 10i64
                .checked_pow(u32::try_from(frac.len()).map_err(|_| invalid())?)
                .ok_or_else(invalid)?;
            (num, den)
        } else {
            (source.parse::<i64>().map_err(|_| invalid())?, 1)
        };

        let rational = Rational::new(num, den);
        Ok(Rc::new(Expr {
            location: token.location,
            kind: ExprKind::Number {
                num: rational.numer(),
                den: rational.denom(),
            },
        }))
    }

    fn parse_string(&mut self) -> RunResult<Rc<Expr>> {
        let token = self.consume(|t| t.kind == TokenKind::Str)?;
        let chars: Vec<char> = token.source.chars().collect();

        let mut contents = String::with_capacity(chars.len());
        let mut index = 1;
        while index < chars.len() - 1 {
            let c = chars[index];
            index += 1;
            if c != '\\' {
                contents.push(c);
                continue;
            }
            if index >= chars.len() - 1 {
                return Err(Error::new(token.location, ErrorKind::IncompleteEscape));
            }
            let escaped = chars[index];
            index += 1;
            match escaped {
                '\\' => contents.push('\\'),
                '"' => contents.push('"'),
                't' => contents.push('\t'),
                'n' => contents.push('\n'),
                _ => return Err(Error::new(token.location, ErrorKind::UnsupportedEscape)),
            }
        }

        Ok(Rc::new(Expr {
            location: token.location,
            kind: ExprKind::Str(Rc::from(contents)),
        }))
    }

    fn parse_variable(&mut self) -> RunResult<Variable> {
        let token = self.consume(|t| t.kind == TokenKind::Identifier)?;
        if Intrinsic::lookup(&token.source).is_some() {
            return Err(Error::new(token.location, ErrorKind::ReservedName));
        }
        Ok(Variable::new(token.location, &token.source))
    }

    fn parse_lambda(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("lambda")?;
        self.consume_exactly("(")?;

        let mut params = Vec::new();
        while self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            params.push(self.parse_variable()?);
        }
        self.consume_exactly(")")?;

        self.consume_exactly("{")?;
        let body = self.parse_expr()?;
        self.consume_exactly("}")?;

        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::Lambda(Rc::new(LambdaExpr {
                location: start.location,
                params,
                body,
            })),
        }))
    }

    fn parse_letrec(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("letrec")?;
        self.consume_exactly("(")?;

        let mut bindings = Vec::new();
        while self.peek().is_some_and(|t| t.kind == TokenKind::Identifier) {
            let variable = self.parse_variable()?;
            self.consume_exactly("=")?;
            let initialiser = self.parse_expr()?;
            bindings.push((variable, initialiser));
        }
        self.consume_exactly(")")?;

        self.consume_exactly("{")?;
        let body = self.parse_expr()?;
        self.consume_exactly("}")?;

        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::Letrec { bindings, body },
        }))
    }

    fn parse_if(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("if")?;
        let cond = self.parse_expr()?;
        self.consume_exactly("then")?;
        let then = self.parse_expr()?;
        self.consume_exactly("else")?;
        let otherwise = self.parse_expr()?;
        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::If { cond, then, otherwise },
        }))
    }

    fn parse_call(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("(")?;

        let Some(next) = self.peek() else {
            return Err(Error::new(start.location, ErrorKind::IncompleteTokenStream));
        };
        let intrinsic = if next.kind == TokenKind::Identifier {
            Intrinsic::lookup(&next.source)
        } else {
            None
        };
        let callee = if let Some(intrinsic) = intrinsic {
            let token = self.consume(|t| t.kind == TokenKind::Identifier)?;
            Rc::new(Expr {
                location: token.location,
                kind: ExprKind::Intrinsic(intrinsic),
            })
        } else {
            self.parse_expr()?
        };

        let mut args = Vec::new();
        while self.peek().is_some_and(|t| t.source != ")") {
            args.push(self.parse_expr()?);
        }
        self.consume_exactly(")")?;

        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::Call { callee, args },
        }))
    }

    fn parse_sequence(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("[")?;

        let mut exprs = Vec::new();
        while self.peek().is_some_and(|t| t.source != "]") {
            exprs.push(self.parse_expr()?);
        }
        self.consume_exactly("]")?;

        if exprs.is_empty() {
            return Err(Error::new(start.location, ErrorKind::ZeroLengthSequence));
        }
        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::Sequence(exprs),
        }))
    }

    fn parse_access(&mut self) -> RunResult<Rc<Expr>> {
        let start = self.consume_exactly("&")?;
        let var = self.parse_variable()?;
        let expr = self.parse_expr()?;
        Ok(Rc::new(Expr {
            location: start.location,
            kind: ExprKind::Access { var, expr },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::lex;

    fn parse_source(source: &str) -> RunResult<Rc<Expr>> {
        parse(lex(source).unwrap())
    }

    #[test]
    fn number_literals_normalise() {
        let expr = parse_source("10/5").unwrap();
        assert!(matches!(expr.kind, ExprKind::Number { num: 2, den: 1 }));

        let expr = parse_source("0.3").unwrap();
        assert!(matches!(expr.kind, ExprKind::Number { num: 3, den: 10 }));

        let expr = parse_source("-0.5").unwrap();
        assert!(matches!(expr.kind, ExprKind::Number { num: -1, den: 2 }));
    }

    #[test]
    fn string_escapes_resolve() {
        let expr = parse_source(r#""a\"b\n\t\\""#).unwrap();
        let ExprKind::Str(contents) = &expr.kind else {
            panic!("expected a string literal");
        };
        assert_eq!(contents.as_ref(), "a\"b\n\t\\");
    }

    #[test]
    fn intrinsic_only_in_callee_position() {
        let expr = parse_source("(add 1 2)").unwrap();
        let ExprKind::Call { callee, args } = &expr.kind else {
            panic!("expected a call");
        };
        assert!(matches!(callee.kind, ExprKind::Intrinsic(Intrinsic::Add)));
        assert_eq!(args.len(), 2);

        let err = parse_source("add").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReservedName);
        let err = parse_source("lambda (add) { 1 }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReservedName);
    }

    #[test]
    fn letrec_bindings_in_order() {
        let expr = parse_source("letrec (a = 1 b = 2) { a }").unwrap();
        let ExprKind::Letrec { bindings, .. } = &expr.kind else {
            panic!("expected a letrec");
        };
        let names: Vec<&str> = bindings.iter().map(|(v, _)| v.name.as_ref()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn access_form() {
        let expr = parse_source("&v lambda () { 1 }").unwrap();
        let ExprKind::Access { var, expr: target } = &expr.kind else {
            panic!("expected an access node");
        };
        assert_eq!(var.name.as_ref(), "v");
        assert!(matches!(target.kind, ExprKind::Lambda(_)));
    }

    #[test]
    fn empty_sequence_is_rejected() {
        let err = parse_source("[]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroLengthSequence);
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse_source("1 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RedundantTokens);
    }

    #[test]
    fn truncated_input_is_incomplete() {
        for source in ["(f 1", "letrec (a = ", "lambda (x) {"] {
            let err = parse_source(source).unwrap_err();
            assert_eq!(err.kind, ErrorKind::IncompleteTokenStream, "parsing {source:?}");
        }
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let source = format!("{}1{}", "[".repeat(300), "]".repeat(300));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExpressionTooDeep);
    }
}
