//! Lexer for rill source text.
//!
//! Source text is validated against a fixed character set up front, then cut
//! into tokens in a single pass. String tokens keep their surrounding quotes
//! and raw escapes; the parser resolves them. Comments run from `#` to the end
//! of the line and produce no token.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, ErrorKind, RunResult, SourceLocation};

/// Keywords of the surface syntax. Everything else alphabetic is an identifier.
pub(crate) const KEYWORDS: &[&str] = &["if", "then", "else", "letrec", "lambda"];

/// Every character a source file may contain.
const CHARSET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789`~!@#$%^&*()-_=+[{]}\\|;:'\",<.>/? \t\n\r";

/// Shape of a valid number literal: an integer, a decimal with a non-zero
/// final digit, or a fraction with a positive denominator.
static NUMBER_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?((0|[1-9][0-9]*)|((0|[1-9][0-9]*)\.([0-9]*[1-9]))|((0|[1-9][0-9]*)/([1-9][0-9]*)))$")
        .expect("number literal pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Keyword,
    Identifier,
    Number,
    Str,
    Symbol,
}

/// One token with the location of its first character.
#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub location: SourceLocation,
    pub kind: TokenKind,
    pub source: String,
}

/// Tokenises `source`, rejecting characters outside the supported set.
pub(crate) fn lex(source: &str) -> RunResult<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();

    let mut location = SourceLocation::START;
    for &c in &chars {
        if !CHARSET.contains(c) {
            return Err(Error::new(location, ErrorKind::UnsupportedCharacter));
        }
        location.update(c);
    }

    let mut lexer = Lexer {
        source: chars,
        index: 0,
        location: SourceLocation::START,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer {
    source: Vec<char>,
    index: usize,
    location: SourceLocation,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.source.get(self.index).copied()
    }

    fn bump(&mut self) {
        self.location.update(self.source[self.index]);
        self.index += 1;
    }

    fn text_from(&self, begin: usize) -> String {
        self.source[begin..self.index].iter().collect()
    }

    fn next_token(&mut self) -> RunResult<Option<Token>> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        let Some(first) = self.peek() else {
            return Ok(None);
        };

        let begin = self.index;
        let token_location = self.location;
        let kind = if first.is_ascii_digit() || first == '-' || first == '+' {
            while self.peek().is_some_and(|c| c.is_ascii_digit() || "-+./".contains(c)) {
                self.bump();
            }
            if !NUMBER_LITERAL.is_match(&self.text_from(begin)) {
                return Err(Error::new(token_location, ErrorKind::InvalidNumberLiteral));
            }
            TokenKind::Number
        } else if first.is_ascii_alphabetic() {
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let text = self.text_from(begin);
            if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        } else if "(){}[]=@&".contains(first) {
            self.bump();
            TokenKind::Symbol
        } else if first == '"' {
            self.bump();
            loop {
                match self.peek() {
                    None => return Err(Error::new(token_location, ErrorKind::IncompleteStringLiteral)),
                    // a quote only terminates the literal when it is not escaped,
                    // i.e. when an even number of backslashes precede it
                    Some('"') if self.trailing_backslashes(begin) % 2 == 0 => {
                        self.bump();
                        break;
                    }
                    Some(_) => self.bump(),
                }
            }
            TokenKind::Str
        } else if first == '#' {
            while self.peek().is_some_and(|c| c != '\n') {
                self.bump();
            }
            return self.next_token();
        } else {
            return Err(Error::new(self.location, ErrorKind::UnsupportedTokenStart));
        };

        Ok(Some(Token {
            location: token_location,
            kind,
            source: self.text_from(begin),
        }))
    }

    /// Counts the backslashes immediately preceding the current position,
    /// without crossing the start of the token.
    fn trailing_backslashes(&self, begin: usize) -> usize {
        let mut count = 0;
        let mut pos = self.index;
        while pos > begin && self.source[pos - 1] == '\\' {
            count += 1;
            pos -= 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenises_a_call() {
        let tokens = lex("(add 1 2/3)").unwrap();
        let sources: Vec<&str> = tokens.iter().map(|t| t.source.as_str()).collect();
        assert_eq!(sources, ["(", "add", "1", "2/3", ")"]);
        assert_eq!(
            kinds("(add 1 2/3)"),
            [
                TokenKind::Symbol,
                TokenKind::Identifier,
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::Symbol,
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(kinds("if then else letrec lambda"), [TokenKind::Keyword; 5].to_vec());
        assert_eq!(kinds("iffy lambdas"), [TokenKind::Identifier; 2].to_vec());
    }

    #[test]
    fn tracks_locations_across_lines() {
        let tokens = lex("1\n  two").unwrap();
        assert_eq!((tokens[0].location.line, tokens[0].location.col), (1, 1));
        assert_eq!((tokens[1].location.line, tokens[1].location.col), (2, 3));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("1 # the rest is ignored\n2"), [TokenKind::Number; 2].to_vec());
    }

    #[test]
    fn string_token_keeps_quotes_and_escapes() {
        let tokens = lex(r#""a\"b""#).unwrap();
        assert_eq!(tokens[0].source, r#""a\"b""#);
        assert_eq!(tokens[0].kind, TokenKind::Str);
    }

    #[test]
    fn string_ending_in_escaped_backslash_terminates() {
        let tokens = lex(r#""a\\""#).unwrap();
        assert_eq!(tokens[0].source, r#""a\\""#);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex(r#""abc"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncompleteStringLiteral);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for source in ["1.", "01", "1/0", "1.20", "--1", "1//2"] {
            let err = lex(source).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidNumberLiteral, "lexing {source:?}");
        }
    }

    #[test]
    fn valid_number_shapes() {
        for source in ["0", "-5", "+12", "0.5", "10/5", "-7/3", "3.25"] {
            assert_eq!(kinds(source), [TokenKind::Number].to_vec(), "lexing {source:?}");
        }
    }

    #[test]
    fn unsupported_character_is_rejected_with_location() {
        let err = lex("1 \u{3bb}").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedCharacter);
        assert_eq!((err.location.line, err.location.col), (1, 3));
    }
}
