use std::fmt;
use std::sync::Arc;

/// Position of a token or cell in its source text. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub origin: Option<Arc<str>>,
}

impl Location {
    pub fn new(line: usize, column: usize, origin: Option<Arc<str>>) -> Self {
        Self {
            line,
            column,
            origin,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "{}:{}:{}", origin, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    OpenBracket,
    CloseBracket,
    Symbol(String),
    Integer(i64),
    Real(f64),
    String(String),
}
