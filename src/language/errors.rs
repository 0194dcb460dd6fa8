use crate::language::token::Location;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    MalformedNumber,
    UnterminatedString,
    UnmatchedClosingBracket,
    UnmatchedOpeningBracket,
    NoEnclosingList,
}

impl ParseErrorKind {
    pub fn describe(self) -> &'static str {
        match self {
            ParseErrorKind::MalformedNumber => "Malformed number",
            ParseErrorKind::UnterminatedString => "Unterminated string",
            ParseErrorKind::UnmatchedClosingBracket => "Unmatched closing bracket",
            ParseErrorKind::UnmatchedOpeningBracket => "Unmatched opening bracket",
            ParseErrorKind::NoEnclosingList => "No enclosing list",
        }
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind} at {location}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub location: Location,
    pub help: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, location: Location) -> Self {
        Self {
            kind,
            location,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}
