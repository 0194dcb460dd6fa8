use crate::language::{
    encoding::Builtin,
    errors::{ParseError, ParseErrorKind},
    lexer::{lex_line, BracketTracker},
    token::{Token, TokenKind},
};
use crate::runtime::cell::{Cell, CellRef, CellValue};
use parking_lot::RwLock;
use std::sync::Arc;

/// Line-at-a-time parser. Tokens are buffered until the brackets balance, then
/// every complete top-level expression is built and handed back.
#[derive(Debug, Default)]
pub struct SegmentParser {
    origin: Option<Arc<str>>,
    tracker: BracketTracker,
    buffer: Vec<Token>,
}

impl SegmentParser {
    pub fn new(origin: Option<&str>) -> Self {
        Self {
            origin: origin.map(Arc::from),
            tracker: BracketTracker::new(),
            buffer: Vec::new(),
        }
    }

    pub fn submit(&mut self, line: &str, line_number: usize) -> Result<Vec<CellRef>, ParseError> {
        let tokens = match lex_line(line, line_number, self.origin.clone(), &mut self.tracker) {
            Ok(tokens) => tokens,
            Err(err) => {
                self.reset();
                return Err(err);
            }
        };
        self.buffer.extend(tokens);
        if !self.tracker.is_balanced() || self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let tokens = std::mem::take(&mut self.buffer);
        build_trees(&tokens).map_err(|err| {
            self.reset();
            err
        })
    }

    /// Signals end of input; fails if a list is still open.
    pub fn indicate_complete(&mut self) -> Result<(), ParseError> {
        if let Some(location) = self.tracker.last_open().cloned() {
            self.reset();
            return Err(ParseError::new(
                ParseErrorKind::UnmatchedOpeningBracket,
                location,
            ));
        }
        Ok(())
    }

    /// True while an expression spans more lines than have been submitted.
    pub fn is_pending(&self) -> bool {
        !self.tracker.is_balanced()
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
        self.buffer.clear();
    }
}

/// Parse a whole text, line by line.
pub fn parse_source(origin: Option<&str>, text: &str) -> Result<Vec<CellRef>, ParseError> {
    let mut parser = SegmentParser::new(origin);
    let mut expressions = Vec::new();
    for (index, line) in text.lines().enumerate() {
        expressions.extend(parser.submit(line, index + 1)?);
    }
    parser.indicate_complete()?;
    Ok(expressions)
}

/// Parse a single line and return its first expression, if any.
pub fn parse_line(
    origin: Option<&str>,
    line_number: usize,
    text: &str,
) -> Result<Option<CellRef>, ParseError> {
    let mut parser = SegmentParser::new(origin);
    let expressions = parser.submit(text, line_number)?;
    parser.indicate_complete()?;
    Ok(expressions.into_iter().next())
}

fn build_trees(tokens: &[Token]) -> Result<Vec<CellRef>, ParseError> {
    let mut trees = Vec::new();
    let mut cursor = 0;
    while let Some(token) = tokens.get(cursor) {
        match token.kind {
            TokenKind::OpenBracket => {
                let (cell, next) = parse_list(tokens, cursor)?;
                trees.push(cell);
                cursor = next;
            }
            TokenKind::CloseBracket => {
                return Err(ParseError::new(
                    ParseErrorKind::UnmatchedClosingBracket,
                    token.location.clone(),
                ))
            }
            _ => {
                return Err(
                    ParseError::new(ParseErrorKind::NoEnclosingList, token.location.clone())
                        .with_help("top-level expressions must be wrapped in `[` `]`"),
                )
            }
        }
    }
    Ok(trees)
}

fn parse_list(tokens: &[Token], start: usize) -> Result<(CellRef, usize), ParseError> {
    let open = &tokens[start];
    let mut items = Vec::new();
    let mut cursor = start + 1;
    while let Some(token) = tokens.get(cursor) {
        match token.kind {
            TokenKind::OpenBracket => {
                let (cell, next) = parse_list(tokens, cursor)?;
                items.push(cell);
                cursor = next;
            }
            TokenKind::CloseBracket => {
                let list = Cell::located(
                    CellValue::List(RwLock::new(items)),
                    open.location.clone(),
                );
                return Ok((list, cursor + 1));
            }
            _ => {
                items.push(atom(token));
                cursor += 1;
            }
        }
    }
    Err(ParseError::new(
        ParseErrorKind::UnmatchedOpeningBracket,
        open.location.clone(),
    ))
}

fn atom(token: &Token) -> CellRef {
    let value = match &token.kind {
        TokenKind::Symbol(name) => match Builtin::from_name(name) {
            Some(builtin) => CellValue::Encoded(builtin),
            None => CellValue::Symbol(name.clone()),
        },
        TokenKind::Integer(value) => CellValue::Integer(*value),
        TokenKind::Real(value) => CellValue::Real(*value),
        TokenKind::String(text) => CellValue::String(text.clone()),
        // brackets never reach here
        TokenKind::OpenBracket | TokenKind::CloseBracket => CellValue::List(RwLock::new(Vec::new())),
    };
    Cell::located(value, token.location.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items(cell: &CellRef) -> Vec<CellRef> {
        cell.list_items().expect("list").read().clone()
    }

    #[test]
    fn builds_nested_lists_with_encoded_heads() {
        let cell = parse_line(None, 1, "[+ 1 [* 2 x]]").expect("parse").expect("expr");
        let outer = items(&cell);
        assert_eq!(outer.len(), 3);
        assert!(matches!(outer[0].value, CellValue::Encoded(Builtin::Add)));
        assert_eq!(outer[1].as_integer(), Some(1));
        let inner = items(&outer[2]);
        assert!(matches!(inner[0].value, CellValue::Encoded(Builtin::Mul)));
        assert_eq!(inner[2].symbol_name(), Some("x"));
    }

    #[test]
    fn expression_completes_across_lines() {
        let mut parser = SegmentParser::new(Some("demo"));
        assert!(parser.submit("[block", 1).expect("line 1").is_empty());
        assert!(parser.is_pending());
        assert!(parser.submit("  [var x 1]", 2).expect("line 2").is_empty());
        let done = parser.submit("]", 3).expect("line 3");
        assert_eq!(done.len(), 1);
        assert!(!parser.is_pending());
        parser.indicate_complete().expect("complete");
        let location = done[0].location.clone().expect("location");
        assert_eq!((location.line, location.column), (1, 1));
        assert_eq!(location.origin.as_deref(), Some("demo"));
    }

    #[test]
    fn one_line_may_hold_several_expressions() {
        let mut parser = SegmentParser::new(None);
        let exprs = parser.submit("[var a 1] [var b 2] ; both", 1).expect("parse");
        assert_eq!(exprs.len(), 2);
        assert!(parser.submit("", 2).expect("blank").is_empty());
    }

    #[test]
    fn unmatched_opening_is_reported_on_completion() {
        let mut parser = SegmentParser::new(None);
        parser.submit("[block [a", 1).expect("partial");
        let err = parser.indicate_complete().expect_err("unbalanced");
        assert_eq!(err.kind, ParseErrorKind::UnmatchedOpeningBracket);
        assert_eq!(err.location.column, 8);
        assert!(!parser.is_pending());
    }

    #[test]
    fn errors_reset_the_buffer() {
        let mut parser = SegmentParser::new(None);
        parser.submit("[block", 1).expect("partial");
        let err = parser.submit("\"unterminated", 2).expect_err("string");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert!(!parser.is_pending());
        assert_eq!(parser.submit("[x]", 3).expect("fresh").len(), 1);
    }

    #[test]
    fn bare_atoms_need_an_enclosing_list() {
        let err = parse_line(None, 1, "42").expect_err("bare atom");
        assert_eq!(err.kind, ParseErrorKind::NoEnclosingList);
        let err = parse_line(None, 1, "[a]]").expect_err("stray closer");
        assert_eq!(err.kind, ParseErrorKind::UnmatchedClosingBracket);
    }

    #[test]
    fn source_texts_parse_line_by_line() {
        let exprs = parse_source(None, "[var x\n  10]\n[putln x]\n").expect("parse");
        assert_eq!(exprs.len(), 2);
        let err = parse_source(None, "[var x\n").expect_err("open");
        assert_eq!(err.kind, ParseErrorKind::UnmatchedOpeningBracket);
    }
}
