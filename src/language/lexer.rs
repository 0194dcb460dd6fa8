use crate::language::{
    errors::{ParseError, ParseErrorKind},
    token::{Location, Token, TokenKind},
};
use nom::{
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, tuple},
    IResult,
};
use std::sync::Arc;

/// Running bracket balance across the lines of one expression.
#[derive(Clone, Debug, Default)]
pub struct BracketTracker {
    open: Vec<Location>,
}

impl BracketTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_balanced(&self) -> bool {
        self.open.is_empty()
    }

    /// Location of the innermost `[` that has not been closed yet.
    pub fn last_open(&self) -> Option<&Location> {
        self.open.last()
    }

    pub fn reset(&mut self) {
        self.open.clear();
    }

    fn open(&mut self, location: Location) {
        self.open.push(location);
    }

    fn close(&mut self, location: &Location) -> Result<(), ParseError> {
        match self.open.pop() {
            Some(_) => Ok(()),
            None => Err(ParseError::new(
                ParseErrorKind::UnmatchedClosingBracket,
                location.clone(),
            )),
        }
    }
}

/// Split one source line into tokens, updating the bracket balance.
pub fn lex_line(
    line: &str,
    line_number: usize,
    origin: Option<Arc<str>>,
    tracker: &mut BracketTracker,
) -> Result<Vec<Token>, ParseError> {
    Lexer::new(line, line_number, origin, tracker).run()
}

// [+-]?([0-9]*[.])?[0-9]+
fn numeral(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        opt(pair(digit0, char('.'))),
        digit1,
    )))(input)
}

pub fn is_numeral(text: &str) -> bool {
    all_consuming(numeral)(text).is_ok()
}

fn is_delimiter(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '[' | ']' | '"' | ';')
}

struct Lexer<'a, 't> {
    chars: std::str::Chars<'a>,
    current: Option<char>,
    column: usize,
    line: usize,
    origin: Option<Arc<str>>,
    tracker: &'t mut BracketTracker,
    tokens: Vec<Token>,
}

impl<'a, 't> Lexer<'a, 't> {
    fn new(
        src: &'a str,
        line: usize,
        origin: Option<Arc<str>>,
        tracker: &'t mut BracketTracker,
    ) -> Self {
        let mut chars = src.chars();
        let current = chars.next();
        Self {
            chars,
            current,
            column: 1,
            line,
            origin,
            tracker,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(ch) = self.current {
            match ch {
                ';' => break,
                ch if ch.is_whitespace() => {
                    self.bump();
                }
                '[' => {
                    let location = self.location();
                    self.tracker.open(location.clone());
                    self.push_token(TokenKind::OpenBracket, location);
                    self.bump();
                }
                ']' => {
                    let location = self.location();
                    self.tracker.close(&location)?;
                    self.push_token(TokenKind::CloseBracket, location);
                    self.bump();
                }
                '"' => self.lex_string()?,
                ch if self.starts_number(ch) => self.lex_number()?,
                _ => self.lex_symbol(),
            }
        }
        Ok(self.tokens)
    }

    fn bump(&mut self) -> Option<char> {
        if self.current.is_some() {
            self.column += 1;
        }
        self.current = self.chars.next();
        self.current
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn location(&self) -> Location {
        Location::new(self.line, self.column, self.origin.clone())
    }

    fn push_token(&mut self, kind: TokenKind, location: Location) {
        self.tokens.push(Token { kind, location });
    }

    fn error(&self, kind: ParseErrorKind, location: Location) -> ParseError {
        ParseError::new(kind, location)
    }

    fn peek_second(&self) -> Option<char> {
        self.chars.clone().nth(1)
    }

    // digit, `.5`, `-5`, `-.5`
    fn starts_number(&self, ch: char) -> bool {
        let digit_next = self.peek().is_some_and(|c| c.is_ascii_digit());
        match ch {
            '0'..='9' => true,
            '.' => digit_next,
            '+' | '-' => {
                digit_next
                    || (self.peek() == Some('.')
                        && self.peek_second().is_some_and(|c| c.is_ascii_digit()))
            }
            _ => false,
        }
    }

    fn take_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current {
            if is_delimiter(ch) {
                break;
            }
            word.push(ch);
            self.bump();
        }
        word
    }

    fn lex_symbol(&mut self) {
        let location = self.location();
        let word = self.take_word();
        self.push_token(TokenKind::Symbol(word), location);
    }

    fn lex_number(&mut self) -> Result<(), ParseError> {
        let location = self.location();
        let word = self.take_word();
        if !is_numeral(&word) {
            return Err(self
                .error(ParseErrorKind::MalformedNumber, location)
                .with_help(format!("`{word}` is not a valid numeral")));
        }
        let kind = if word.contains('.') {
            match word.parse::<f64>() {
                Ok(value) => TokenKind::Real(value),
                Err(_) => return Err(self.error(ParseErrorKind::MalformedNumber, location)),
            }
        } else {
            match word.parse::<i64>() {
                Ok(value) => TokenKind::Integer(value),
                Err(_) => {
                    return Err(self
                        .error(ParseErrorKind::MalformedNumber, location)
                        .with_help("integer literal does not fit in 64 bits"))
                }
            }
        };
        self.push_token(kind, location);
        Ok(())
    }

    fn lex_string(&mut self) -> Result<(), ParseError> {
        let location = self.location();
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.current {
                None => {
                    return Err(self
                        .error(ParseErrorKind::UnterminatedString, location)
                        .with_help("strings must close on the line they open"))
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('a') => '\x07',
                        Some('b') => '\x08',
                        Some('v') => '\x0b',
                        Some(other) => other,
                        None => {
                            return Err(self.error(ParseErrorKind::UnterminatedString, location))
                        }
                    };
                    value.push(escaped);
                    self.bump();
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }
        self.push_token(TokenKind::String(value), location);
        Ok(())
    }
}
