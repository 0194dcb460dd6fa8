use crate::{
    diagnostics::report_runtime_error,
    language::parser::SegmentParser,
    runtime::{environment::Env, error::RuntimeError, interpreter::Interpreter},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const ORIGIN: &str = "<repl>";

/// Outcome of feeding one line to a session.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    Evaluated(Vec<String>),
    Pending,
    Quit,
}

/// Interactive state independent of the line editor.
pub struct Session {
    interp: Interpreter,
    env: Env,
    parser: SegmentParser,
    line_number: usize,
    transcript: String,
}

impl Session {
    pub fn new(interp: Interpreter, env: Env) -> Self {
        Self {
            interp,
            env,
            parser: SegmentParser::new(Some(ORIGIN)),
            line_number: 0,
            transcript: String::new(),
        }
    }

    pub fn prompt(&self) -> &'static str {
        if self.parser.is_pending() {
            "... "
        } else {
            "> "
        }
    }

    /// Parse and evaluate one line. Completed expressions are rendered.
    pub fn feed(&mut self, line: &str) -> Result<LineOutcome, RuntimeError> {
        if !self.parser.is_pending() && matches!(line.trim(), ":quit" | ":exit") {
            return Ok(LineOutcome::Quit);
        }
        self.line_number += 1;
        self.transcript.push_str(line);
        self.transcript.push('\n');
        let expressions = self.parser.submit(line, self.line_number)?;
        if self.parser.is_pending() {
            return Ok(LineOutcome::Pending);
        }
        let mut rendered = Vec::with_capacity(expressions.len());
        for expression in &expressions {
            let value = self.interp.evaluate(expression, &self.env)?;
            rendered.push(self.interp.stringify(&value, &self.env, false)?);
        }
        Ok(LineOutcome::Evaluated(rendered))
    }

    /// Every line fed so far, for rendering error locations.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }
}

pub fn run_repl(interp: Interpreter, env: Env) -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut session = Session::new(interp, env);
    println!("sauros {}", env!("CARGO_PKG_VERSION"));
    println!("Type :quit or press Ctrl+D to exit.");
    loop {
        match editor.readline(session.prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                match session.feed(&line) {
                    Ok(LineOutcome::Quit) => break,
                    Ok(LineOutcome::Pending) => {}
                    Ok(LineOutcome::Evaluated(values)) => {
                        for value in values {
                            println!("{value}");
                        }
                    }
                    Err(err) => report_runtime_error(&err, Some((ORIGIN, session.transcript()))),
                }
            }
            Err(ReadlineError::Interrupted) => {
                session.parser.reset();
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
