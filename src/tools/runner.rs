use crate::{
    diagnostics::{report_io_error, report_runtime_error},
    language::parser::SegmentParser,
    runtime::{environment::Env, error::RuntimeResult, interpreter::Interpreter},
};
use std::path::Path;

/// Feed a source text through the segment parser, evaluating each expression
/// as soon as its brackets close.
pub fn execute(interp: &Interpreter, env: &Env, origin: &str, text: &str) -> RuntimeResult<()> {
    let mut parser = SegmentParser::new(Some(origin));
    for (index, line) in text.lines().enumerate() {
        for expression in parser.submit(line, index + 1)? {
            interp.evaluate(&expression, env)?;
        }
    }
    parser.indicate_complete()?;
    Ok(())
}

/// Run a script file. Returns the process exit status.
pub fn run_file(interp: &Interpreter, env: &Env, path: &Path) -> i32 {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            report_io_error(path, &err);
            return 1;
        }
    };
    let origin = path.display().to_string();
    tracing::info!(file = %origin, "running script");
    match execute(interp, env, &origin, &text) {
        Ok(()) => 0,
        Err(err) => {
            report_runtime_error(&err, Some((&origin, &text)));
            1
        }
    }
}
