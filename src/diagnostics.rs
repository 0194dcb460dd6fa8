use crate::{
    language::{errors::ParseError, token::Location},
    runtime::error::RuntimeError,
};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SourceDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SourceDiagnostic {
    pub fn from_runtime(src: NamedSource, offset: usize, error: &RuntimeError) -> Self {
        let help = match error {
            RuntimeError::Parse(ParseError { help, .. }) => help.clone(),
            _ => None,
        };
        Self {
            src,
            span: (offset, 1).into(),
            help,
            message: error.to_string(),
            label: error.category().to_string(),
        }
    }
}

/// Byte offset of a 1-based line/column pair, or `None` when out of range.
pub fn byte_offset(text: &str, location: &Location) -> Option<usize> {
    let mut line_start = 0;
    for (index, line) in text.split('\n').enumerate() {
        if index + 1 == location.line {
            let column = location.column.max(1) - 1;
            return match line.char_indices().nth(column) {
                Some((offset, _)) => Some(line_start + offset),
                None if column == line.chars().count() => Some(line_start + line.len()),
                None => None,
            };
        }
        line_start += line.len() + 1;
    }
    None
}

/// Render an error against the source it came from. `source` is the text the
/// driver was running, keyed by its origin name; errors raised inside other
/// files are rendered against those files when they can be read.
pub fn report_runtime_error(error: &RuntimeError, source: Option<(&str, &str)>) {
    let Some(location) = error.location() else {
        eprintln!("{}: {}", error.category(), error);
        return;
    };
    let text = match (&location.origin, source) {
        (Some(origin), Some((name, text))) if origin.as_ref() == name => Some(text.to_string()),
        (None, Some((_, text))) => Some(text.to_string()),
        (Some(origin), _) => std::fs::read_to_string(origin.as_ref()).ok(),
        (None, None) => None,
    };
    let rendered = text.and_then(|text| {
        let offset = byte_offset(&text, location)?;
        let name = location
            .origin
            .as_deref()
            .or(source.map(|(name, _)| name))
            .unwrap_or("<input>")
            .to_string();
        Some(SourceDiagnostic::from_runtime(
            NamedSource::new(name, text),
            offset,
            error,
        ))
    });
    match rendered {
        Some(diagnostic) => eprintln!("{:?}", Report::new(diagnostic)),
        None => eprintln!("{}: {} ({})", error.category(), error, location),
    }
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_become_labelled_diagnostics() {
        let err = RuntimeError::unknown("ghost", Some(&Location::new(1, 2, None)));
        let src = NamedSource::new("inline", "[ghost]".to_string());
        let diagnostic = SourceDiagnostic::from_runtime(src, 1, &err);
        assert_eq!(diagnostic.to_string(), "Unknown identifier `ghost`");
        assert_eq!(diagnostic.label, "unknown identifier");
        assert!(format!("{:?}", Report::new(diagnostic)).contains("Unknown identifier `ghost`"));
    }

    #[test]
    fn offsets_count_characters_within_a_line() {
        let text = "[var a 1]\n[putln é b]\n";
        assert_eq!(byte_offset(text, &Location::new(1, 1, None)), Some(0));
        assert_eq!(byte_offset(text, &Location::new(2, 1, None)), Some(10));
        assert_eq!(byte_offset(text, &Location::new(2, 10, None)), Some(20));
        assert_eq!(byte_offset(text, &Location::new(9, 1, None)), None);
    }
}
