pub mod config;
pub mod diagnostics;
pub mod language;
pub mod runtime;
pub mod tools;

pub use language::parser::SegmentParser;
pub use runtime::{Cell, CellRef, Env, Environment, Interpreter, RuntimeError, RuntimeResult};
