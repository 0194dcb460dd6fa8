pub mod builtins;
pub mod cell;
pub mod concurrency;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod loader;

pub use cell::{Cell, CellRef};
pub use environment::{Env, Environment};
pub use error::{RuntimeError, RuntimeResult};
pub use interpreter::Interpreter;
