pub mod repl;
pub mod runner;
