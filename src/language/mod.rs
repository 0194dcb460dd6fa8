pub mod encoding;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod token;
