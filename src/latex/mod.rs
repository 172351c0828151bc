//! LaTeX source handling: comment stripping, command recognition and the
//! recursive include parser.

pub mod commands;
pub mod macros;
pub mod parser;
pub mod strip;

pub use parser::parse_project;
pub use strip::{strip_document, strip_line, strip_text, StrippedLine};
