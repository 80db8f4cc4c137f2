//! Question-definition document parsing.
//!
//! Definitions live in a Markdown document: `## <qid> <text>` headers give the
//! question text, fenced `yaml` blocks give the id, answer type, tags and choices.

pub mod parser;

pub use parser::*;
