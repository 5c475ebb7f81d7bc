//! Code structure extraction
//!
//! Three pieces feed the ingestion pipeline:
//! - `language` / `parser`: a tree-sitter walk that turns one source file
//!   into entities, relationships, and a natural-language document
//! - `blocks`: heuristic recovery of code blocks from mixed-content text
//!   (markdown, PDF extractions)
//! - `archive`: tar/zip unpacking with skip rules and caps

pub mod archive;
pub mod blocks;
pub mod language;
pub mod parser;

pub use archive::extract_archive;
pub use blocks::{detect_language_from_content, extract_code_blocks};
pub use language::Language;
pub use parser::parse_file;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
