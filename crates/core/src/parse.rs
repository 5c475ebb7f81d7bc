//! Code parse results
//!
//! The extractor turns one source file into a set of entities and
//! relationships plus a natural-language document; these are the shared
//! result types, also serialized on the preprocessor's `/parse` surface.

use serde::{Deserialize, Serialize};

/// Kind of code entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Class,
    Interface,
    Function,
    Method,
}

impl EntityKind {
    /// Class-like entities can own methods
    pub fn is_class_like(&self) -> bool {
        matches!(self, EntityKind::Class | EntityKind::Interface)
    }
}

/// A named code entity extracted from a source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub file_path: String,
    pub line_start: usize,
    pub line_end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Kind of relationship between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Contains,
    Calls,
    Imports,
    Extends,
    Implements,
}

/// A directed relationship between two entities (or an external target)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

/// Full parse output for one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: String,
    pub language: String,
    pub document: String,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// A code block recovered from mixed-content text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    pub index: usize,
}

/// Response of the preprocessor's `/ingest` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub workspace: String,
    pub files_processed: usize,
    pub documents_sent: usize,
    pub errors: Vec<String>,
}
