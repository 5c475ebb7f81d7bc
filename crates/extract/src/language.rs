//! Language registry
//!
//! Everything language-specific lives here: grammar handles, file
//! extensions, the node-kind dispatch tables the parser walks with, and
//! import-target extraction. Adding a language means adding a variant and
//! filling in these tables.

use std::str::FromStr;

use crate::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Go,
    Rust,
    Java,
    C,
    Cpp,
}

/// Node kinds that delimit a definition body; a signature is the source
/// text from the definition start up to the first of these
pub const BODY_KINDS: &[&str] = &[
    "block",
    "compound_statement",
    "statement_block",
    "class_body",
    "field_declaration_list",
    "declaration_list",
];

impl Language {
    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::Javascript,
            Language::Typescript,
            Language::Go,
            Language::Rust,
            Language::Java,
            Language::C,
            Language::Cpp,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Javascript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Typescript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }

    /// Extensions recognized for this language
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &[".py"],
            Language::Javascript => &[".js", ".jsx", ".mjs", ".cjs"],
            Language::Typescript => &[".ts", ".tsx"],
            Language::Go => &[".go"],
            Language::Rust => &[".rs"],
            Language::Java => &[".java"],
            Language::C => &[".c", ".h"],
            Language::Cpp => &[".cpp", ".cc", ".cxx", ".hpp", ".hh", ".hxx"],
        }
    }

    /// Canonical extension for synthetic file names
    pub fn extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// Detect a language from a file path suffix
    pub fn from_path(path: &str) -> Option<Language> {
        let lower = path.to_ascii_lowercase();
        Language::all()
            .iter()
            .copied()
            .find(|lang| lang.extensions().iter().any(|ext| lower.ends_with(ext)))
    }

    /// Map a markdown fence tag (`py`, `c++`, ...) to a language
    pub fn from_tag(tag: &str) -> Option<Language> {
        match tag {
            "python" | "py" | "python3" => Some(Language::Python),
            "javascript" | "js" | "jsx" => Some(Language::Javascript),
            "typescript" | "ts" | "tsx" => Some(Language::Typescript),
            "go" | "golang" => Some(Language::Go),
            "rust" | "rs" => Some(Language::Rust),
            "java" => Some(Language::Java),
            "c" | "h" => Some(Language::C),
            "cpp" | "c++" | "cxx" | "cc" | "hpp" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Node kinds that define a class-like entity
    pub fn class_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["class_definition"],
            Language::Javascript => &["class_declaration"],
            Language::Typescript => &["class_declaration", "interface_declaration"],
            Language::Go => &["type_declaration"],
            Language::Rust => &["struct_item", "enum_item", "trait_item", "impl_item"],
            Language::Java => &["class_declaration", "interface_declaration", "enum_declaration"],
            Language::C => &["struct_specifier"],
            Language::Cpp => &["class_specifier", "struct_specifier"],
        }
    }

    /// Node kinds that define a function or method
    pub fn function_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["function_definition"],
            Language::Javascript => &["function_declaration", "arrow_function", "method_definition"],
            Language::Typescript => &["function_declaration", "arrow_function", "method_definition"],
            Language::Go => &["function_declaration", "method_declaration"],
            Language::Rust => &["function_item"],
            Language::Java => &["method_declaration", "constructor_declaration"],
            Language::C => &["function_definition"],
            Language::Cpp => &["function_definition"],
        }
    }

    /// Node kinds that introduce an import
    pub fn import_kinds(&self) -> &'static [&'static str] {
        match self {
            Language::Python => &["import_statement", "import_from_statement"],
            Language::Javascript => &["import_statement"],
            Language::Typescript => &["import_statement"],
            Language::Go => &["import_declaration"],
            Language::Rust => &["use_declaration"],
            Language::Java => &["import_declaration"],
            Language::C => &["preproc_include"],
            Language::Cpp => &["preproc_include"],
        }
    }

    /// Extract the import target from the import statement's source text
    pub fn import_target(&self, text: &str) -> Option<String> {
        let text = text.trim();
        match self {
            Language::Python => {
                if let Some(rest) = text.strip_prefix("from ") {
                    rest.split_whitespace().next().map(str::to_string)
                } else if let Some(rest) = text.strip_prefix("import ") {
                    rest.split(',').next().map(|s| s.trim().to_string())
                } else {
                    None
                }
            }
            Language::Javascript | Language::Typescript => text.rsplit_once("from").map(|(_, rest)| {
                rest.trim().trim_matches(|c| c == '"' || c == '\'' || c == ';').to_string()
            }),
            Language::Go => text
                .split('"')
                .find(|part| part.contains('/') || (!part.is_empty() && part.chars().all(char::is_alphabetic)))
                .map(str::to_string),
            Language::Rust => text
                .strip_prefix("use ")
                .map(|rest| rest.trim_end_matches(';').split("::").next().unwrap_or("").trim().to_string()),
            Language::Java => text
                .strip_prefix("import ")
                .map(|rest| rest.trim_end_matches(';').trim().to_string()),
            Language::C | Language::Cpp => {
                if let Some(start) = text.find('<') {
                    text[start + 1..].split('>').next().map(str::to_string)
                } else if let Some(start) = text.find('"') {
                    text[start + 1..].split('"').next().map(str::to_string)
                } else {
                    None
                }
            }
        }
        .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::all()
            .iter()
            .copied()
            .find(|lang| lang.name() == s)
            .ok_or_else(|| ExtractError::UnsupportedLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path("src/main.rs"), Some(Language::Rust));
        assert_eq!(Language::from_path("a/b/app.TSX"), Some(Language::Typescript));
        assert_eq!(Language::from_path("include/util.hh"), Some(Language::Cpp));
        assert_eq!(Language::from_path("README.md"), None);
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(Language::from_tag("golang"), Some(Language::Go));
        assert_eq!(Language::from_tag("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_tag("brainfuck"), None);
    }

    #[test]
    fn test_name_round_trip() {
        for lang in Language::all() {
            assert_eq!(Language::from_str(lang.name()).unwrap(), *lang);
        }
    }

    #[test]
    fn test_import_target_python() {
        let py = Language::Python;
        assert_eq!(py.import_target("from os.path import join"), Some("os.path".to_string()));
        assert_eq!(py.import_target("import json, sys"), Some("json".to_string()));
    }

    #[test]
    fn test_import_target_javascript() {
        let js = Language::Javascript;
        assert_eq!(
            js.import_target("import { join } from 'node:path';"),
            Some("node:path".to_string())
        );
    }

    #[test]
    fn test_import_target_go() {
        let go = Language::Go;
        assert_eq!(go.import_target(r#"import "fmt""#), Some("fmt".to_string()));
        assert_eq!(
            go.import_target(r#"import "net/http""#),
            Some("net/http".to_string())
        );
    }

    #[test]
    fn test_import_target_rust() {
        let rust = Language::Rust;
        assert_eq!(
            rust.import_target("use std::collections::HashMap;"),
            Some("std".to_string())
        );
    }

    #[test]
    fn test_import_target_java() {
        let java = Language::Java;
        assert_eq!(
            java.import_target("import java.util.List;"),
            Some("java.util.List".to_string())
        );
    }

    #[test]
    fn test_import_target_c() {
        let c = Language::C;
        assert_eq!(c.import_target("#include <stdio.h>"), Some("stdio.h".to_string()));
        assert_eq!(c.import_target("#include \"util.h\""), Some("util.h".to_string()));
    }
}
