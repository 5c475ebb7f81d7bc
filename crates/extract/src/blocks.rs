//! Code-block recovery from mixed-content text
//!
//! Markdown gets fenced-block extraction; plain text (typically a PDF
//! extraction) falls back to a line scanner that starts at code-looking
//! lines and tracks brace balance. Recovered blocks carry a detected
//! language or are dropped by the caller.

use once_cell::sync::Lazy;
use regex::Regex;

use mnemo_core::CodeBlock;

use crate::language::Language;

/// Fenced blocks shorter than this are noise
const MIN_FENCED_CHARS: usize = 10;
/// Recovered plaintext blocks shorter than this are noise
const MIN_PLAINTEXT_CHARS: usize = 20;
/// Line cap per recovered block
const MAX_BLOCK_LINES: usize = 200;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w*)[ \t]*\n(.*?)```").expect("fence pattern is valid"));

static CODE_START_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^#include\b",
        r"^(int|void|char|float|double|bool|auto|class|struct|template)\s+\w+",
        r"^(public|private|protected)\s*:",
        r"^(def|class)\s+\w+",
        r"^fn\s+\w+",
        r"^func\s+\w+",
        r"^(function|const|let|var)\s+\w+",
        r"^import\s+",
        r"^package\s+",
        r"^using\s+namespace\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("code-start pattern is valid"))
    .collect()
});

/// Extract code blocks from markdown or plain text
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();

    for (i, captures) in FENCED_BLOCK.captures_iter(text).enumerate() {
        let tag = captures
            .get(1)
            .map(|m| m.as_str().trim().to_ascii_lowercase())
            .unwrap_or_default();
        let code = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        if code.chars().count() < MIN_FENCED_CHARS {
            continue;
        }

        let language = fence_language(&tag, code);
        blocks.push(CodeBlock {
            language: language.map(|l| l.name().to_string()),
            code: code.to_string(),
            index: i,
        });
    }

    if blocks.is_empty() {
        blocks = extract_from_plaintext(text);
    }

    blocks
}

fn fence_language(tag: &str, code: &str) -> Option<Language> {
    if let Some(lang) = Language::from_tag(tag) {
        return Some(lang);
    }
    if !tag.is_empty() {
        if let Some(lang) = Language::from_path(&format!(".{tag}")) {
            return Some(lang);
        }
    }
    detect_language_from_content(code)
}

/// Scan plain text for brace-balanced regions that start at a
/// code-looking line
fn extract_from_plaintext(text: &str) -> Vec<CodeBlock> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut blocks = Vec::new();
    let mut i = 0;
    let mut block_idx = 0;

    while i < lines.len() {
        if !is_code_start(lines[i].trim()) {
            i += 1;
            continue;
        }

        let mut brace_depth: i64 = 0;
        let mut found_brace = false;
        let mut j = i;

        while j < lines.len() && j - i < MAX_BLOCK_LINES {
            let line = lines[j];
            brace_depth += line.matches('{').count() as i64;
            brace_depth -= line.matches('}').count() as i64;
            if line.contains('{') {
                found_brace = true;
            }
            if found_brace && brace_depth <= 0 {
                break;
            }
            j += 1;
        }

        let end = (j + 1).min(lines.len());
        let code = lines[i..end].join("\n").trim().to_string();
        if code.chars().count() >= MIN_PLAINTEXT_CHARS && found_brace {
            if let Some(language) = detect_language_from_content(&code) {
                blocks.push(CodeBlock {
                    language: Some(language.name().to_string()),
                    code,
                    index: block_idx,
                });
                block_idx += 1;
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }

    blocks
}

fn is_code_start(line: &str) -> bool {
    CODE_START_PATTERNS.iter().any(|p| p.is_match(line))
}

static PYTHON_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdef \w+\(.*\)\s*:").unwrap());
static RUST_FN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfn \w+").unwrap());
static GO_FUNC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfunc \w+").unwrap());
static JS_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(const|let|var)\b").unwrap());
static C_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(int|void|char|float|double)\s+\w+\s*\(").unwrap());

/// Heuristic language detection from code content
pub fn detect_language_from_content(code: &str) -> Option<Language> {
    let first_line = code.lines().next().unwrap_or("");

    if code.contains("#include") {
        let cpp_markers = code.contains("iostream")
            || code.contains("std::")
            || code.contains("class ")
            || code.contains("cout");
        return Some(if cpp_markers { Language::Cpp } else { Language::C });
    }

    if PYTHON_DEF.is_match(code) {
        return Some(Language::Python);
    }
    if first_line.contains("import ") && !code.contains("java.") {
        return Some(Language::Python);
    }

    if RUST_FN.is_match(code) && (code.contains("::") || code.contains("let ")) {
        return Some(Language::Rust);
    }

    if GO_FUNC.is_match(code) && (code.contains("package ") || code.contains("fmt.")) {
        return Some(Language::Go);
    }

    if code.contains("public class ") || code.contains("import java.") {
        return Some(Language::Java);
    }

    if JS_DECL.is_match(code) && (code.contains("=>") || code.contains("function ")) {
        return Some(Language::Javascript);
    }

    if C_SIGNATURE.is_match(code) {
        let cpp_markers = code.contains("cout")
            || code.contains("cin")
            || code.contains("::")
            || code.contains("class ");
        return Some(if cpp_markers { Language::Cpp } else { Language::C });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_block_with_tag() {
        let text = "Intro text.\n```python\ndef add(a, b):\n    return a + b\n```\nOutro.";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("python"));
        assert!(blocks[0].code.starts_with("def add"));
    }

    #[test]
    fn test_fenced_block_tag_via_extension() {
        let text = "```rs\nfn main() { let x = 1; }\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks[0].language.as_deref(), Some("rust"));
    }

    #[test]
    fn test_fenced_block_untagged_uses_content_heuristic() {
        let text = "```\n#include <stdio.h>\nint main(void) { return 0; }\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks[0].language.as_deref(), Some("c"));
    }

    #[test]
    fn test_short_fenced_blocks_dropped() {
        let blocks = extract_code_blocks("```python\nx = 1\n```");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_plaintext_recovery_brace_balanced() {
        let text = "Figure 3 shows the routine.\n\
                    int main(void) {\n\
                        int x = compute();\n\
                        return x;\n\
                    }\n\
                    The routine above returns a value.";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language.as_deref(), Some("c"));
        assert!(blocks[0].code.ends_with('}'));
        assert!(!blocks[0].code.contains("routine above"));
    }

    #[test]
    fn test_plaintext_requires_braces() {
        let text = "def lonely(x):\n    return x\nprose continues here without braces";
        assert!(extract_code_blocks(text).is_empty());
    }

    #[test]
    fn test_detect_cpp_vs_c() {
        assert_eq!(
            detect_language_from_content("#include <iostream>\nint main() { std::cout << 1; }"),
            Some(Language::Cpp)
        );
        assert_eq!(
            detect_language_from_content("#include <stdio.h>\nint main(void) { return 0; }"),
            Some(Language::C)
        );
    }

    #[test]
    fn test_detect_python() {
        assert_eq!(
            detect_language_from_content("def handler(event):\n    return event"),
            Some(Language::Python)
        );
    }

    #[test]
    fn test_detect_rust() {
        assert_eq!(
            detect_language_from_content("fn run() {\n    let total = items::sum();\n}"),
            Some(Language::Rust)
        );
    }

    #[test]
    fn test_detect_go() {
        assert_eq!(
            detect_language_from_content("package main\n\nfunc main() {\n\tfmt.Println(1)\n}"),
            Some(Language::Go)
        );
    }

    #[test]
    fn test_detect_java() {
        assert_eq!(
            detect_language_from_content("public class App {\n  void run() {}\n}"),
            Some(Language::Java)
        );
    }

    #[test]
    fn test_detect_javascript() {
        assert_eq!(
            detect_language_from_content("const add = (a, b) => {\n  return a + b;\n};"),
            Some(Language::Javascript)
        );
    }

    #[test]
    fn test_detect_nothing() {
        assert_eq!(detect_language_from_content("just prose about software"), None);
    }
}
