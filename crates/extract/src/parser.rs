//! Structured source parsing
//!
//! Walks a tree-sitter syntax tree and emits entities and relationships,
//! then renders them as a natural-language document for the knowledge
//! graph. Dispatch is driven by the per-language node-kind tables in
//! `language`.

use tree_sitter::{Node, Parser};

use mnemo_core::{Entity, EntityKind, ParseResult, RelationKind, Relationship};

use crate::language::{Language, BODY_KINDS};
use crate::ExtractError;

const MAX_DOCSTRING_CHARS: usize = 200;

/// Parse one source file into entities, relationships, and a document
pub fn parse_file(
    file_path: &str,
    content: &str,
    language: Language,
) -> Result<ParseResult, ExtractError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|e| ExtractError::Parse(format!("grammar rejected: {e}")))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| ExtractError::Parse("parser produced no tree".to_string()))?;

    let module_name = file_path.rsplit('/').next().unwrap_or(file_path).to_string();

    let mut entities = vec![Entity {
        name: module_name.clone(),
        kind: EntityKind::Module,
        file_path: file_path.to_string(),
        line_start: 1,
        line_end: content.matches('\n').count() + 1,
        signature: None,
        docstring: None,
        parent: None,
    }];
    let mut relationships = Vec::new();

    extract(
        tree.root_node(),
        content,
        file_path,
        language,
        &module_name,
        &mut entities,
        &mut relationships,
    );

    let document = build_document(file_path, language, &entities, &relationships);
    Ok(ParseResult {
        file_path: file_path.to_string(),
        language: language.name().to_string(),
        document,
        entities,
        relationships,
    })
}

fn extract(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    language: Language,
    parent_name: &str,
    entities: &mut Vec<Entity>,
    relationships: &mut Vec<Relationship>,
) {
    let class_kinds = language.class_kinds();
    let func_kinds = language.function_kinds();
    let import_kinds = language.import_kinds();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();

        if class_kinds.contains(&kind) {
            let Some(name) = node_name(child, source) else {
                continue;
            };
            let entity_kind = if kind.contains("interface") {
                EntityKind::Interface
            } else {
                EntityKind::Class
            };
            entities.push(Entity {
                name: name.clone(),
                kind: entity_kind,
                file_path: file_path.to_string(),
                line_start: child.start_position().row + 1,
                line_end: child.end_position().row + 1,
                signature: None,
                docstring: docstring(child, language, source),
                parent: Some(parent_name.to_string()),
            });
            relationships.push(Relationship {
                source: parent_name.to_string(),
                target: name.clone(),
                kind: RelationKind::Contains,
            });
            extract_inheritance(child, language, &name, source, relationships);
            extract(child, source, file_path, language, &name, entities, relationships);
        } else if func_kinds.contains(&kind) {
            let Some(name) = node_name(child, source) else {
                continue;
            };
            let is_method = entities
                .iter()
                .any(|e| e.kind.is_class_like() && e.name == parent_name);
            let entity_name = if is_method {
                format!("{parent_name}.{name}")
            } else {
                name.clone()
            };
            entities.push(Entity {
                name: entity_name,
                kind: if is_method {
                    EntityKind::Method
                } else {
                    EntityKind::Function
                },
                file_path: file_path.to_string(),
                line_start: child.start_position().row + 1,
                line_end: child.end_position().row + 1,
                signature: Some(signature(child, source)),
                docstring: docstring(child, language, source),
                parent: Some(parent_name.to_string()),
            });
            relationships.push(Relationship {
                source: parent_name.to_string(),
                target: name,
                kind: RelationKind::Contains,
            });
        } else if import_kinds.contains(&kind) {
            let text = node_text(child, source).trim().to_string();
            if let Some(target) = language.import_target(&text) {
                relationships.push(Relationship {
                    source: parent_name.to_string(),
                    target,
                    kind: RelationKind::Imports,
                });
            }
        } else if child.child_count() > 0 {
            // Wrappers like decorated definitions
            extract(child, source, file_path, language, parent_name, entities, relationships);
        }
    }
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" | "type_identifier" | "name" | "field_identifier" | "property_identifier" => {
                return Some(node_text(child, source).to_string());
            }
            // Go type declarations and C declarators wrap the name one
            // level deeper
            "type_spec" | "function_declarator" | "pointer_declarator" => {
                if let Some(name) = node_name(child, source) {
                    return Some(name);
                }
            }
            _ => {}
        }
    }
    None
}

/// Source text from the definition start up to its body block, falling
/// back to the first line
fn signature(node: Node<'_>, source: &str) -> String {
    let start = node.start_byte();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if BODY_KINDS.contains(&child.kind()) {
            return source[start..child.start_byte()].trim().to_string();
        }
    }
    node_text(node, source)
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn docstring(node: Node<'_>, language: Language, source: &str) -> Option<String> {
    match language {
        Language::Python => python_docstring(node, source),
        _ => preceding_comment(node, source),
    }
    .map(|doc| doc.chars().take(MAX_DOCSTRING_CHARS).collect())
}

/// First string literal in the definition body
fn python_docstring(node: Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let block = node.children(&mut cursor).find(|c| c.kind() == "block")?;
    let mut block_cursor = block.walk();
    let stmt = block
        .children(&mut block_cursor)
        .find(|c| c.kind() == "expression_statement")?;
    let mut stmt_cursor = stmt.walk();
    let string = stmt.children(&mut stmt_cursor).find(|c| c.kind() == "string")?;
    let text = node_text(string, source)
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();
    Some(text)
}

/// The comment sibling immediately before a definition, stripped of its
/// delimiters
fn preceding_comment(node: Node<'_>, source: &str) -> Option<String> {
    let prev = node.prev_sibling()?;
    if !matches!(prev.kind(), "comment" | "block_comment" | "line_comment") {
        return None;
    }
    let text = node_text(prev, source)
        .trim_matches(|c| matches!(c, '/' | '*' | ' ' | '\n'))
        .to_string();
    Some(text)
}

fn extract_inheritance(
    node: Node<'_>,
    language: Language,
    class_name: &str,
    source: &str,
    relationships: &mut Vec<Relationship>,
) {
    match language {
        Language::Python => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() != "argument_list" {
                    continue;
                }
                let mut args = child.walk();
                for arg in child.children(&mut args) {
                    if arg.kind() == "identifier" {
                        relationships.push(Relationship {
                            source: class_name.to_string(),
                            target: node_text(arg, source).to_string(),
                            kind: RelationKind::Extends,
                        });
                    }
                }
            }
        }
        Language::Java | Language::Typescript | Language::Javascript => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "superclass" => {
                        if let Some(name) = node_name(child, source) {
                            relationships.push(Relationship {
                                source: class_name.to_string(),
                                target: name,
                                kind: RelationKind::Extends,
                            });
                        }
                    }
                    "super_interfaces" => {
                        let mut ifaces = child.walk();
                        for iface in child.children(&mut ifaces) {
                            if matches!(iface.kind(), "type_identifier" | "identifier") {
                                relationships.push(Relationship {
                                    source: class_name.to_string(),
                                    target: node_text(iface, source).to_string(),
                                    kind: RelationKind::Implements,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

/// Render the parse output as a structured natural-language document
fn build_document(
    file_path: &str,
    language: Language,
    entities: &[Entity],
    relationships: &[Relationship],
) -> String {
    let mut lines = vec![format!("# Module: {file_path} ({language})"), String::new()];

    let imports: Vec<&Relationship> = relationships
        .iter()
        .filter(|r| r.kind == RelationKind::Imports)
        .collect();
    if !imports.is_empty() {
        lines.push("## Imports".to_string());
        for r in &imports {
            lines.push(format!("- {}", r.target));
        }
        lines.push(String::new());
    }

    for class in entities.iter().filter(|e| e.kind.is_class_like()) {
        let keyword = if class.kind == EntityKind::Interface {
            "Interface"
        } else {
            "Class"
        };
        lines.push(format!("## {keyword}: {}", class.name));
        lines.push(format!("Defined at lines {}-{}.", class.line_start, class.line_end));

        for r in relationships.iter().filter(|r| {
            r.source == class.name && matches!(r.kind, RelationKind::Extends | RelationKind::Implements)
        }) {
            let verb = if r.kind == RelationKind::Extends {
                "Extends"
            } else {
                "Implements"
            };
            lines.push(format!("{verb} {}.", r.target));
        }

        if let Some(doc) = &class.docstring {
            lines.push(format!("Docstring: \"{doc}\""));
        }
        lines.push(String::new());

        for method in entities
            .iter()
            .filter(|e| e.kind == EntityKind::Method && e.parent.as_deref() == Some(class.name.as_str()))
        {
            lines.push(format!("### Method: {}", method.name));
            if let Some(sig) = &method.signature {
                lines.push(format!("Signature: {sig}"));
            }
            lines.push(format!("Defined at lines {}-{}.", method.line_start, method.line_end));
            if let Some(doc) = &method.docstring {
                lines.push(format!("Docstring: \"{doc}\""));
            }
            lines.push(String::new());
        }
    }

    let functions: Vec<&Entity> = entities.iter().filter(|e| e.kind == EntityKind::Function).collect();
    if !functions.is_empty() {
        lines.push("## Functions".to_string());
        for function in functions {
            lines.push(format!("### Function: {}", function.name));
            if let Some(sig) = &function.signature {
                lines.push(format!("Signature: {sig}"));
            }
            lines.push(format!(
                "Defined at lines {}-{}.",
                function.line_start, function.line_end
            ));
            if let Some(doc) = &function.docstring {
                lines.push(format!("Docstring: \"{doc}\""));
            }
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_SOURCE: &str = r#"import json
from os import path

class Broker(Base):
    """Routes messages between queues."""

    def publish(self, topic, payload):
        """Send one message."""
        return self.backend.send(topic, payload)

def connect(url):
    return Broker(url)
"#;

    fn parse_python() -> ParseResult {
        parse_file("app/broker.py", PYTHON_SOURCE, Language::Python).unwrap()
    }

    #[test]
    fn test_python_entities() {
        let result = parse_python();
        let names: Vec<&str> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"broker.py"));
        assert!(names.contains(&"Broker"));
        assert!(names.contains(&"Broker.publish"));
        assert!(names.contains(&"connect"));

        let publish = result
            .entities
            .iter()
            .find(|e| e.name == "Broker.publish")
            .unwrap();
        assert_eq!(publish.kind, EntityKind::Method);
        assert_eq!(publish.parent.as_deref(), Some("Broker"));
        assert_eq!(publish.docstring.as_deref(), Some("Send one message."));

        let connect = result.entities.iter().find(|e| e.name == "connect").unwrap();
        assert_eq!(connect.kind, EntityKind::Function);
        assert!(connect.signature.as_deref().unwrap().starts_with("def connect(url)"));
    }

    #[test]
    fn test_python_relationships() {
        let result = parse_python();
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Imports && r.target == "json" && r.source == "broker.py"
        }));
        assert!(result
            .relationships
            .iter()
            .any(|r| r.kind == RelationKind::Imports && r.target == "os"));
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Extends && r.source == "Broker" && r.target == "Base"
        }));
        assert!(result.relationships.iter().any(|r| {
            r.kind == RelationKind::Contains && r.source == "broker.py" && r.target == "Broker"
        }));
    }

    #[test]
    fn test_line_ranges_are_ordered() {
        let result = parse_python();
        for entity in &result.entities {
            assert!(entity.line_start <= entity.line_end, "{:?}", entity.name);
        }
    }

    #[test]
    fn test_relationship_sources_resolve_to_entities() {
        let result = parse_python();
        for rel in &result.relationships {
            assert!(
                result.entities.iter().any(|e| e.name == rel.source),
                "dangling source {:?}",
                rel.source
            );
        }
    }

    #[test]
    fn test_document_layout() {
        let result = parse_python();
        assert!(result.document.starts_with("# Module: app/broker.py (python)"));
        assert!(result.document.contains("## Imports\n- json"));
        assert!(result.document.contains("## Class: Broker"));
        assert!(result.document.contains("Extends Base."));
        assert!(result.document.contains("### Method: Broker.publish"));
        assert!(result.document.contains("## Functions\n### Function: connect"));
    }

    #[test]
    fn test_rust_items() {
        let source = r#"use std::collections::HashMap;

/// In-memory queue state.
pub struct Queue {
    items: HashMap<String, u64>,
}

pub fn drain(queue: &mut Queue) -> usize {
    queue.items.len()
}
"#;
        let result = parse_file("src/queue.rs", source, Language::Rust).unwrap();
        let queue = result.entities.iter().find(|e| e.name == "Queue").unwrap();
        assert_eq!(queue.kind, EntityKind::Class);
        assert_eq!(queue.docstring.as_deref(), Some("In-memory queue state."));

        let drain = result.entities.iter().find(|e| e.name == "drain").unwrap();
        assert_eq!(drain.kind, EntityKind::Function);
        assert!(drain.signature.as_deref().unwrap().contains("fn drain"));

        assert!(result
            .relationships
            .iter()
            .any(|r| r.kind == RelationKind::Imports && r.target == "std"));
    }

    #[test]
    fn test_go_type_and_import() {
        let source = r#"package queue

import "fmt"

type Worker struct {
	id int
}

func Run(w Worker) {
	fmt.Println(w.id)
}
"#;
        let result = parse_file("worker.go", source, Language::Go).unwrap();
        assert!(result
            .entities
            .iter()
            .any(|e| e.name == "Worker" && e.kind == EntityKind::Class));
        assert!(result
            .entities
            .iter()
            .any(|e| e.name == "Run" && e.kind == EntityKind::Function));
        assert!(result
            .relationships
            .iter()
            .any(|r| r.kind == RelationKind::Imports && r.target == "fmt"));
    }

    #[test]
    fn test_typescript_interface() {
        let source = r#"export interface Store {
  get(key: string): string;
}

class MemoryStore implements Store {
  get(key: string): string {
    return key;
  }
}
"#;
        let result = parse_file("store.ts", source, Language::Typescript).unwrap();
        let iface = result.entities.iter().find(|e| e.name == "Store").unwrap();
        assert_eq!(iface.kind, EntityKind::Interface);
        assert!(result
            .entities
            .iter()
            .any(|e| e.name == "MemoryStore" && e.kind == EntityKind::Class));
    }

    #[test]
    fn test_c_include_and_function() {
        let source = r#"#include <stdio.h>

int main(void) {
    printf("hi\n");
    return 0;
}
"#;
        let result = parse_file("main.c", source, Language::C).unwrap();
        assert!(result
            .relationships
            .iter()
            .any(|r| r.kind == RelationKind::Imports && r.target == "stdio.h"));
        let main = result.entities.iter().find(|e| e.name == "main").unwrap();
        assert_eq!(main.kind, EntityKind::Function);
        assert!(main.signature.as_deref().unwrap().starts_with("int main"));
    }
}
