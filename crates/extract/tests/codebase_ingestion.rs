//! Integration tests for the codebase ingestion path
//! (archive -> unpack -> structured parse -> document)

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use mnemo_core::{EntityKind, RelationKind};
use mnemo_extract::{extract_archive, extract_code_blocks, parse_file, Language};

fn build_tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

const PY_FILE: &[u8] = b"import json\n\nclass Handler:\n    def run(self):\n        return json.dumps({})\n";
const GO_FILE: &[u8] = b"package app\n\nimport \"fmt\"\n\nfunc Serve() {\n\tfmt.Println(\"up\")\n}\n";

/// An archive with compiled artifacts only yields the two source files,
/// and both parse into module-rooted entity graphs
#[test]
fn test_archive_to_parse_results() {
    let archive = build_tar_gz(&[
        ("app/handler.py", PY_FILE),
        ("app/server.go", GO_FILE),
        ("app/handler.pyc", b"\x00\x01\x02"),
        ("app/__pycache__/handler.cpython-311.pyc", b"\x00"),
        ("app/.git/HEAD", b"ref: refs/heads/main"),
    ]);

    let files = extract_archive(&archive, "codebase.tar.gz");
    assert_eq!(files.len(), 2);

    let mut parsed = Vec::new();
    for (path, content) in &files {
        let language = Language::from_path(path).expect("both survivors are source files");
        let text = String::from_utf8_lossy(content);
        parsed.push(parse_file(path, &text, language).unwrap());
    }

    let python = parsed.iter().find(|p| p.language == "python").unwrap();
    assert!(python
        .entities
        .iter()
        .any(|e| e.name == "Handler" && e.kind == EntityKind::Class));
    assert!(python
        .entities
        .iter()
        .any(|e| e.name == "Handler.run" && e.kind == EntityKind::Method));
    assert!(python
        .relationships
        .iter()
        .any(|r| r.kind == RelationKind::Imports && r.target == "json"));

    let go = parsed.iter().find(|p| p.language == "go").unwrap();
    assert!(go
        .entities
        .iter()
        .any(|e| e.name == "Serve" && e.kind == EntityKind::Function));
    assert!(go.document.contains("# Module: app/server.go (go)"));

    // Every relationship source resolves to an entity in its file
    for result in &parsed {
        for rel in &result.relationships {
            assert!(
                result.entities.iter().any(|e| e.name == rel.source),
                "dangling relationship source {:?} in {}",
                rel.source,
                result.file_path
            );
        }
    }
}

/// Markdown with a fenced block round-trips into a parsed synthetic module
#[test]
fn test_mixed_content_to_parse_result() {
    let text = "Design notes.\n\n```rust\nfn spawn_worker(count: usize) {\n    let pool = Pool::new(count);\n    pool.run();\n}\n```\n";
    let blocks = extract_code_blocks(text);
    assert_eq!(blocks.len(), 1);

    let block = &blocks[0];
    let language: Language = block.language.as_deref().unwrap().parse().unwrap();
    assert_eq!(language, Language::Rust);

    let synthetic = format!("notes.md:block_{}{}", block.index, language.extension());
    let result = parse_file(&synthetic, &block.code, language).unwrap();

    assert_eq!(result.file_path, "notes.md:block_0.rs");
    assert!(result
        .entities
        .iter()
        .any(|e| e.name == "spawn_worker" && e.kind == EntityKind::Function));
}
