//! Archive unpacking for codebase ingestion
//!
//! Recognizes tar (plain, gz, bz2, xz) and zip archives by filename
//! suffix. Members are filtered by path and size rules and capped; a
//! malformed archive yields an empty list and the job-level error is left
//! to the caller.

use std::io::{Cursor, Read};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Per-file size cap
const MAX_FILE_SIZE: u64 = 1024 * 1024;
/// Hard cap on extracted members
const MAX_FILES: usize = 2000;

const SKIP_DIRS: &[&str] = &[
    "__pycache__",
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    ".tox",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    ".next",
    "target",
];

const SKIP_EXTENSIONS: &[&str] = &[
    ".pyc", ".pyo", ".so", ".dylib", ".dll", ".o", ".a",
    ".class", ".jar", ".war", ".exe", ".bin",
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".bmp",
    ".woff", ".woff2", ".ttf", ".eot",
    ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z",
    ".lock", ".map",
];

/// Extract regular files from an archive, applying the skip rules
pub fn extract_archive(data: &[u8], filename: &str) -> Vec<(String, Vec<u8>)> {
    let lower = filename.to_ascii_lowercase();

    if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
        extract_tar(GzDecoder::new(data))
    } else if lower.ends_with(".tar.bz2") {
        extract_tar(BzDecoder::new(data))
    } else if lower.ends_with(".tar.xz") {
        extract_tar(XzDecoder::new(data))
    } else if lower.ends_with(".tar") {
        extract_tar(data)
    } else if lower.ends_with(".zip") {
        extract_zip(data)
    } else {
        Vec::new()
    }
}

fn extract_tar<R: Read>(reader: R) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(reader);
    let mut files = Vec::new();

    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable tar archive");
            return Vec::new();
        }
    };

    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed tar entry, abandoning archive");
                return Vec::new();
            }
        };
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        let size = entry.header().size().unwrap_or(0);
        if should_skip(&path, size) {
            continue;
        }
        let mut content = Vec::with_capacity(size as usize);
        if entry.read_to_end(&mut content).is_err() {
            continue;
        }
        files.push((path, content));
        if files.len() >= MAX_FILES {
            break;
        }
    }

    files
}

fn extract_zip(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = match ZipArchive::new(Cursor::new(data)) {
        Ok(archive) => archive,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable zip archive");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut file = match archive.by_index(i) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed zip entry, abandoning archive");
                return Vec::new();
            }
        };
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        let size = file.size();
        if should_skip(&path, size) {
            continue;
        }
        let mut content = Vec::with_capacity(size as usize);
        if file.read_to_end(&mut content).is_err() {
            continue;
        }
        files.push((path, content));
        if files.len() >= MAX_FILES {
            break;
        }
    }

    files
}

/// Skip rules shared by both formats: hidden or tooling directories,
/// binary/lock suffixes, empty or oversized members
fn should_skip(path: &str, size: u64) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| s.starts_with('.')) {
        return true;
    }
    if segments.iter().any(|s| SKIP_DIRS.contains(s)) {
        return true;
    }

    if let Some(name) = segments.last() {
        if let Some(dot) = name.rfind('.') {
            let ext = name[dot..].to_ascii_lowercase();
            if SKIP_EXTENSIONS.contains(&ext.as_str()) {
                return true;
            }
        }
    }

    size == 0 || size > MAX_FILE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
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

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in files {
            writer.start_file(*path, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_skip_rules() {
        assert!(should_skip(".env", 10));
        assert!(should_skip("src/.hidden/main.py", 10));
        assert!(should_skip("app/__pycache__/mod.pyc", 10));
        assert!(should_skip("web/node_modules/pkg/index.js", 10));
        assert!(should_skip("cache/module.pyc", 10));
        assert!(should_skip("assets/logo.PNG", 10));
        assert!(should_skip("src/empty.py", 0));
        assert!(should_skip("src/huge.py", MAX_FILE_SIZE + 1));
        assert!(!should_skip("src/main.py", 10));
        assert!(!should_skip("cmd/server/main.go", 10));
    }

    #[test]
    fn test_tar_gz_extraction_filters_members() {
        let data = tar_gz(&[
            ("app/main.py", b"print('hi')".as_slice()),
            ("app/util.go", b"package util".as_slice()),
            ("app/cache.pyc", b"\x00\x01".as_slice()),
            ("app/.git/config", b"[core]".as_slice()),
        ]);
        let files = extract_archive(&data, "project.tar.gz");
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["app/main.py", "app/util.go"]);
        assert_eq!(files[0].1, b"print('hi')");
    }

    #[test]
    fn test_zip_extraction_filters_members() {
        let data = zip_bytes(&[
            ("src/lib.rs", b"pub fn x() {}".as_slice()),
            ("target/debug/lib.rlib", b"bin".as_slice()),
        ]);
        let files = extract_archive(&data, "project.zip");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "src/lib.rs");
    }

    #[test]
    fn test_unrecognized_suffix() {
        assert!(extract_archive(b"whatever", "notes.txt").is_empty());
    }

    #[test]
    fn test_malformed_archives_yield_empty() {
        assert!(extract_archive(b"definitely not a tarball", "x.tar.gz").is_empty());
        assert!(extract_archive(b"definitely not a zip", "x.zip").is_empty());
    }
}
