//! Unified ingestion gateway
//!
//! Code files are parsed and their structured documents forwarded to the
//! knowledge-graph store. Document files are forwarded as text (PDFs in
//! bounded chunks) and additionally mined for embedded code blocks.
//! Everything else is forwarded as text best-effort. Per-file failures
//! accumulate in `errors` without failing the request.

use std::str::FromStr;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;

use mnemo_core::{IngestResponse, ParseResult};
use mnemo_extract::{extract_code_blocks, parse_file, Language};

use crate::error::ServiceError;
use crate::pdf::{pdf_to_chunks, MAX_CHUNK_CHARS};
use crate::state::ServiceState;

/// Document extensions forwarded as text
const DOC_EXTENSIONS: &[&str] = &[".pdf", ".md", ".txt", ".rst", ".html", ".htm"];

fn workspace_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-workspace")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("default")
        .to_string()
}

fn doc_extension(path: &str) -> Option<&'static str> {
    let lower = path.to_ascii_lowercase();
    DOC_EXTENSIONS.iter().copied().find(|ext| lower.ends_with(ext))
}

async fn collect_files(multipart: &mut Multipart) -> Result<Vec<(String, Vec<u8>)>, ServiceError> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("files") && field.name() != Some("file") {
            continue;
        }
        let file_path = field.file_name().unwrap_or("unknown").to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| ServiceError::BadRequest(format!("Failed to read upload: {e}")))?
            .to_vec();
        files.push((file_path, content));
    }
    Ok(files)
}

pub async fn ingest(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ServiceError> {
    let workspace = workspace_from_headers(&headers);
    let files = collect_files(&mut multipart).await?;

    let mut errors: Vec<String> = Vec::new();
    let mut documents_sent = 0usize;

    for (file_path, content) in &files {
        if let Some(language) = Language::from_path(file_path) {
            match ingest_code_file(&state, file_path, content, language, &workspace).await {
                Ok(()) => documents_sent += 1,
                Err(e) => errors.push(format!("{file_path}: {e}")),
            }
        } else if let Some(ext) = doc_extension(file_path) {
            match ingest_document_file(&state, file_path, content, ext, &workspace).await {
                Ok(sent) => documents_sent += sent,
                Err(e) => errors.push(format!("{file_path}: {e}")),
            }

            // Mine the text for embedded code, independently of the
            // text forwarding above
            match ingest_embedded_code(&state, file_path, content, ext, &workspace).await {
                Ok(sent) => documents_sent += sent,
                Err(e) => errors.push(format!("{file_path} (code extraction): {e}")),
            }
        } else {
            let text = String::from_utf8_lossy(content);
            match state.archival.ingest_text(&text, &workspace).await {
                Ok(()) => documents_sent += 1,
                Err(e) => errors.push(format!("{file_path}: {e}")),
            }
        }
    }

    Ok(Json(IngestResponse {
        workspace,
        files_processed: files.len(),
        documents_sent,
        errors,
    }))
}

async fn ingest_code_file(
    state: &ServiceState,
    file_path: &str,
    content: &[u8],
    language: Language,
    workspace: &str,
) -> anyhow::Result<()> {
    let text = String::from_utf8_lossy(content);
    let result = parse_file(file_path, &text, language)?;
    state.archival.ingest_text(&result.document, workspace).await?;
    Ok(())
}

/// Forward a document file as text; PDFs go in bounded labeled chunks
async fn ingest_document_file(
    state: &ServiceState,
    file_path: &str,
    content: &[u8],
    ext: &str,
    workspace: &str,
) -> anyhow::Result<usize> {
    let mut sent = 0usize;

    if ext == ".pdf" {
        let chunks = pdf_to_chunks(content, MAX_CHUNK_CHARS)?;
        let total = chunks.len();
        tracing::info!(file_path = %file_path, chunks = total, "Ingesting PDF");
        for (i, chunk) in chunks.iter().enumerate() {
            let label = format!("{file_path} (part {}/{})", i + 1, total);
            state
                .archival
                .ingest_text(&format!("# {label}\n\n{chunk}"), workspace)
                .await?;
            sent += 1;
        }
    } else {
        let text = String::from_utf8_lossy(content);
        state.archival.ingest_text(&text, workspace).await?;
        sent += 1;
    }

    Ok(sent)
}

/// Recover code blocks from the document text and ingest their structured
/// documents under synthetic file names
async fn ingest_embedded_code(
    state: &ServiceState,
    file_path: &str,
    content: &[u8],
    ext: &str,
    workspace: &str,
) -> anyhow::Result<usize> {
    let text = if ext == ".pdf" {
        pdf_to_chunks(content, MAX_CHUNK_CHARS)?.join("\n\n")
    } else {
        String::from_utf8_lossy(content).into_owned()
    };

    let mut sent = 0usize;
    for block in extract_code_blocks(&text) {
        let Some(language) = block
            .language
            .as_deref()
            .and_then(|name| Language::from_str(name).ok())
        else {
            continue;
        };

        let synthetic_name = format!("{file_path}:block_{}{}", block.index, language.extension());
        let result = parse_file(&synthetic_name, &block.code, language)?;
        state.archival.ingest_text(&result.document, workspace).await?;
        sent += 1;
        tracing::info!(
            file_path,
            block = block.index,
            language = %language,
            entities = result.entities.len(),
            "Ingested embedded code block"
        );
    }

    Ok(sent)
}

/// Parse a single code file and return the structured result
pub async fn parse_single(mut multipart: Multipart) -> Result<Json<ParseResult>, ServiceError> {
    let files = collect_files(&mut multipart).await?;
    let (file_path, content) = files
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::BadRequest("Missing file".to_string()))?;

    let language = Language::from_path(&file_path)
        .ok_or_else(|| ServiceError::BadRequest(format!("Unsupported file type: {file_path}")))?;

    let text = String::from_utf8_lossy(&content);
    let result = parse_file(&file_path, &text, language)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok(Json(result))
}

/// Parse multiple code files, skipping unsupported ones
pub async fn parse_batch(mut multipart: Multipart) -> Result<Json<Vec<ParseResult>>, ServiceError> {
    let files = collect_files(&mut multipart).await?;
    let mut results = Vec::new();

    for (file_path, content) in files {
        let Some(language) = Language::from_path(&file_path) else {
            continue;
        };
        let text = String::from_utf8_lossy(&content);
        match parse_file(&file_path, &text, language) {
            Ok(result) => results.push(result),
            Err(e) => tracing::warn!(file_path = %file_path, error = %e, "Parse failed, skipping"),
        }
    }

    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_extension_recognition() {
        assert_eq!(doc_extension("paper.PDF"), Some(".pdf"));
        assert_eq!(doc_extension("notes.md"), Some(".md"));
        assert_eq!(doc_extension("main.rs"), None);
    }

    #[test]
    fn test_code_files_win_over_doc_extensions() {
        // Routing checks code extensions first
        assert!(Language::from_path("script.py").is_some());
        assert!(Language::from_path("notes.txt").is_none());
    }
}
