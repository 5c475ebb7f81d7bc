//! Workspace derivation
//!
//! Every downstream call made within the scope of one inbound request must
//! carry the same workspace tag. The tag is derived once per request with
//! the precedence: request body > `X-Workspace` header > system prompt >
//! `"default"`, and is always sanitized to `[A-Za-z0-9_-]{1,64}`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::chat::{ChatMessage, Role};

pub const DEFAULT_WORKSPACE: &str = "default";

static SYSTEM_PROMPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:workspace|project)\s*[:=]\s*["']?(\S+?)["']?(?:\s|$)"#)
        .expect("workspace pattern is valid")
});

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("sanitize pattern is valid"));

/// Sanitize a raw workspace tag to `[A-Za-z0-9_-]{1,64}`, falling back to
/// `"default"` when nothing survives
pub fn sanitize_workspace(name: &str) -> String {
    let cleaned = INVALID_CHARS.replace_all(name.trim(), "-");
    let truncated: String = cleaned.chars().take(64).collect();
    if truncated.is_empty() {
        DEFAULT_WORKSPACE.to_string()
    } else {
        truncated
    }
}

/// Derive the workspace for a request.
///
/// The system-prompt scan is best-effort; the first match wins.
pub fn derive_workspace(
    explicit: Option<&str>,
    header: Option<&str>,
    messages: &[ChatMessage],
) -> String {
    if let Some(ws) = explicit.filter(|s| !s.trim().is_empty()) {
        return sanitize_workspace(ws);
    }

    if let Some(ws) = header.filter(|s| !s.trim().is_empty()) {
        return sanitize_workspace(ws);
    }

    for msg in messages {
        if msg.role != Role::System {
            continue;
        }
        let content = msg.text();
        if content.is_empty() {
            continue;
        }
        if let Some(caps) = SYSTEM_PROMPT_PATTERN.captures(content) {
            if let Some(m) = caps.get(1) {
                return sanitize_workspace(m.as_str());
            }
        }
    }

    DEFAULT_WORKSPACE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid(ws: &str) -> bool {
        !ws.is_empty() && ws.len() <= 64 && ws.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    #[test]
    fn test_sanitize_always_valid() {
        let long = "x".repeat(200);
        for input in ["", "  ", "my workspace!", "a/b/c", "ok_tag-1", "日本語", long.as_str()] {
            let out = sanitize_workspace(input);
            assert!(is_valid(&out), "invalid output {:?} for input {:?}", out, input);
        }
    }

    #[test]
    fn test_sanitize_is_identity_on_valid_input() {
        let max_len = "y".repeat(64);
        for input in ["default", "team-a", "Proj_42", max_len.as_str()] {
            assert_eq!(sanitize_workspace(input), input);
        }
    }

    #[test]
    fn test_sanitize_replaces_invalid_chars() {
        assert_eq!(sanitize_workspace("my project"), "my-project");
        assert_eq!(sanitize_workspace(" spaced "), "spaced");
    }

    #[test]
    fn test_precedence_body_over_header() {
        let ws = derive_workspace(Some("body-ws"), Some("header-ws"), &[]);
        assert_eq!(ws, "body-ws");
    }

    #[test]
    fn test_precedence_header_over_system_prompt() {
        let messages = vec![ChatMessage::system("workspace: prompt-ws")];
        assert_eq!(derive_workspace(None, Some("header-ws"), &messages), "header-ws");
    }

    #[test]
    fn test_system_prompt_extraction() {
        let messages = vec![ChatMessage::system("You are helpful. Project = \"acme\" rules apply.")];
        assert_eq!(derive_workspace(None, None, &messages), "acme");
    }

    #[test]
    fn test_first_match_wins() {
        let messages = vec![ChatMessage::system("workspace: first\nworkspace: second")];
        assert_eq!(derive_workspace(None, None, &messages), "first");
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let messages = vec![ChatMessage::user("hello")];
        assert_eq!(derive_workspace(None, None, &messages), DEFAULT_WORKSPACE);
    }
}
