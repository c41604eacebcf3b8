//! Output trimming helpers shared by the dispatcher and verifier.

/// Keep at most `limit` characters, respecting UTF-8 boundaries.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Pick the first non-blank stream (stderr before stdout), trimmed, or `fallback`.
pub fn failure_text(stderr: &str, stdout: &str, fallback: &str) -> String {
    [stderr, stdout]
        .into_iter()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
