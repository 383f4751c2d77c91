//! Shared utility functions
//! Common helpers used across the codebase

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in seconds
#[inline]
#[must_use]
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Get current Unix timestamp in milliseconds
#[inline]
#[must_use]
pub fn current_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

/// Clean markdown code blocks from AI responses
/// Handles ```json and ``` wrappers commonly returned by LLMs
#[inline]
#[must_use]
pub fn clean_json_response(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Truncate to at most `max_chars` characters, respecting UTF-8 boundaries
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Mask a secret for logs, keeping only the last `visible` characters
#[must_use]
pub fn mask_secret(secret: &str, visible: usize) -> String {
    let count = secret.chars().count();
    if count <= visible {
        return "***".to_string();
    }
    let tail: String = secret.chars().skip(count - visible).collect();
    format!("***{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("```json\n{}\n```"), "{}");
        assert_eq!(clean_json_response("```\n{}\n```"), "{}");
        assert_eq!(clean_json_response("{}"), "{}");
        assert_eq!(clean_json_response("  {}  "), "{}");
    }

    #[test]
    fn test_timestamp() {
        let ts = current_timestamp();
        assert!(ts > 0);
        // Should be after 2024
        assert!(ts > 1704067200);
    }

    #[test]
    fn test_truncate_chars_keeps_multibyte_intact() {
        assert_eq!(truncate_chars("não funciona", 3), "não");
        assert_eq!(truncate_chars("ok", 10), "ok");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("sk-abcdefghijklmnop", 4), "***mnop");
        assert_eq!(mask_secret("abc", 4), "***");
    }
}
