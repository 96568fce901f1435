//! Comparison keys for study descriptions.
//!
//! Descriptions typed by technologists vary in case, spacing and
//! punctuation ("Chest X-Ray", "CHEST XRAY", "chest   x-ray"). Routing
//! compares the keys produced here, never the raw strings.

/// Reduce `s` to its ASCII letters and digits, lowercased.
///
/// Everything else (whitespace, punctuation, non-ASCII) is dropped, so the
/// result is stable under a second application.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
