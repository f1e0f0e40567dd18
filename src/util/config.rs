//! Line-oriented `key = value` parsing helpers for `settings.conf`.

/// What: Check if a line should be skipped (empty or comment).
///
/// Inputs:
/// - `line`: Line to check
///
/// Output:
/// - `true` if the line should be skipped, `false` otherwise
///
/// Details:
/// - Skips empty lines and lines starting with `#`, `//`, or `;`
pub fn skip_comment_or_empty(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("//")
        || trimmed.starts_with(';')
}

/// What: Split a `key = value` line on the first `=`.
///
/// Inputs:
/// - `line`: Line containing key=value format
///
/// Output:
/// - Normalized key and the trimmed raw value; `None` without `=` or key.
///
/// Details:
/// - Keys are lowercased with `.`, `-` and spaces mapped to `_`.
/// - Inline comments are left in place; callers apply [`strip_inline_comment`]
///   except for values such as secrets where `#` and `//` are literal.
pub fn split_key_value(line: &str) -> Option<(String, &str)> {
    let (raw_key, raw_value) = line.trim().split_once('=')?;
    let key = normalize_key(raw_key);
    if key.is_empty() {
        return None;
    }
    Some((key, raw_value.trim()))
}

/// Lowercase a key and map `.`, `-` and spaces to `_`.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['.', '-', ' '], "_")
}

/// What: Drop a trailing `//` or `#` comment from a value.
///
/// Details:
/// - A value starting with `#` keeps that first `#`; only a later one starts a comment.
pub fn strip_inline_comment(mut s: &str) -> &str {
    if let Some(i) = s.find("//") {
        s = &s[..i];
    }
    if let Some(i_rel) = if let Some(stripped) = s.strip_prefix('#') {
        stripped.find('#').map(|j| j + 1)
    } else {
        s.find('#')
    } {
        s = &s[..i_rel];
    }
    s.trim()
}

/// Accept `true/1/yes/on` and `false/0/no/off`, case-insensitively.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
