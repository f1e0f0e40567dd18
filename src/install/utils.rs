/// Safely single-quote an arbitrary string for POSIX shells.
///
/// Inputs: `s` string to quote.
///
/// Output: New string wrapped in single quotes, with inner quotes escaped via `'
/// '"'"'` pattern.
#[must_use]
pub fn shell_single_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\"'\"'");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Single-quote a string for a PowerShell command line.
///
/// Inputs: `s` string to quote.
///
/// Output: `s` wrapped in single quotes with embedded quotes doubled (`''`).
#[must_use]
pub fn powershell_single_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}
