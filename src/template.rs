//! Per-platform install command templates.
//!
//! A template is a JSON object mapping platform tags to shell command strings,
//! e.g. `{"linux": "apt-get install -y firefox", "macos": "brew install --cask firefox"}`.
//! Catalog rows store it either as text (sometimes wrapped in noise or double
//! encoded) or as an already decoded mapping.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::platform::Platform;

/// Separator that joins a primary command and its fallback on macOS.
pub const FALLBACK_SEPARATOR: &str = "||";

/// Ways a command template can fail to yield a command for the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No JSON object could be located in the text, or it did not parse.
    #[error("invalid installation command format: {0}")]
    MalformedTemplate(String),
    /// The template decoded to something other than a non-empty object.
    #[error("invalid installation command format: must be an object with platform-specific commands")]
    InvalidShape,
    /// The object has no usable entry for the requested platform.
    #[error("no installation command available for {0}")]
    UnsupportedPlatform(Platform),
}

/// Raw `install_command` column as stored by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTemplate {
    /// Text expected to contain a JSON object.
    Text(String),
    /// Mapping decoded by the storage layer.
    Decoded(Value),
}

impl From<&str> for RawTemplate {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RawTemplate {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for RawTemplate {
    fn from(v: Value) -> Self {
        Self::Decoded(v)
    }
}

/// A decoded template: a non-empty object of platform tag to command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    entries: Map<String, Value>,
}

impl CommandTemplate {
    /// What: Look up the command for `platform`.
    ///
    /// Output:
    /// - The command string unmodified, or `UnsupportedPlatform` when the key is
    ///   missing, not a string, or blank.
    ///
    /// # Errors
    /// - `DecodeError::UnsupportedPlatform` as described above.
    pub fn command_for(&self, platform: Platform) -> Result<&str, DecodeError> {
        match self.entries.get(platform.tag()) {
            Some(Value::String(cmd)) if !cmd.trim().is_empty() => Ok(cmd.as_str()),
            _ => Err(DecodeError::UnsupportedPlatform(platform)),
        }
    }

    /// Platform keys present in the template, in document order.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// What: Decode a raw template into its per-platform mapping.
///
/// Inputs:
/// - `raw`: Text or pre-decoded value from the catalog.
///
/// Output:
/// - `CommandTemplate` when the input is (or contains) a non-empty JSON object.
///
/// # Errors
/// - `MalformedTemplate` when text holds no parseable object.
/// - `InvalidShape` when the value is null, an array, a scalar, or `{}`.
///
/// Details:
/// - Text is trimmed and a leading byte-order mark dropped.
/// - Text that does not start with `{` is reduced to the span from the first
///   `{` to the last `}`.
/// - A JSON string literal whose content is itself an object is unwrapped once
///   (double-encoded rows).
pub fn decode(raw: &RawTemplate) -> Result<CommandTemplate, DecodeError> {
    match raw {
        RawTemplate::Text(text) => decode_text(text, true),
        RawTemplate::Decoded(value) => from_value(value.clone()),
    }
}

/// What: Resolve the host command from a raw template.
///
/// Inputs:
/// - `raw`: Template as stored.
/// - `platform`: Host platform tag.
///
/// Output:
/// - The command for `platform`, without any escaping applied.
///
/// # Errors
/// - Any `DecodeError` from [`decode`] or [`CommandTemplate::command_for`].
pub fn resolve(raw: &RawTemplate, platform: Platform) -> Result<String, DecodeError> {
    let template = decode(raw)?;
    template.command_for(platform).map(str::to_string)
}

/// What: Split a command into its `||` alternatives.
///
/// Output:
/// - Trimmed, non-empty alternatives in order; a command without the
///   separator yields a single element.
#[must_use]
pub fn split_fallback(command: &str) -> Vec<&str> {
    command
        .split(FALLBACK_SEPARATOR)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn decode_text(text: &str, allow_unwrap: bool) -> Result<CommandTemplate, DecodeError> {
    let cleaned = text.trim().trim_start_matches('\u{feff}').trim();
    if cleaned.is_empty() {
        return Err(DecodeError::MalformedTemplate("template is empty".to_string()));
    }

    if allow_unwrap
        && cleaned.starts_with('"')
        && let Ok(Value::String(inner)) = serde_json::from_str::<Value>(cleaned)
    {
        return decode_text(&inner, false);
    }

    let candidate = if cleaned.starts_with('{') {
        cleaned
    } else {
        extract_object(cleaned).ok_or_else(|| {
            DecodeError::MalformedTemplate(
                "could not find a JSON object in command template".to_string(),
            )
        })?
    };

    let value: Value = serde_json::from_str(candidate)
        .map_err(|e| DecodeError::MalformedTemplate(e.to_string()))?;
    from_value(value)
}

/// Span from the first `{` to the last `}`, inclusive.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn from_value(value: Value) -> Result<CommandTemplate, DecodeError> {
    match value {
        Value::Object(entries) if !entries.is_empty() => Ok(CommandTemplate { entries }),
        _ => Err(DecodeError::InvalidShape),
    }
}
