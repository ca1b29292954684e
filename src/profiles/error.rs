//! Error definitions for the profile store

use thiserror::Error;

/// Validation and access failures of [`super::ProfileStore`].
///
/// All of these are recoverable: the store is left untouched and the caller
/// keeps (or shows) the previous value.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// A numeric value failed validation (non-finite, non-positive interval, ...)
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// User text could not be parsed as a number
    #[error("Could not parse '{text}' as a number for {field}")]
    Parse { field: String, text: String },

    /// Empty or malformed hotkey identifier
    #[error("Invalid hotkey: {0}")]
    InvalidHotkey(String),

    /// Preset names must be non-empty and must not contain path components
    #[error("Invalid preset name: '{0}'")]
    InvalidPresetName(String),

    /// Lock contention exceeded the retry budget
    #[error("Could not acquire profile lock after maximum retry attempts")]
    LockTimeout,
}

impl ProfileError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
