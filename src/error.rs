use std::path::PathBuf;

use thiserror::Error;

/// Failures that change the control flow of a run.
///
/// Per-item problems (a photo without a face, a frame that fails to decode
/// mid-stream) are not represented here; they go to a `Diagnostics` sink and
/// the run continues.
#[derive(Debug, Error)]
pub enum CastwatchError {
    /// The video source cannot be opened or read. Fatal.
    #[error("video source '{source_path}' unavailable: {reason}")]
    SourceUnavailable { source_path: String, reason: String },

    /// The video sink cannot be created. Fatal.
    #[error("video sink '{}' unavailable: {reason}", path.display())]
    SinkUnavailable { path: PathBuf, reason: String },

    /// A manually supplied `NAME PHOTO [PHOTO...]` entry has fewer than two tokens.
    #[error("additional identity {tokens:?} needs a name followed by at least one photo")]
    MalformedAdditionalIdentity { tokens: Vec<String> },

    /// Cast lookup returned nothing for the title. Callers treat this as an empty cast.
    #[error("no cast found for '{title}'")]
    CastNotFound { title: String },

    /// A persisted presence table could not be parsed.
    #[error("invalid stats file at line {line}: {reason}")]
    InvalidStats { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CastwatchError {
    pub fn source_unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_stats(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidStats {
            line,
            reason: reason.into(),
        }
    }

    /// True for errors that must abort the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::CastNotFound { .. })
    }
}
