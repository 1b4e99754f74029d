use std::path::PathBuf;

use thiserror::Error;

/// Failures that surface from the triage core.
///
/// Recoverable irregularities (malformed filenames, unreadable streams) are
/// not errors; they are carried in values such as `IdentityParse::Fallback`
/// and `AcceptedResult::Rejected { unreadable: true, .. }`.
#[derive(Debug, Error)]
pub enum TriageError {
    /// The detection capability failed. Never retried here.
    #[error("detection capability '{backend}' failed: {source}")]
    Detection {
        backend: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("filesystem operation on {} failed: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image encoding for {target} failed: {source}")]
    Encode {
        target: String,
        #[source]
        source: image::ImageError,
    },

    /// A clip needs a decoder this build does not include.
    #[error("no decoder for {}: {reason}", path.display())]
    DecoderUnavailable { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TriageError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn encode(target: impl Into<String>, source: image::ImageError) -> Self {
        Self::Encode {
            target: target.into(),
            source,
        }
    }
}
