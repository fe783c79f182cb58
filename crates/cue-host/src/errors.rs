use std::path::PathBuf;

/// Failures loading a host state document.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state document root must be a JSON object")]
    NotAnObject,
}
