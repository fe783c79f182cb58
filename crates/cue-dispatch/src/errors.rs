//! Dispatch error taxonomy.

use cue_core::InvokeError;

/// Why a frame was dropped. None of these reach the controller.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unresolved module path: {module}")]
    Unresolved { module: String },

    #[error("{module} has no callable {method}")]
    NotCallable { module: String, method: String },

    #[error("{method} on {module} failed: {source}")]
    Invocation {
        module: String,
        method: String,
        #[source]
        source: InvokeError,
    },
}

impl DispatchError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Invalid(_) => "invalid",
            Self::Unresolved { .. } => "unresolved",
            Self::NotCallable { .. } => "not_callable",
            Self::Invocation { .. } => "invocation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = DispatchError::Invocation {
            module: "game.audio".into(),
            method: "setMasterVolume".into(),
            source: InvokeError::Failed("muted".into()),
        };
        let text = err.to_string();
        assert!(text.contains("game.audio"));
        assert!(text.contains("setMasterVolume"));
        assert!(text.contains("muted"));
        assert_eq!(err.error_kind(), "invocation");
    }

    #[test]
    fn kinds() {
        assert_eq!(DispatchError::Malformed("x".into()).error_kind(), "malformed");
        assert_eq!(DispatchError::Invalid("x".into()).error_kind(), "invalid");
        assert_eq!(
            DispatchError::Unresolved { module: "a".into() }.error_kind(),
            "unresolved"
        );
        assert_eq!(
            DispatchError::NotCallable {
                module: "a".into(),
                method: "b".into()
            }
            .error_kind(),
            "not_callable"
        );
    }
}
