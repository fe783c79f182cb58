/// Errors raised while parsing a module path.
///
/// A missing path is never an error; only text that cannot be a path at all.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("unbalanced bracket at byte {0}")]
    UnbalancedBracket(usize),
    #[error("unexpected {0:?} at byte {1}")]
    UnexpectedChar(char, usize),
    #[error("empty segment in path: {0}")]
    EmptySegment(String),
}

/// Failure reported by a host capability while it runs.
#[derive(Clone, Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("target unavailable: {0}")]
    Unavailable(String),
    #[error("invocation failed: {0}")]
    Failed(String),
}

impl InvokeError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Unavailable(_) => "unavailable",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_error_display() {
        assert_eq!(
            PathError::UnbalancedBracket(3).to_string(),
            "unbalanced bracket at byte 3"
        );
        assert!(PathError::EmptySegment("a..b".into())
            .to_string()
            .contains("a..b"));
    }

    #[test]
    fn invoke_error_kinds() {
        assert_eq!(
            InvokeError::InvalidArguments("x".into()).error_kind(),
            "invalid_arguments"
        );
        assert_eq!(InvokeError::Unavailable("x".into()).error_kind(), "unavailable");
        assert_eq!(InvokeError::Failed("x".into()).error_kind(), "failed");
        assert_eq!(
            InvokeError::Failed("boom".into()).to_string(),
            "invocation failed: boom"
        );
    }
}
