use thiserror::Error;

/// Failure of a single client operation.
///
/// Every variant is terminal for the operation that produced it; nothing is
/// retried. The message is the human-readable text stored on a slice's
/// `error` field and shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Input rejected before any remote call was made.
    #[error("{0}")]
    Validation(String),
    /// Fetch-by-id found no document.
    #[error("{0}")]
    NotFound(String),
    /// The document store failed or returned something unreadable.
    #[error("{0}")]
    Remote(String),
    /// The identity provider refused the request.
    #[error("{0}")]
    Auth(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The text a slice stores as its error message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::NotFound(m) | Self::Remote(m) | Self::Auth(m) => m,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Remote(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Remote(format!("Malformed document: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_bare_message() {
        let err = Error::not_found("Workout not found");
        assert_eq!(err.to_string(), "Workout not found");
        assert_eq!(err.message(), "Workout not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_anyhow_becomes_remote_with_context_chain() {
        let err: Error = anyhow::anyhow!("disk full")
            .context("Failed to insert document")
            .into();
        match err {
            Error::Remote(msg) => {
                assert!(msg.contains("Failed to insert document"));
                assert!(msg.contains("disk full"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
