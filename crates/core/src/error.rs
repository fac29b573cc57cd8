use crate::content::ContentCategory;

/// Result alias that carries the custom [`RuntimeError`] type.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Free-form failure raised by hosts and collaborators that have no
    /// better variant to report.
    #[error("{0}")]
    Message(String),
    /// The content manifest could not be enumerated, so the pipeline run was
    /// aborted before any load was issued.
    #[error(transparent)]
    ManifestUnavailable(#[from] SourceUnavailable),
    /// A session was built without one of its required collaborators.
    #[error("session is missing its {0}")]
    MissingCollaborator(&'static str),
    /// A pipeline run was requested while another one is still in flight.
    #[error("a content pipeline run is already in flight")]
    PipelineBusy,
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for RuntimeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RuntimeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Raised by a manifest source that cannot list a category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content manifest unavailable while listing `{category}`: {reason}")]
pub struct SourceUnavailable {
    pub category: ContentCategory,
    pub reason: String,
}

impl SourceUnavailable {
    pub fn new(category: ContentCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

/// Failure of a single load request. Never fatal to a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("content `{path}` was not found")]
    NotFound { path: String },
    #[error("failed to read `{path}`: {reason}")]
    Io { path: String, reason: String },
    #[error("failed to decode `{path}`: {reason}")]
    Decode { path: String, reason: String },
    /// A template entry named in the manifest is absent from the document.
    #[error("template document has no entry named `{name}`")]
    MissingEntry { name: String },
    /// The loader dropped its responder without resolving it.
    #[error("request for `{path}` was abandoned by its loader")]
    Abandoned { path: String },
    #[error("{0}")]
    Message(String),
}

impl LoadError {
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Maps an IO failure on `path` onto the matching variant.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io {
                path,
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_failure_converts_into_runtime_error() {
        let err: RuntimeError = SourceUnavailable::new(ContentCategory::Audio, "offline").into();
        assert!(matches!(err, RuntimeError::ManifestUnavailable(_)));
        assert!(format!("{err}").contains("audio"));
        assert!(format!("{err}").contains("offline"));
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            LoadError::from_io("textures/a.jpg", &io),
            LoadError::NotFound {
                path: "textures/a.jpg".to_string()
            }
        );

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            LoadError::from_io("textures/a.jpg", &io),
            LoadError::Io { .. }
        ));
    }
}
