//! Error taxonomy for the federation layer.

use thiserror::Error;

/// Broad classification of a [`ResourceError`].
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceErrorKind {
    /// A provider rejected the session credentials or could not be reached
    /// while logging in.
    #[error("authentication failed")]
    Authentication,
    /// No eligible provider can perform the operation at this path.
    #[error("operation not supported")]
    Unsupported,
    /// A provider failed to persist (or to read back) a change.
    #[error("persistence failure")]
    Persistence,
    /// The caller passed something unusable, e.g. a relative path.
    #[error("invalid input")]
    InvalidInput,
    #[error("resource not found")]
    NotFound,
    /// An access-security check refused the operation.
    #[error("access denied")]
    AccessDenied,
    /// The session has already been closed.
    #[error("session closed")]
    Closed,
    /// Some other unexpected condition. If you see this, it's probably a bug.
    #[error("internal error")]
    Internal,
}

/// Error returned by every fallible operation of this crate.
///
/// `op` names the operation that raised the error (`"combined.create"`,
/// `"mem.delete"`, ...). The error is `Clone` so that a failed login can be
/// cached and re-raised verbatim for the rest of a session.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{op}: {kind}{}", detail(.path, .message))]
pub struct ResourceError {
    kind: ResourceErrorKind,
    op: &'static str,
    path: Option<String>,
    message: Option<String>,
}

fn detail(path: &Option<String>, message: &Option<String>) -> String {
    match (path, message) {
        (Some(path), Some(message)) => format!(" at '{path}': {message}"),
        (Some(path), None) => format!(" at '{path}'"),
        (None, Some(message)) => format!(": {message}"),
        (None, None) => String::new(),
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    pub fn new(kind: ResourceErrorKind, op: &'static str) -> Self {
        Self {
            kind,
            op,
            path: None,
            message: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn authentication(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ResourceErrorKind::Authentication, op).with_message(message)
    }

    pub fn unsupported(op: &'static str, path: impl Into<String>) -> Self {
        Self::new(ResourceErrorKind::Unsupported, op).with_path(path)
    }

    pub fn persistence(op: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ResourceErrorKind::Persistence, op)
            .with_path(path)
            .with_message(message)
    }

    pub fn kind(&self) -> ResourceErrorKind {
        self.kind
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<toml::de::Error> for ResourceError {
    fn from(err: toml::de::Error) -> Self {
        ResourceError::new(ResourceErrorKind::InvalidInput, "config.parse").with_message(err.to_string())
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ResourceErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ResourceErrorKind::AccessDenied,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                ResourceErrorKind::InvalidInput
            }
            _ => ResourceErrorKind::Internal,
        };
        ResourceError::new(kind, "io").with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_kind_and_detail() {
        let err = ResourceError::persistence("mem.create", "/a/b", "already exists");
        assert_eq!(
            err.to_string(),
            "mem.create: persistence failure at '/a/b': already exists"
        );

        let err = ResourceError::new(ResourceErrorKind::Closed, "combined.get_resource");
        assert_eq!(err.to_string(), "combined.get_resource: session closed");
    }

    #[test]
    fn io_errors_are_classified() {
        let err: ResourceError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert_eq!(err.kind(), ResourceErrorKind::NotFound);
        assert_eq!(err.op(), "io");
    }
}
