//! kube9-core error types

use std::time::Duration;

/// Error taxonomy shared by the cluster collaborators and this crate.
///
/// The first five variants are raised by collaborators (the resource client
/// and the privileged status source) and must stay distinguishable: the
/// detection and listing layers pick their fallback from the variant.
#[derive(Debug, thiserror::Error)]
pub enum Kube9Error {
    // Collaborator taxonomy
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Unknown(String),

    // Operation tracking
    #[error("operation on {target} did not finish within {after:?}")]
    OperationTimeout { target: String, after: Duration },

    /// The tracked resource disappeared while its operation was in flight.
    #[error("resource {0} no longer exists")]
    ResourceGone(String),

    // Data errors
    #[error("invalid {kind}: {reason}")]
    InvalidResource { kind: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of a [`Kube9Error`], used for logging and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    ConnectionFailed,
    Timeout,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl Kube9Error {
    /// Map this error onto the collaborator taxonomy.
    ///
    /// Crate-internal errors that have no collaborator counterpart classify
    /// as [`ErrorKind::Unknown`], except [`Kube9Error::ResourceGone`] which
    /// is a not-found by definition.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Kube9Error::NotFound(_) | Kube9Error::ResourceGone(_) => ErrorKind::NotFound,
            Kube9Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Kube9Error::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            Kube9Error::Timeout(_) | Kube9Error::OperationTimeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Kube9Error::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Kube9Error::PermissionDenied(_))
    }

    /// Whether a retry of the same read may succeed.
    ///
    /// Connection failures, collaborator timeouts and unclassified errors
    /// are transient. Not-found, permission and data errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Kube9Error::ConnectionFailed(_) | Kube9Error::Timeout(_) | Kube9Error::Unknown(_)
        )
    }
}

#[cfg(feature = "kube")]
impl From<kube::Error> for Kube9Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => {
                let message = format!("{} ({})", response.message, response.reason);
                match response.code {
                    404 => Kube9Error::NotFound(message),
                    401 | 403 => Kube9Error::PermissionDenied(message),
                    408 | 504 => Kube9Error::Timeout(message),
                    _ => Kube9Error::Unknown(format!("API error {}: {message}", response.code)),
                }
            }
            kube::Error::HyperError(e) => Kube9Error::ConnectionFailed(e.to_string()),
            kube::Error::Service(e) => {
                let msg = e.to_string();
                if msg.contains("timed out") || msg.contains("deadline") {
                    Kube9Error::Timeout(msg)
                } else {
                    Kube9Error::ConnectionFailed(msg)
                }
            }
            kube::Error::InferConfig(e) => Kube9Error::Configuration(e.to_string()),
            kube::Error::Auth(e) => Kube9Error::PermissionDenied(e.to_string()),
            other => Kube9Error::Unknown(other.to_string()),
        }
    }
}

/// Result type alias for kube9-core operations
pub type Result<T> = std::result::Result<T, Kube9Error>;
