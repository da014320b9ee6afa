/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::Fd;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export collaborator errors so callers need one import
pub use crate::host::HostError;
pub use crate::path::PathError;

/// Descriptor table errors
///
/// Everything here is a recoverable, caller-visible condition. The one
/// unrecoverable condition (a classification the factory does not know)
/// panics instead of surfacing as a variant.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DtableError {
    #[error("Bad file descriptor: {0}")]
    #[diagnostic(
        code(dtable::bad_descriptor),
        help("The descriptor is not open or is out of range.")
    )]
    BadDescriptor(Fd),

    #[error("No descriptor available: {requested} slots requested, limit {limit}")]
    #[diagnostic(
        code(dtable::no_space),
        help("The table could not grow. Close unused descriptors or raise max_descriptors.")
    )]
    NoSpace { requested: usize, limit: usize },

    #[error("Duplication of descriptor {fd} failed: {source}")]
    #[diagnostic(
        code(dtable::duplication_failed),
        help("The host refused to duplicate the native handle behind this descriptor.")
    )]
    DuplicationFailed {
        fd: Fd,
        #[source]
        source: HostError,
    },

    #[error("Path error: {0}")]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error("Host error: {0}")]
    #[diagnostic(transparent)]
    Host(#[from] HostError),

    #[error("Invalid table state: {0}")]
    #[diagnostic(
        code(dtable::invalid_state),
        help("A process-transition step was invoked out of order.")
    )]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(dtable::configuration_error),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(String),
}

impl DtableError {
    /// POSIX errno equivalent of this error
    pub fn errno(&self) -> Errno {
        match self {
            DtableError::BadDescriptor(_) | DtableError::DuplicationFailed { .. } => Errno::EBADF,
            DtableError::NoSpace { .. } => Errno::EMFILE,
            DtableError::Path(e) => e.errno(),
            DtableError::Host(e) => e.errno(),
            DtableError::InvalidState(_) | DtableError::Configuration(_) => Errno::EINVAL,
        }
    }
}

/// Serializable error representation for diagnostics output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub error_type: String,
    pub message: String,
    pub errno: i32,
}

impl From<&DtableError> for SerializableError {
    fn from(err: &DtableError) -> Self {
        let error_type = match err {
            DtableError::BadDescriptor(_) => "bad_descriptor",
            DtableError::NoSpace { .. } => "no_space",
            DtableError::DuplicationFailed { .. } => "duplication_failed",
            DtableError::Path(_) => "path_error",
            DtableError::Host(_) => "host_error",
            DtableError::InvalidState(_) => "invalid_state",
            DtableError::Configuration(_) => "configuration_error",
        };
        Self {
            error_type: error_type.to_string(),
            message: err.to_string(),
            errno: err.errno() as i32,
        }
    }
}

/// Result type for descriptor table operations
pub type DtableResult<T> = std::result::Result<T, DtableError>;
