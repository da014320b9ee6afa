/*!
 * Host Types
 * Errors and value types exchanged with the native host
 */

use crate::core::types::Pid;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Host operation result
pub type HostResult<T> = Result<T, HostError>;

/// Errors reported by the native host
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum HostError {
    #[error("Invalid handle: {0:#x}")]
    #[diagnostic(code(host::invalid_handle))]
    InvalidHandle(u64),

    #[error("Access denied: {0}")]
    #[diagnostic(code(host::access_denied))]
    AccessDenied(String),

    #[error("No such process: {0}")]
    #[diagnostic(code(host::no_such_process))]
    NoSuchProcess(Pid),

    #[error("Not supported: {0}")]
    #[diagnostic(code(host::not_supported))]
    NotSupported(String),
}

impl HostError {
    pub fn errno(&self) -> Errno {
        match self {
            HostError::InvalidHandle(_) => Errno::EBADF,
            HostError::AccessDenied(_) => Errno::EACCES,
            HostError::NoSuchProcess(_) => Errno::ESRCH,
            HostError::NotSupported(_) => Errno::EOPNOTSUPP,
        }
    }
}

/// Native file type as reported by the host for a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeFileType {
    Disk,
    Char,
    Pipe,
    Unknown,
}

/// Readiness condition a wait can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Read,
    Write,
    Except,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Readiness::Read => write!(f, "read"),
            Readiness::Write => write!(f, "write"),
            Readiness::Except => write!(f, "except"),
        }
    }
}
