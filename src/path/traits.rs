/*!
 * Path Resolution Traits
 * Contract of the path-resolution collaborator
 */

use crate::device::Device;
use miette::Diagnostic;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path resolution result
pub type PathResult<T> = Result<T, PathError>;

/// Path resolution errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum PathError {
    #[error("Not found: {0}")]
    #[diagnostic(code(path::not_found))]
    NotFound(String),

    #[error("Invalid path: {0}")]
    #[diagnostic(code(path::invalid_path))]
    InvalidPath(String),

    #[error("Name too long: {0}")]
    #[diagnostic(code(path::name_too_long))]
    NameTooLong(String),
}

impl PathError {
    pub fn errno(&self) -> Errno {
        match self {
            PathError::NotFound(_) => Errno::ENOENT,
            PathError::InvalidPath(_) => Errno::EINVAL,
            PathError::NameTooLong(_) => Errno::ENAMETOOLONG,
        }
    }
}

/// Resolution options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// An empty path is an error rather than the current directory
    pub null_empty: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { null_empty: true }
    }
}

/// Normalized description of a resolved path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPath {
    pub device: Device,
    pub posix_path: String,
    /// Native path, absent for pseudo files with no native counterpart
    pub native_path: Option<String>,
    pub exists: bool,
    /// Files under this path default to binary mode
    pub binary: bool,
}

/// Path-resolution collaborator
pub trait PathResolver: Send + Sync {
    /// Resolve a POSIX or native path to a classification and canonical names
    fn resolve(&self, path: &str, options: ResolveOptions) -> PathResult<ResolvedPath>;

    /// Convert a native path to a canonical absolute POSIX path
    fn to_full_posix(&self, native: &str) -> String;
}
