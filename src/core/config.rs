/*!
 * Descriptor Table Configuration
 *
 * Runtime configuration for table sizing and bootstrap behaviour
 */

use super::errors::{DtableError, DtableResult};
use super::limits::{NOFILE_INCR, OPEN_MAX};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Environment variable overriding [`DtableConfig::initial_size`]
pub const ENV_INITIAL_SIZE: &str = "DTABLE_INITIAL_SIZE";
/// Environment variable overriding [`DtableConfig::grow_increment`]
pub const ENV_GROW_INCREMENT: &str = "DTABLE_GROW_INCREMENT";
/// Environment variable overriding [`DtableConfig::max_descriptors`]
pub const ENV_MAX_FDS: &str = "DTABLE_MAX_FDS";
/// Environment variable overriding [`DtableConfig::use_tty`]
pub const ENV_USE_TTY: &str = "DTABLE_USE_TTY";

/// Descriptor table configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default, deny_unknown_fields)]
pub struct DtableConfig {
    /// Slots allocated when the table is created
    pub initial_size: usize,
    /// Slots added each time the table runs out of room
    pub grow_increment: usize,
    /// Capacity ceiling; growth beyond it fails with `NoSpace`
    pub max_descriptors: usize,
    /// Console std handles are classified as `/dev/tty` instead of the console
    pub use_tty: bool,
}

impl Default for DtableConfig {
    fn default() -> Self {
        Self {
            initial_size: NOFILE_INCR,
            grow_increment: NOFILE_INCR,
            max_descriptors: OPEN_MAX,
            use_tty: false,
        }
    }
}

impl DtableConfig {
    /// Small table for tests and tools that want growth to kick in early
    pub const fn compact(max_descriptors: usize) -> Self {
        Self {
            initial_size: 4,
            grow_increment: 4,
            max_descriptors,
            use_tty: false,
        }
    }

    /// Build configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_size: env_or(ENV_INITIAL_SIZE, defaults.initial_size),
            grow_increment: env_or(ENV_GROW_INCREMENT, defaults.grow_increment),
            max_descriptors: env_or(ENV_MAX_FDS, defaults.max_descriptors),
            use_tty: std::env::var(ENV_USE_TTY)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.use_tty),
        }
    }

    /// Reject configurations the table cannot honour
    pub fn validate(&self) -> DtableResult<()> {
        if self.initial_size == 0 || self.grow_increment == 0 {
            return Err(DtableError::Configuration(
                "initial_size and grow_increment must be non-zero".into(),
            ));
        }
        if self.initial_size > self.max_descriptors {
            return Err(DtableError::Configuration(format!(
                "initial_size {} exceeds max_descriptors {}",
                self.initial_size, self.max_descriptors
            )));
        }
        Ok(())
    }
}

fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, fallback = %default, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
