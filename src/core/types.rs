/*!
 * Core Types
 * Common types used across the descriptor table
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process ID type
pub type Pid = u32;

/// POSIX file descriptor
///
/// Signed so that callers can hand us the values POSIX callers hand us,
/// including negative ones that must be rejected.
pub type Fd = i32;

/// Descriptor sentinel meaning "build the handler but do not register it"
pub const UNREGISTERED: Fd = -1;

/// Opaque native resource reference issued by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeHandle(pub u64);

impl NativeHandle {
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Process-unique identity of a handler instance
///
/// Two descriptors never share a handler, so comparing ids is how callers
/// observe that a duplicate is a distinct instance, or that a restored
/// table holds the very same instances it held before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(u64);

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

impl HandlerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fh#{}", self.0)
    }
}

/// The three host standard-stream slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StdStream {
    Input,
    Output,
    Error,
}

impl StdStream {
    pub const ALL: [StdStream; 3] = [StdStream::Input, StdStream::Output, StdStream::Error];

    /// Standard stream bound to a descriptor, if the descriptor is 0, 1 or 2
    #[inline]
    pub fn for_fd(fd: usize) -> Option<Self> {
        match fd {
            0 => Some(StdStream::Input),
            1 => Some(StdStream::Output),
            2 => Some(StdStream::Error),
            _ => None,
        }
    }

    #[inline]
    pub const fn fd(self) -> Fd {
        match self {
            StdStream::Input => 0,
            StdStream::Output => 1,
            StdStream::Error => 2,
        }
    }
}

/// Controlling terminal of the emulated process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "unit")]
pub enum Ctty {
    #[default]
    None,
    Console,
    Tty(u32),
}
