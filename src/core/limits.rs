/*!
 * System Limits and Constants
 *
 * Centralized location for descriptor table limits and the fixed names the
 * table relies on.
 */

// =============================================================================
// DESCRIPTOR TABLE
// =============================================================================

/// Growth increment for the descriptor table (and its initial size)
/// The table rarely grows more than once, so growth is additive
pub const NOFILE_INCR: usize = 32;

/// Hard ceiling on table capacity
/// Growth past this fails the same way an allocation failure does
pub const OPEN_MAX: usize = 3200;

/// Highest descriptor rebound to a host standard-stream slot
pub const MAX_STD_FD: usize = 2;

// =============================================================================
// HANDLE IDENTIFICATION
// =============================================================================

/// Placeholder name for an inherited handle whose object name cannot be queried
pub const UNKNOWN_FILE: &str = "some disk file";

/// Object-namespace prefix under which device objects live (matched case-insensitively)
pub const DEVICE_PREFIX: &str = "\\device\\";

/// Object-namespace prefix of the remote file redirector
pub const REMOTE_PREFIX: &str = "\\Device\\LanmanRedirector\\";

// =============================================================================
// BOOTSTRAP
// =============================================================================

/// Device path used for console std handles when running in tty mode
pub const TTY_PATH: &str = "/dev/tty";

/// Device path used for std handles that answer a serial-port query
pub const SERIAL_STD_PATH: &str = "/dev/ttyS0";
