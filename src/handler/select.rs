/*!
 * Select Records
 * Uniform readiness record filled by handlers for multiplexed waits
 */

use crate::core::types::{Fd, HandlerId, NativeHandle, UNREGISTERED};
use crate::host::Readiness;
use serde::{Deserialize, Serialize};

/// Readiness record for one descriptor
///
/// One record can collect read, write and except interest for the same
/// descriptor; each `select_*` call only touches its own pair of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectRecord {
    pub fd: Fd,
    pub handler: Option<HandlerId>,
    pub read_selected: bool,
    pub read_ready: bool,
    pub write_selected: bool,
    pub write_ready: bool,
    pub except_selected: bool,
    pub except_ready: bool,
    /// Host object the caller waits on; `None` for always-ready handlers
    pub wait_handle: Option<NativeHandle>,
    pub saw_error: bool,
}

impl Default for SelectRecord {
    fn default() -> Self {
        Self {
            fd: UNREGISTERED,
            handler: None,
            read_selected: false,
            read_ready: false,
            write_selected: false,
            write_ready: false,
            except_selected: false,
            except_ready: false,
            wait_handle: None,
            saw_error: false,
        }
    }
}

impl SelectRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark(&mut self, readiness: Readiness, ready: bool) {
        match readiness {
            Readiness::Read => {
                self.read_selected = true;
                self.read_ready = ready;
            }
            Readiness::Write => {
                self.write_selected = true;
                self.write_ready = ready;
            }
            Readiness::Except => {
                self.except_selected = true;
                self.except_ready = ready;
            }
        }
    }

    /// Whether any selected condition is ready
    pub fn is_ready(&self) -> bool {
        (self.read_selected && self.read_ready)
            || (self.write_selected && self.write_ready)
            || (self.except_selected && self.except_ready)
    }
}
