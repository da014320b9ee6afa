/*!
 * Table Operations
 * Growth, reuse search, release and the descriptor-level calls built on them
 */

use super::{Dtable, Slots, TableState};
use crate::core::config::DtableConfig;
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::{Ctty, Fd, HandlerId, NativeHandle};
use crate::device::Device;
use crate::handler::{Handler, HandlerKind, OpenFlags};
use crate::host::Host;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Allocate `size` empty slots, failing instead of aborting
pub(crate) fn empty_slots(size: usize, limit: usize) -> DtableResult<Slots> {
    let mut slots: Slots = Vec::new();
    slots
        .try_reserve_exact(size)
        .map_err(|_| DtableError::NoSpace {
            requested: size,
            limit,
        })?;
    slots.resize_with(size, || None);
    Ok(slots)
}

impl TableState {
    #[inline]
    pub(crate) fn is_open(&self, fd: Fd) -> bool {
        self.get(fd).is_some()
    }

    pub(crate) fn get(&self, fd: Fd) -> Option<&Handler> {
        usize::try_from(fd)
            .ok()
            .and_then(|fd| self.slots.get(fd))
            .and_then(|slot| slot.as_deref())
    }

    pub(crate) fn get_mut(&mut self, fd: Fd) -> Option<&mut Handler> {
        usize::try_from(fd)
            .ok()
            .and_then(|fd| self.slots.get_mut(fd))
            .and_then(|slot| slot.as_deref_mut())
    }

    /// Grow by `by` slots; `Ok(false)` when `by` is not positive
    ///
    /// The new array is fully allocated before anything moves, so on failure
    /// the current slots are untouched. Handlers are moved, never rebuilt.
    pub(crate) fn extend(&mut self, by: isize, config: &DtableConfig) -> DtableResult<bool> {
        if by <= 0 {
            return Ok(false);
        }
        let new_size = self.slots.len() + by as usize;
        if new_size > config.max_descriptors {
            return Err(DtableError::NoSpace {
                requested: new_size,
                limit: config.max_descriptors,
            });
        }

        let mut grown: Slots = Vec::new();
        grown
            .try_reserve_exact(new_size)
            .map_err(|_| DtableError::NoSpace {
                requested: new_size,
                limit: config.max_descriptors,
            })?;
        grown.append(&mut self.slots);
        grown.resize_with(new_size, || None);
        self.slots = grown;

        debug!(size = new_size, "descriptor table extended");
        Ok(true)
    }

    /// First empty slot at or after `start`, growing the table as needed
    pub(crate) fn find_unused(&mut self, start: usize, config: &DtableConfig) -> DtableResult<usize> {
        loop {
            if let Some(offset) = self
                .slots
                .iter()
                .skip(start)
                .position(|slot| slot.is_none())
            {
                return Ok(start + offset);
            }
            if !self.extend(config.grow_increment as isize, config)? {
                return Err(DtableError::NoSpace {
                    requested: self.slots.len(),
                    limit: config.max_descriptors,
                });
            }
        }
    }

    /// Place a handler into a slot, counting it against the table
    pub(crate) fn install(&mut self, fd: usize, handler: Box<Handler>) {
        if handler.kind().is_console() {
            self.console_fds += 1;
        } else if handler.kind().is_socket() {
            self.need_fixup_before += 1;
        }
        self.slots[fd] = Some(handler);
    }

    /// Empty a slot, undoing its accounting; no-op on closed or out-of-range slots
    ///
    /// Native handles are not closed here.
    pub(crate) fn release(&mut self, fd: usize, host: &dyn Host) -> Option<Box<Handler>> {
        let handler = self.slots.get_mut(fd)?.take()?;
        self.account_release(&handler, host);
        debug!(fd, handler = %handler.id(), kind = %handler.kind(), "released");
        Some(handler)
    }

    pub(crate) fn account_release(&mut self, handler: &Handler, host: &dyn Host) {
        if handler.kind().is_socket() {
            self.need_fixup_before = self.need_fixup_before.saturating_sub(1);
        } else if handler.kind().is_console() && self.console_fds > 0 {
            self.console_fds -= 1;
            if self.console_fds == 0 && self.ctty != Ctty::Console && !self.has_pty_fds() {
                info!("last console descriptor released; freeing console");
                host.free_console();
            }
        }
    }

    fn has_pty_fds(&self) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|handler| handler.kind().is_pty())
    }

    /// Close the native handles at `fd`, then release the slot
    pub(crate) fn close(&mut self, fd: usize, host: &dyn Host) -> DtableResult<()> {
        let closed = match self.slots.get_mut(fd).and_then(|slot| slot.as_deref_mut()) {
            Some(handler) => handler.close(host),
            None => return Err(DtableError::BadDescriptor(fd as Fd)),
        };
        self.release(fd, host);
        closed.map_err(DtableError::from)
    }

    /// Close and release every open descriptor, logging failures
    pub(crate) fn close_all(&mut self, host: &dyn Host) -> usize {
        let mut closed = 0;
        for fd in 0..self.slots.len() {
            if self.slots[fd].is_none() {
                continue;
            }
            if let Err(e) = self.close(fd, host) {
                warn!(fd, error = %e, "close failed while closing all descriptors");
            }
            closed += 1;
        }
        closed
    }
}

/// One open descriptor as seen by diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub fd: Fd,
    pub handler: HandlerId,
    pub kind: HandlerKind,
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posix_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_name: Option<String>,
    pub io_handle: Option<NativeHandle>,
    pub output_handle: Option<NativeHandle>,
    pub flags: OpenFlags,
    pub close_on_exec: bool,
}

impl DescriptorInfo {
    fn of(fd: usize, handler: &Handler) -> Self {
        Self {
            fd: fd as Fd,
            handler: handler.id(),
            kind: handler.kind(),
            device: handler.device(),
            posix_name: handler.posix_name().map(str::to_owned),
            native_name: handler.native_name().map(str::to_owned),
            io_handle: handler.io_handle(),
            output_handle: handler.output_handle(),
            flags: handler.flags(),
            close_on_exec: handler.close_on_exec(),
        }
    }
}

/// Serializable view of the whole table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub capacity: usize,
    pub console_fds: usize,
    pub need_fixup_before: usize,
    pub ctty: Ctty,
    pub vfork_active: bool,
    pub descriptors: Vec<DescriptorInfo>,
}

impl TableSnapshot {
    pub fn get(&self, fd: Fd) -> Option<&DescriptorInfo> {
        self.descriptors.iter().find(|d| d.fd == fd)
    }

    pub fn open_fds(&self) -> Vec<Fd> {
        self.descriptors.iter().map(|d| d.fd).collect()
    }
}

impl Dtable {
    /// Grow the table by `by` slots
    ///
    /// Returns `Ok(false)` without touching the table when `by` is not
    /// positive, and `NoSpace` with the table intact when growth fails.
    pub fn extend(&self, by: isize) -> DtableResult<bool> {
        self.state.write().extend(by, &self.config)
    }

    /// First closed descriptor at or after `start`
    pub fn find_unused(&self, start: usize) -> DtableResult<Fd> {
        let mut state = self.state.write();
        state.find_unused(start, &self.config).map(|fd| fd as Fd)
    }

    /// Drop the handler at `fd` without closing its native handles
    pub fn release(&self, fd: Fd) {
        if let Ok(fd) = usize::try_from(fd) {
            let mut state = self.state.write();
            state.release(fd, self.host.as_ref());
        }
    }

    /// POSIX close: close the native handles, then release the slot
    ///
    /// The slot is released even when the host fails to close a handle.
    pub fn close(&self, fd: Fd) -> DtableResult<()> {
        let index = usize::try_from(fd).map_err(|_| DtableError::BadDescriptor(fd))?;
        let mut state = self.state.write();
        state.close(index, self.host.as_ref())
    }

    pub fn is_open(&self, fd: Fd) -> bool {
        self.state.read().is_open(fd)
    }

    /// Close every open descriptor, returning how many were open
    pub fn close_all_files(&self) -> usize {
        let mut state = self.state.write();
        state.close_all(self.host.as_ref())
    }

    pub fn set_close_on_exec(&self, fd: Fd, on: bool) -> DtableResult<()> {
        let mut state = self.state.write();
        let handler = state.get_mut(fd).ok_or(DtableError::BadDescriptor(fd))?;
        handler.set_close_on_exec(self.host.as_ref(), on)?;
        Ok(())
    }

    pub fn close_on_exec(&self, fd: Fd) -> DtableResult<bool> {
        self.with_handler(fd, Handler::close_on_exec)
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let state = self.state.read();
        TableSnapshot {
            capacity: state.slots.len(),
            console_fds: state.console_fds,
            need_fixup_before: state.need_fixup_before,
            ctty: state.ctty,
            vfork_active: state.shadow.is_some(),
            descriptors: state
                .slots
                .iter()
                .enumerate()
                .filter_map(|(fd, slot)| slot.as_deref().map(|h| DescriptorInfo::of(fd, h)))
                .collect(),
        }
    }
}
