/*!
 * Duplication Engine
 * dup and dup2 over handlers that own their native handles
 */

use super::stdio::rebind_std_handle;
use super::Dtable;
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::Fd;
use crate::handler::Handler;
use tracing::{debug, warn};

impl Dtable {
    /// New handler on the same resource as `old`, with close-on-exec clear
    ///
    /// On a host failure the half-built duplicate is closed and dropped.
    pub(crate) fn dup_worker(&self, old: &Handler, fd: Fd) -> DtableResult<Box<Handler>> {
        let mut new = Box::new(old.duplicate_shell());
        if let Err(source) = old.dup(&mut new, self.host.as_ref()) {
            if let Err(e) = new.close(self.host.as_ref()) {
                debug!(fd, error = %e, "closing partial duplicate failed");
            }
            return Err(DtableError::DuplicationFailed { fd, source });
        }
        debug!(
            fd,
            name = old.name(),
            old = ?old.io_handle(),
            new = ?new.io_handle(),
            "duplicated"
        );
        Ok(new)
    }

    /// Duplicate `fd` onto the first free descriptor
    pub fn dup(&self, fd: Fd) -> DtableResult<Fd> {
        let mut state = self.state.write();
        let source = state.get(fd).ok_or(DtableError::BadDescriptor(fd))?;
        let mut new = self.dup_worker(source, fd)?;

        let start = state.first_fd_for_open;
        let target = match state.find_unused(start, &self.config) {
            Ok(target) => target,
            Err(e) => {
                if let Err(close) = new.close(self.host.as_ref()) {
                    debug!(fd, error = %close, "closing unused duplicate failed");
                }
                return Err(e);
            }
        };
        rebind_std_handle(self.host.as_ref(), target, &new);
        state.install(target, new);
        debug!(fd, new_fd = target, "dup");
        Ok(target as Fd)
    }

    /// Make `new_fd` a duplicate of `old_fd`, closing whatever `new_fd` held
    pub fn dup2(&self, old_fd: Fd, new_fd: Fd) -> DtableResult<Fd> {
        debug!(old_fd, new_fd, "dup2");
        let mut state = self.state.write();

        let source = state.get(old_fd).ok_or(DtableError::BadDescriptor(old_fd))?;
        if new_fd < 0 {
            return Err(DtableError::BadDescriptor(new_fd));
        }
        if new_fd == old_fd {
            return Ok(new_fd);
        }

        let mut new = self.dup_worker(source, old_fd)?;

        let target = new_fd as usize;
        if state.is_open(new_fd) {
            if let Err(e) = state.close(target, self.host.as_ref()) {
                warn!(fd = new_fd, error = %e, "closing dup2 target failed");
            }
        } else if target >= state.slots.len() && state.find_unused(target, &self.config).is_err() {
            if let Err(e) = new.close(self.host.as_ref()) {
                debug!(fd = new_fd, error = %e, "closing unused duplicate failed");
            }
            return Err(DtableError::BadDescriptor(new_fd));
        }

        rebind_std_handle(self.host.as_ref(), target, &new);
        state.install(target, new);
        Ok(new_fd)
    }
}
