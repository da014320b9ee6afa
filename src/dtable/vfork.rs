/*!
 * Vfork Protocol
 * Shadow-table save, reconcile and restore around a vfork-style child
 */

use super::table::empty_slots;
use super::Dtable;
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::Fd;
use crate::host::ImpersonationSuspended;
use crate::monitoring::span_operation;
use tracing::{debug, info, warn};

impl Dtable {
    /// Phase 1: give the child a private duplicate of every open descriptor
    ///
    /// Each duplicate keeps its source's close-on-exec flag. Either every
    /// descriptor is duplicated and the live table moves into the shadow
    /// slot, or nothing changes and `BadDescriptor` names the descriptor
    /// that failed. Impersonation is suspended while duplicating.
    pub fn vfork_child_dup(&self) -> DtableResult<()> {
        let span = span_operation("vfork_child_dup");
        let _guard = span.enter();
        let mut state = self.state.write();
        if state.shadow.is_some() {
            return Err(DtableError::InvalidState(
                "a vfork-style child is already active".into(),
            ));
        }

        let host = self.host.as_ref();
        let _suspended = ImpersonationSuspended::new(host);

        let fresh = empty_slots(state.slots.len(), self.config.max_descriptors)?;
        let mut dups = Vec::new();
        let mut failed: Option<Fd> = None;
        for (fd, slot) in state.slots.iter().enumerate() {
            let Some(source) = slot.as_deref() else {
                continue;
            };
            let duplicated = self.dup_worker(source, fd as Fd).and_then(|mut dup| {
                if source.close_on_exec() {
                    if let Err(e) = dup.set_close_on_exec(host, true) {
                        if let Err(close) = dup.close(host) {
                            debug!(fd, error = %close, "closing partial duplicate failed");
                        }
                        return Err(DtableError::from(e));
                    }
                }
                Ok(dup)
            });
            match duplicated {
                Ok(dup) => dups.push((fd, dup)),
                Err(e) => {
                    warn!(fd, error = %e, "vfork duplication failed; rolling back");
                    failed = Some(fd as Fd);
                    break;
                }
            }
        }

        if let Some(fd) = failed {
            for (_, mut dup) in dups {
                if let Err(e) = dup.close(host) {
                    debug!(error = %e, "rollback close failed");
                }
            }
            span.record_result(false);
            return Err(DtableError::BadDescriptor(fd));
        }

        let duplicated = dups.len();
        let live = std::mem::replace(&mut state.slots, fresh);
        for (fd, dup) in dups {
            state.install(fd, dup);
        }
        state.shadow = Some(live);

        info!(duplicated, "vfork child table in place");
        span.record_items_processed(duplicated);
        span.record_result(true);
        Ok(())
    }

    /// Phase 2, in the child's image: reconcile and discard the shadow table
    ///
    /// Close-on-exec entries are released; every other entry is closed and
    /// released. A no-op when no shadow table exists.
    pub fn vfork_child_fixup(&self) -> DtableResult<()> {
        let mut state = self.state.write();
        let Some(mut shadow) = state.shadow.take() else {
            return Ok(());
        };
        let host = self.host.as_ref();

        let mut reconciled = 0;
        for (fd, slot) in shadow.iter_mut().enumerate() {
            let Some(mut handler) = slot.take() else {
                continue;
            };
            handler.clear_readahead();
            if !handler.close_on_exec() {
                if let Err(e) = handler.close(host) {
                    debug!(fd, error = %e, "closing shadow descriptor failed");
                }
            }
            state.account_release(&handler, host);
            reconciled += 1;
        }
        debug!(reconciled, "vfork shadow table discarded");
        Ok(())
    }

    /// Phase 3, in the parent: close the child's table and reinstate the shadow
    ///
    /// Runs to completion regardless of close failures. Fails only when no
    /// vfork-style child is active.
    pub fn vfork_parent_restore(&self) -> DtableResult<()> {
        let mut state = self.state.write();
        let Some(shadow) = state.shadow.take() else {
            return Err(DtableError::InvalidState(
                "no vfork-style child to restore from".into(),
            ));
        };
        let closed = state.close_all(self.host.as_ref());
        state.slots = shadow;
        info!(closed, "parent descriptor table restored");
        Ok(())
    }
}
