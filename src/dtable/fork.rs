/*!
 * Fork and Exec Coordinator
 * Table walks at the simulated process-transition points
 */

use super::stdio::rebind_std_handle;
use super::{Dtable, Slots, TableState};
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::Pid;
use crate::host::Host;
use crate::monitoring::span_operation;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Keep the first error of a walk that does not stop on errors
fn keep_first(first: &mut Option<DtableError>, result: DtableResult<()>) {
    if let Err(e) = result {
        warn!(error = %e, "descriptor fixup failed");
        first.get_or_insert(e);
    }
}

fn walk_result(first: Option<DtableError>) -> DtableResult<()> {
    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn replicate_slots(slots: &Slots) -> Slots {
    slots
        .iter()
        .map(|slot| slot.as_ref().map(|handler| Box::new(handler.replicate())))
        .collect()
}

impl Dtable {
    /// Prepare every open descriptor for a child about to be forked
    pub fn fixup_before_fork(&self, target: Pid) -> DtableResult<()> {
        self.fixup_before(target, false, "fixup_before_fork")
    }

    /// Prepare descriptors that survive exec for the new image
    pub fn fixup_before_exec(&self, target: Pid) -> DtableResult<()> {
        self.fixup_before(target, true, "fixup_before_exec")
    }

    fn fixup_before(&self, target: Pid, skip_close_on_exec: bool, operation: &str) -> DtableResult<()> {
        let span = span_operation(operation);
        let _guard = span.enter();
        let mut state = self.state.write();
        let host = self.host.as_ref();

        let mut first = None;
        let mut walked = 0;
        for (fd, slot) in state.slots.iter_mut().enumerate() {
            let Some(handler) = slot.as_deref_mut() else {
                continue;
            };
            if skip_close_on_exec && handler.close_on_exec() {
                continue;
            }
            debug!(fd, name = handler.name(), target, "preparing for child");
            keep_first(
                &mut first,
                handler.fixup_before_fork_exec(host, target).map_err(DtableError::from),
            );
            walked += 1;
        }

        span.record_items_processed(walked);
        span.record_result(first.is_none());
        walk_result(first)
    }

    /// Move every append-mode descriptor's file pointer to end of file
    pub fn set_file_pointers_for_exec(&self) -> DtableResult<()> {
        let state = self.state.write();
        let mut first = None;
        for handler in state.slots.iter().flatten() {
            if !handler.flags().append {
                continue;
            }
            if let Some(handle) = handler.io_handle() {
                let moved = self.host.seek_to_end(handle).map(|position| {
                    debug!(name = handler.name(), position, "append pointer moved to end");
                });
                keep_first(&mut first, moved.map_err(DtableError::from));
            }
        }
        walk_result(first)
    }

    /// Walk the table in a freshly exec'd image
    ///
    /// Close-on-exec descriptors are released; the rest finish their fixup
    /// and descriptors 0 to 2 are rebound to the host's std slots.
    pub fn fixup_after_exec(&self, parent: Pid) -> DtableResult<()> {
        let span = span_operation("fixup_after_exec");
        let _guard = span.enter();
        let mut state = self.state.write();
        let host = self.host.as_ref();
        state.first_fd_for_open = 0;

        let mut first = None;
        let mut released = 0;
        for fd in 0..state.slots.len() {
            let close_on_exec = match state.slots[fd].as_deref_mut() {
                Some(handler) => {
                    handler.clear_readahead();
                    handler.close_on_exec()
                }
                None => continue,
            };
            if close_on_exec {
                state.release(fd, host);
                released += 1;
            } else if let Some(handler) = state.slots[fd].as_deref_mut() {
                keep_first(
                    &mut first,
                    handler.fixup_after_exec(host, parent).map_err(DtableError::from),
                );
                rebind_std_handle(host, fd, handler);
            }
        }

        debug!(released, "exec fixup complete");
        span.record_items_processed(released);
        span.record_result(first.is_none());
        walk_result(first)
    }

    /// Walk the table in a freshly forked child
    pub fn fixup_after_fork(&self, parent: Pid) -> DtableResult<()> {
        let span = span_operation("fixup_after_fork");
        let _guard = span.enter();
        let mut state = self.state.write();
        let host = self.host.as_ref();

        let mut first = None;
        let mut fixed = 0;
        for (fd, slot) in state.slots.iter_mut().enumerate() {
            let Some(handler) = slot.as_deref_mut() else {
                continue;
            };
            if handler.close_on_exec() || handler.need_fork_fixup() {
                debug!(fd, name = handler.name(), parent, "fork fixup");
                keep_first(
                    &mut first,
                    handler.fixup_after_fork(host, parent).map_err(DtableError::from),
                );
                fixed += 1;
            }
            rebind_std_handle(host, fd, handler);
        }

        span.record_items_processed(fixed);
        span.record_result(first.is_none());
        walk_result(first)
    }

    /// The table as a child process created from this one starts out with
    ///
    /// Handler identities, flags and handle values are carried over as-is;
    /// the child is expected to run `fixup_after_fork` or `fixup_after_exec`
    /// against `child_host` next. Sockets prepared by `fixup_before_fork`
    /// move to the image and are no longer tracked by this table.
    pub fn fork_image(&self, child_host: Arc<dyn Host>) -> Dtable {
        let mut state = self.state.write();
        let image = TableState {
            slots: replicate_slots(&state.slots),
            console_fds: state.console_fds,
            need_fixup_before: state.need_fixup_before,
            shadow: state.shadow.as_ref().map(replicate_slots),
            first_fd_for_open: state.first_fd_for_open,
            ctty: state.ctty,
            emulated_parent: true,
        };
        // Prepared sockets now belong to the image
        let TableState { slots, shadow, .. } = &mut *state;
        for handler in slots.iter_mut().chain(shadow.iter_mut().flatten()).flatten() {
            handler.hand_over_prepared();
        }
        debug!(
            parent = self.host.current_process(),
            child = child_host.current_process(),
            "table image created for child"
        );
        Dtable {
            state: RwLock::new(image),
            host: child_host,
            resolver: Arc::clone(&self.resolver),
            config: self.config,
        }
    }
}
