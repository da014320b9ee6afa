/*!
 * Host Traits
 * Native OS services the descriptor table is built on
 */

use super::types::*;
use crate::core::types::{NativeHandle, Pid, StdStream};

/// Native host services
///
/// The host's handles have no POSIX lifetime, duplication or inheritance
/// rules of their own; the descriptor table layers those on top of the
/// primitives below. All methods act on the calling process unless they
/// name another one.
pub trait Host: Send + Sync {
    /// Identifier of the calling process
    fn current_process(&self) -> Pid;

    /// Current binding of a host standard-stream slot
    fn std_handle(&self, stream: StdStream) -> Option<NativeHandle>;

    /// Rebind a host standard-stream slot
    fn set_std_handle(&self, stream: StdStream, handle: Option<NativeHandle>);

    /// Native file type; fails with `InvalidHandle` for handles that do not exist
    fn file_type(&self, handle: NativeHandle) -> HostResult<NativeFileType>;

    /// Whether the handle is a console screen buffer
    fn is_console_output(&self, handle: NativeHandle) -> bool;

    /// Whether the handle is a console input buffer
    fn is_console_input(&self, handle: NativeHandle) -> bool;

    /// Whether the handle is a connected socket
    fn is_connected_socket(&self, handle: NativeHandle) -> bool;

    /// Whether the handle answers a serial-port state query
    fn is_serial_port(&self, handle: NativeHandle) -> bool;

    /// Duplicate a handle within the calling process
    fn duplicate_handle(&self, handle: NativeHandle, inheritable: bool) -> HostResult<NativeHandle>;

    /// Duplicate a handle owned by `source` into the calling process
    fn duplicate_from_process(
        &self,
        source: Pid,
        handle: NativeHandle,
        inheritable: bool,
    ) -> HostResult<NativeHandle>;

    /// Prepare a socket for use by `target`, returning the value `target` will see
    fn duplicate_socket_for(&self, handle: NativeHandle, target: Pid) -> HostResult<NativeHandle>;

    /// Change whether child processes inherit the handle
    fn set_inheritable(&self, handle: NativeHandle, inheritable: bool) -> HostResult<()>;

    fn close_handle(&self, handle: NativeHandle) -> HostResult<()>;

    /// Close a handle owned by another process
    fn close_remote_handle(&self, process: Pid, handle: NativeHandle) -> HostResult<()>;

    /// Move the handle's file pointer to end of file, returning the new position
    fn seek_to_end(&self, handle: NativeHandle) -> HostResult<u64>;

    /// Non-blocking readiness check
    fn poll(&self, handle: NativeHandle, readiness: Readiness) -> bool;

    /// Whether the process has a console attached
    fn has_console(&self) -> bool;

    /// Detach the process from its console
    fn free_console(&self);

    /// Kernel object name of a handle
    ///
    /// `Ok(None)` means the query worked but the object is unnamed.
    fn query_object_name(&self, handle: NativeHandle) -> HostResult<Option<String>>;

    /// Names of all drive-letter style device mappings, or `None` if enumeration is unavailable
    fn dos_devices(&self) -> Option<Vec<String>>;

    /// Object-namespace target of one device mapping
    fn dos_device_target(&self, name: &str) -> Option<String>;

    /// Whether the calling thread runs under an impersonation token
    fn is_impersonating(&self) -> bool;

    /// Drop impersonation, reverting to the process token
    fn revert_to_self(&self);

    /// Resume impersonation with the saved token
    fn impersonate(&self);
}

/// Suspends impersonation for its lifetime
///
/// Restores impersonation on drop, so every exit path of the enclosing
/// scope puts the caller's security context back.
pub struct ImpersonationSuspended<'a> {
    host: &'a dyn Host,
    was_impersonating: bool,
}

impl<'a> ImpersonationSuspended<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        let was_impersonating = host.is_impersonating();
        if was_impersonating {
            host.revert_to_self();
        }
        Self {
            host,
            was_impersonating,
        }
    }
}

impl Drop for ImpersonationSuspended<'_> {
    fn drop(&mut self) {
        if self.was_impersonating {
            self.host.impersonate();
        }
    }
}
