/*!
 * Handler
 * Per-descriptor wrapper around the native resource behind a descriptor
 */

use super::flags::OpenFlags;
use super::kind::HandlerKind;
use super::select::SelectRecord;
use crate::core::types::{HandlerId, NativeHandle, Pid};
use crate::device::Device;
use crate::host::{Host, HostResult, Readiness};
use bytes::BytesMut;
use tracing::debug;

/// Wrapper bound to exactly one descriptor
///
/// A handler owns its native handles: the table never lets two descriptors
/// share one instance, and duplication always produces a new instance with
/// its own native handles on the same underlying resource.
#[derive(Debug)]
pub struct Handler {
    id: HandlerId,
    kind: HandlerKind,
    device: Device,
    posix_name: Option<String>,
    native_name: Option<String>,
    io_handle: Option<NativeHandle>,
    output_handle: Option<NativeHandle>,
    flags: OpenFlags,
    close_on_exec: bool,
    need_fork_fixup: bool,
    readahead: BytesMut,
    /// Socket handle already duplicated into the next child process
    prepared: Option<(Pid, NativeHandle)>,
}

impl Handler {
    pub(crate) fn new(kind: HandlerKind, device: Device) -> Self {
        Self {
            id: HandlerId::next(),
            kind,
            device,
            posix_name: None,
            native_name: None,
            io_handle: None,
            output_handle: None,
            flags: OpenFlags::default(),
            close_on_exec: false,
            need_fork_fixup: kind.needs_fork_fixup(),
            readahead: BytesMut::new(),
            prepared: None,
        }
    }

    /// Attach a native handle with the given access flags
    pub fn init(&mut self, handle: NativeHandle, flags: OpenFlags) {
        self.io_handle = Some(handle);
        self.flags = flags;
    }

    #[inline]
    pub fn id(&self) -> HandlerId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> HandlerKind {
        self.kind
    }

    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn posix_name(&self) -> Option<&str> {
        self.posix_name.as_deref()
    }

    pub fn native_name(&self) -> Option<&str> {
        self.native_name.as_deref()
    }

    /// Display name: POSIX name, falling back to the native one
    pub fn name(&self) -> &str {
        self.posix_name
            .as_deref()
            .or(self.native_name.as_deref())
            .unwrap_or("")
    }

    pub(crate) fn set_names(&mut self, posix: Option<String>, native: Option<String>) {
        self.posix_name = posix;
        self.native_name = native;
    }

    #[inline]
    pub fn io_handle(&self) -> Option<NativeHandle> {
        self.io_handle
    }

    /// Handle used for output; the io handle unless a distinct one was set
    #[inline]
    pub fn output_handle(&self) -> Option<NativeHandle> {
        self.output_handle.or(self.io_handle)
    }

    pub fn set_output_handle(&mut self, handle: NativeHandle) {
        self.output_handle = Some(handle);
    }

    #[inline]
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    #[inline]
    pub fn close_on_exec(&self) -> bool {
        self.close_on_exec
    }

    /// Set the close-on-exec flag, keeping native inheritability in step
    pub fn set_close_on_exec(&mut self, host: &dyn Host, on: bool) -> HostResult<()> {
        for handle in self.native_handles() {
            host.set_inheritable(handle, !on)?;
        }
        self.close_on_exec = on;
        Ok(())
    }

    #[inline]
    pub fn need_fork_fixup(&self) -> bool {
        self.need_fork_fixup
    }

    pub fn set_need_fork_fixup(&mut self, on: bool) {
        self.need_fork_fixup = on;
    }

    /// Buffer data read ahead of the caller
    pub fn put_readahead(&mut self, data: &[u8]) {
        self.readahead.extend_from_slice(data);
    }

    pub fn readahead(&self) -> &[u8] {
        &self.readahead
    }

    pub fn clear_readahead(&mut self) {
        self.readahead.clear();
    }

    /// Socket handle prepared for a child, if any
    pub fn prepared_handle(&self) -> Option<NativeHandle> {
        self.prepared.map(|(_, handle)| handle)
    }

    /// Forget the prepared socket once a child image owns it
    pub(crate) fn hand_over_prepared(&mut self) {
        self.prepared = None;
    }

    /// Empty handler of the same kind carrying this one's names and flags
    ///
    /// The result has a fresh id, no native handles and close-on-exec clear;
    /// [`Handler::dup`] fills in the handles.
    pub(crate) fn duplicate_shell(&self) -> Self {
        Self {
            posix_name: self.posix_name.clone(),
            native_name: self.native_name.clone(),
            flags: self.flags,
            need_fork_fixup: self.need_fork_fixup,
            ..Self::new(self.kind, self.device)
        }
    }

    /// Same instance as seen from a forked image: identity and handle values kept
    pub(crate) fn replicate(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            device: self.device,
            posix_name: self.posix_name.clone(),
            native_name: self.native_name.clone(),
            io_handle: self.io_handle,
            output_handle: self.output_handle,
            flags: self.flags,
            close_on_exec: self.close_on_exec,
            need_fork_fixup: self.need_fork_fixup,
            readahead: self.readahead.clone(),
            prepared: self.prepared,
        }
    }

    /// Duplicate this handler's native handles into `dest`
    ///
    /// Handles already duplicated stay on `dest` when a later one fails, so
    /// the caller closes `dest` on error.
    pub fn dup(&self, dest: &mut Handler, host: &dyn Host) -> HostResult<()> {
        if let Some(io) = self.io_handle {
            dest.io_handle = Some(host.duplicate_handle(io, false)?);
        }
        if let Some(output) = self.output_handle {
            dest.output_handle = Some(host.duplicate_handle(output, false)?);
        }
        Ok(())
    }

    /// Prepare the native handles for a process about to be created
    ///
    /// Sockets are duplicated for `target` up front; everything else is made
    /// inheritable unless close-on-exec. A socket still prepared for an
    /// earlier target is closed in that process first.
    pub fn fixup_before_fork_exec(&mut self, host: &dyn Host, target: Pid) -> HostResult<()> {
        if self.kind.is_socket() {
            if let Some((stale_target, stale)) = self.prepared.take() {
                if let Err(e) = host.close_remote_handle(stale_target, stale) {
                    debug!(
                        handler = %self.id,
                        socket = %stale,
                        target = stale_target,
                        error = %e,
                        "closing stale prepared socket failed"
                    );
                }
            }
            if let Some(io) = self.io_handle {
                self.prepared = Some((target, host.duplicate_socket_for(io, target)?));
                debug!(handler = %self.id, socket = %io, target, "socket prepared for child");
            }
            return Ok(());
        }
        for handle in self.native_handles() {
            host.set_inheritable(handle, !self.close_on_exec)?;
        }
        Ok(())
    }

    /// Re-establish native handles in a forked child
    ///
    /// Handles the child did not inherit are duplicated again from `parent`.
    pub fn fixup_after_fork(&mut self, host: &dyn Host, parent: Pid) -> HostResult<()> {
        if self.kind.is_socket() {
            self.adopt_prepared();
            return Ok(());
        }
        let inheritable = !self.close_on_exec;
        if let Some(io) = self.io_handle {
            self.io_handle = Some(refresh_from_parent(host, parent, io, inheritable)?);
        }
        if let Some(output) = self.output_handle {
            self.output_handle = Some(refresh_from_parent(host, parent, output, inheritable)?);
        }
        Ok(())
    }

    /// Re-establish native handles in an exec'd image
    pub fn fixup_after_exec(&mut self, _host: &dyn Host, _parent: Pid) -> HostResult<()> {
        if self.kind.is_socket() {
            self.adopt_prepared();
        }
        Ok(())
    }

    /// Close the native handles
    ///
    /// Every handle is attempted; the first failure is reported.
    pub fn close(&mut self, host: &dyn Host) -> HostResult<()> {
        let mut result = Ok(());
        if let Some(output) = self.output_handle.take() {
            if Some(output) != self.io_handle {
                result = host.close_handle(output);
            }
        }
        if let Some(io) = self.io_handle.take() {
            let closed = host.close_handle(io);
            if result.is_ok() {
                result = closed;
            }
        }
        result
    }

    pub fn select_read(&self, host: &dyn Host, record: &mut SelectRecord) {
        self.select(host, Readiness::Read, record);
    }

    pub fn select_write(&self, host: &dyn Host, record: &mut SelectRecord) {
        self.select(host, Readiness::Write, record);
    }

    pub fn select_except(&self, host: &dyn Host, record: &mut SelectRecord) {
        self.select(host, Readiness::Except, record);
    }

    fn select(&self, host: &dyn Host, readiness: Readiness, record: &mut SelectRecord) {
        if self.kind.always_ready() {
            record.wait_handle = None;
            record.mark(readiness, true);
            return;
        }
        let handle = match readiness {
            Readiness::Write => self.output_handle(),
            Readiness::Read | Readiness::Except => self.io_handle,
        };
        record.wait_handle = handle;
        record.mark(readiness, handle.map_or(false, |h| host.poll(h, readiness)));
    }

    fn adopt_prepared(&mut self) {
        if let Some((_, prepared)) = self.prepared.take() {
            debug!(handler = %self.id, socket = %prepared, "adopted prepared socket");
            self.io_handle = Some(prepared);
        }
    }

    fn native_handles(&self) -> impl Iterator<Item = NativeHandle> {
        let output = self.output_handle.filter(|h| Some(*h) != self.io_handle);
        self.io_handle.into_iter().chain(output)
    }
}

fn refresh_from_parent(
    host: &dyn Host,
    parent: Pid,
    handle: NativeHandle,
    inheritable: bool,
) -> HostResult<NativeHandle> {
    if inheritable && host.file_type(handle).is_ok() {
        return Ok(handle);
    }
    host.duplicate_from_process(parent, handle, inheritable)
}
