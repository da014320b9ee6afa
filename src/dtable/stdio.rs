/*!
 * Standard Stream Bootstrap
 * Descriptors 0 to 2 from the host's std handles, and std-slot rebinding
 */

use super::identify::handle_to_name;
use super::Dtable;
use crate::core::errors::DtableResult;
use crate::core::limits::{MAX_STD_FD, SERIAL_STD_PATH, TTY_PATH, UNKNOWN_FILE};
use crate::core::types::{Ctty, Fd, NativeHandle, StdStream};
use crate::device::Device;
use crate::handler::{Handler, OpenFlags};
use crate::host::{Host, NativeFileType};
use crate::monitoring::span_operation;
use tracing::{debug, info, warn};

/// Point the host's std slot for `fd` at the handler's handles
///
/// Input uses the io handle, output and error the output handle.
pub(crate) fn rebind_std_handle(host: &dyn Host, fd: usize, handler: &Handler) {
    if fd > MAX_STD_FD {
        return;
    }
    if let Some(stream) = StdStream::for_fd(fd) {
        let handle = match stream {
            StdStream::Input => handler.io_handle(),
            StdStream::Output | StdStream::Error => handler.output_handle(),
        };
        host.set_std_handle(stream, handle);
    }
}

/// How an inherited std handle is to be wrapped
enum StdSource {
    Device(Device),
    Path(String),
    Named(String),
}

impl Dtable {
    /// Populate descriptors 0 to 2 from the host's std handles
    ///
    /// Skipped entirely when a parent already handed its descriptors over.
    pub fn stdio_init(&self) -> DtableResult<()> {
        let span = span_operation("stdio_init");
        let _guard = span.enter();
        if self.state.read().emulated_parent {
            debug!("descriptors inherited from parent; skipping std bootstrap");
            return Ok(());
        }

        let host = self.host.as_ref();
        let input = host.std_handle(StdStream::Input);
        let output = host.std_handle(StdStream::Output);
        let mut error = host.std_handle(StdStream::Error);

        self.init_std_file_from_handle(StdStream::Input.fd(), input)?;

        if let (Some(out), Some(err)) = (output, error) {
            if out == err {
                match host.duplicate_handle(out, true) {
                    Ok(distinct) => error = Some(distinct),
                    Err(e) => warn!(error = %e, "couldn't make stderr distinct from stdout"),
                }
            }
        }

        self.init_std_file_from_handle(StdStream::Output.fd(), output)?;
        self.init_std_file_from_handle(StdStream::Error.fd(), error)?;

        let mut state = self.state.write();
        if state.ctty == Ctty::None && host.has_console() {
            state.ctty = Ctty::Console;
        }
        let open = state.slots.iter().take(MAX_STD_FD + 1).flatten().count();
        info!(open, ctty = ?state.ctty, "standard streams initialized");
        span.record_items_processed(open);
        span.record_result(true);
        Ok(())
    }

    /// Wrap an inherited native handle as descriptor `fd`
    ///
    /// Already-open descriptors are left alone, and so are missing or
    /// invalid handles (the slot stays empty).
    pub fn init_std_file_from_handle(&self, fd: Fd, handle: Option<NativeHandle>) -> DtableResult<()> {
        let mut state = self.state.write();
        state.first_fd_for_open = 0;
        if state.is_open(fd) {
            return Ok(());
        }
        let Some(handle) = handle else {
            return Ok(());
        };

        let host = self.host.as_ref();
        let file_type = match host.file_type(handle) {
            Ok(file_type) => file_type,
            Err(e) => {
                debug!(fd, %handle, error = %e, "invalid std handle; slot left empty");
                return Ok(());
            }
        };

        let source = if host.is_console_output(handle) || host.is_console_input(handle) {
            if self.config.use_tty {
                StdSource::Path(TTY_PATH.to_string())
            } else {
                StdSource::Device(Device::CONSOLE)
            }
        } else if file_type == NativeFileType::Pipe {
            StdSource::Device(if fd == 0 { Device::PIPER } else { Device::PIPEW })
        } else if host.is_connected_socket(handle) {
            StdSource::Device(Device::SOCKET)
        } else if host.is_serial_port(handle) {
            StdSource::Path(SERIAL_STD_PATH.to_string())
        } else {
            match handle_to_name(host, self.resolver.as_ref(), handle) {
                Some(name) => StdSource::Named(name),
                None => {
                    debug!(fd, %handle, "std handle has no name; slot left empty");
                    return Ok(());
                }
            }
        };

        let binary = match source {
            StdSource::Device(device) => {
                self.build_in(&mut state, fd, device, None, None)?;
                true
            }
            StdSource::Path(path) => {
                self.build_from_name_in(&mut state, fd, &path, None)?;
                true
            }
            StdSource::Named(name) => {
                let placeholder = name == UNKNOWN_FILE;
                match self.build_from_name_in(&mut state, fd, &name, None) {
                    Ok((_, resolved)) => resolved.binary && !placeholder,
                    Err(e) => {
                        warn!(fd, name = %name, error = %e, "std handle name did not resolve; slot left empty");
                        return Ok(());
                    }
                }
            }
        };

        if let Some(handler) = state.get_mut(fd) {
            handler.init(handle, OpenFlags::read_write().with_binary(binary));
            if let Ok(slot) = usize::try_from(fd) {
                rebind_std_handle(host, slot, handler);
            }
            debug!(fd, %handle, kind = %handler.kind(), name = handler.name(), "std descriptor initialized");
        }
        Ok(())
    }
}
