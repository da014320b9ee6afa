/*!
 * Handler Factory
 * Builds handlers from a classification or a path and registers them
 */

use super::{Dtable, TableState};
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::{Ctty, Fd, HandlerId, NativeHandle, UNREGISTERED};
use crate::device::Device;
use crate::handler::{Handler, HandlerKind, OpenFlags};
use crate::path::{ResolveOptions, ResolvedPath};
use tracing::{debug, error};

/// Outcome of a factory call
#[derive(Debug)]
pub enum Built {
    /// Placed in the table at the requested descriptor
    Registered(HandlerId),
    /// Built for [`UNREGISTERED`]; the caller owns it
    Unregistered(Box<Handler>),
}

impl Built {
    pub fn id(&self) -> HandlerId {
        match self {
            Built::Registered(id) => *id,
            Built::Unregistered(handler) => handler.id(),
        }
    }
}

/// `/dev/tty` names whatever the controlling terminal is
fn resolve_ctty_alias(device: Device, ctty: Ctty) -> Device {
    if device != Device::TTY {
        return device;
    }
    match ctty {
        Ctty::Tty(unit) => Device::tty_slave(unit as u16),
        Ctty::None | Ctty::Console => Device::CONSOLE,
    }
}

/// Fill in whichever of the two names is missing
fn derive_names(
    device: Device,
    posix: Option<String>,
    native: Option<String>,
) -> (Option<String>, Option<String>) {
    match (posix, native) {
        (Some(posix), Some(native)) => (Some(posix), Some(native)),
        (Some(posix), None) => {
            let native = posix.replace('/', "\\");
            (Some(posix), Some(native))
        }
        (None, native) => {
            let native = native.or_else(|| device.native_name());
            let posix = native.as_ref().map(|n| n.replace('\\', "/"));
            (posix, native)
        }
    }
}

impl Dtable {
    /// Build a handler for `device` and register it at `fd`
    ///
    /// With `fd == UNREGISTERED` the handler is handed back instead of being
    /// placed. Registering over an open descriptor releases the occupant.
    ///
    /// # Panics
    ///
    /// Panics when the classification matches no handler kind. A table
    /// holding such a classification can no longer be trusted.
    pub fn build_from_classification(
        &self,
        fd: Fd,
        device: Device,
        posix_name: Option<&str>,
        native_name: Option<&str>,
    ) -> DtableResult<Built> {
        let mut state = self.state.write();
        self.build_in(
            &mut state,
            fd,
            device,
            posix_name.map(str::to_owned),
            native_name.map(str::to_owned),
        )
    }

    /// Resolve `path` and build the handler its classification calls for
    ///
    /// A given `handle` is attached read-write, in the resolved path's mode.
    pub fn build_from_name(&self, fd: Fd, path: &str, handle: Option<NativeHandle>) -> DtableResult<Built> {
        let mut state = self.state.write();
        self.build_from_name_in(&mut state, fd, path, handle)
            .map(|(built, _)| built)
    }

    /// Bind an existing native handle to a descriptor
    ///
    /// `fd == UNREGISTERED` picks the first free descriptor. `binary`
    /// overrides the mode the resolver reports for `name`.
    pub fn attach_handle_to_fd(
        &self,
        name: &str,
        fd: Fd,
        handle: NativeHandle,
        binary: Option<bool>,
        access: OpenFlags,
    ) -> DtableResult<Fd> {
        let mut state = self.state.write();
        let fd = if fd == UNREGISTERED {
            let start = state.first_fd_for_open;
            state.find_unused(start, &self.config)? as Fd
        } else {
            fd
        };

        let (_, resolved) = self.build_from_name_in(&mut state, fd, name, None)?;
        let handler = state.get_mut(fd).ok_or(DtableError::BadDescriptor(fd))?;
        handler.init(handle, access.with_binary(binary.unwrap_or(resolved.binary)));
        debug!(fd, %handle, name, "attached native handle");
        Ok(fd)
    }

    pub(crate) fn build_from_name_in(
        &self,
        state: &mut TableState,
        fd: Fd,
        path: &str,
        handle: Option<NativeHandle>,
    ) -> DtableResult<(Built, ResolvedPath)> {
        let resolved = self.resolver.resolve(path, ResolveOptions::default())?;
        let mut built = self.build_in(
            state,
            fd,
            resolved.device,
            Some(resolved.posix_path.clone()),
            resolved.native_path.clone(),
        )?;

        if let Some(handle) = handle {
            let flags = OpenFlags::read_write().with_binary(resolved.binary);
            match &mut built {
                Built::Registered(_) => {
                    if let Some(handler) = state.get_mut(fd) {
                        handler.init(handle, flags);
                    }
                }
                Built::Unregistered(handler) => handler.init(handle, flags),
            }
        }
        Ok((built, resolved))
    }

    pub(crate) fn build_in(
        &self,
        state: &mut TableState,
        fd: Fd,
        device: Device,
        posix_name: Option<String>,
        native_name: Option<String>,
    ) -> DtableResult<Built> {
        if fd < UNREGISTERED {
            return Err(DtableError::BadDescriptor(fd));
        }

        let handler = construct(state.ctty, device, posix_name, native_name);
        debug!(fd, handler = %handler.id(), kind = %handler.kind(), name = handler.name(), "built");

        if fd == UNREGISTERED {
            return Ok(Built::Unregistered(handler));
        }

        let slot = fd as usize;
        if slot >= state.slots.len() {
            state.find_unused(slot, &self.config)?;
        } else if state.slots[slot].is_some() {
            state.release(slot, self.host.as_ref());
        }
        let id = handler.id();
        state.install(slot, handler);
        Ok(Built::Registered(id))
    }
}

/// Construct the handler variant for a classification
///
/// # Panics
///
/// Panics on a classification no handler kind covers.
pub(crate) fn construct(
    ctty: Ctty,
    device: Device,
    posix_name: Option<String>,
    native_name: Option<String>,
) -> Box<Handler> {
    let device = resolve_ctty_alias(device, ctty);
    let kind = HandlerKind::from_device(device).unwrap_or_else(|| {
        let name = posix_name.as_deref().or(native_name.as_deref()).unwrap_or("");
        error!(%device, name, "unknown device classification");
        panic!("internal error -- unknown device - {}, '{}'", device, name)
    });

    let (posix, native) = derive_names(device, posix_name, native_name);
    let mut handler = Box::new(Handler::new(kind, device));
    handler.set_names(posix, native);
    handler
}
