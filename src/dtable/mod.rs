/*!
 * Descriptor Table
 * POSIX descriptor semantics layered over host native handles
 */

mod dup;
mod factory;
mod fork;
pub mod identify;
mod select;
mod stdio;
mod table;
mod vfork;

pub use factory::Built;
pub use identify::handle_to_name;
pub use table::{DescriptorInfo, TableSnapshot};

use crate::core::config::DtableConfig;
use crate::core::errors::{DtableError, DtableResult};
use crate::core::types::{Ctty, Fd, HandlerId};
use crate::handler::Handler;
use crate::host::Host;
use crate::path::PathResolver;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Owning slot array; `None` is a closed descriptor
pub(crate) type Slots = Vec<Option<Box<Handler>>>;

/// Everything the table lock protects
#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) slots: Slots,
    pub(crate) console_fds: usize,
    /// Sockets that must be prepared before a fork or exec
    pub(crate) need_fixup_before: usize,
    /// Pre-vfork table, present only while a vfork-style child runs
    pub(crate) shadow: Option<Slots>,
    pub(crate) first_fd_for_open: usize,
    pub(crate) ctty: Ctty,
    /// Started by a parent that already handed over its descriptors
    pub(crate) emulated_parent: bool,
}

/// Process descriptor table
///
/// One instance per emulated process, passed by reference to whatever needs
/// it. A single `RwLock` guards the slots and the console/socket counters:
/// structure-mutating operations hold the write lock for their whole
/// duration, lookups take the read lock.
pub struct Dtable {
    state: RwLock<TableState>,
    host: Arc<dyn Host>,
    resolver: Arc<dyn PathResolver>,
    config: DtableConfig,
}

impl Dtable {
    /// Create a table with `config.initial_size` empty slots
    pub fn new(
        host: Arc<dyn Host>,
        resolver: Arc<dyn PathResolver>,
        config: DtableConfig,
    ) -> DtableResult<Self> {
        config.validate()?;
        let slots = table::empty_slots(config.initial_size, config.max_descriptors)?;
        info!(
            pid = host.current_process(),
            size = config.initial_size,
            max = config.max_descriptors,
            "descriptor table initialized"
        );
        Ok(Self {
            state: RwLock::new(TableState {
                slots,
                console_fds: 0,
                need_fixup_before: 0,
                shadow: None,
                first_fd_for_open: 0,
                ctty: Ctty::None,
                emulated_parent: false,
            }),
            host,
            resolver,
            config,
        })
    }

    pub fn with_defaults(host: Arc<dyn Host>, resolver: Arc<dyn PathResolver>) -> DtableResult<Self> {
        Self::new(host, resolver, DtableConfig::default())
    }

    #[inline]
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    #[inline]
    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &DtableConfig {
        &self.config
    }

    /// Current capacity
    pub fn size(&self) -> usize {
        self.state.read().slots.len()
    }

    pub fn console_fds(&self) -> usize {
        self.state.read().console_fds
    }

    pub fn need_fixup_before(&self) -> usize {
        self.state.read().need_fixup_before
    }

    /// Hint for where the next descriptor search starts
    pub fn first_fd_for_open(&self) -> usize {
        self.state.read().first_fd_for_open
    }

    pub fn set_first_fd_for_open(&self, fd: usize) {
        self.state.write().first_fd_for_open = fd;
    }

    pub fn ctty(&self) -> Ctty {
        self.state.read().ctty
    }

    pub fn set_ctty(&self, ctty: Ctty) {
        self.state.write().ctty = ctty;
    }

    /// Mark the process as started by a parent that passes its descriptors on
    pub fn set_emulated_parent(&self, on: bool) {
        self.state.write().emulated_parent = on;
    }

    /// Whether a vfork-style child currently owns the live table
    pub fn vfork_active(&self) -> bool {
        self.state.read().shadow.is_some()
    }

    /// Identity of the handler at `fd`
    pub fn handler_id(&self, fd: Fd) -> Option<HandlerId> {
        self.state.read().get(fd).map(Handler::id)
    }

    /// Run `f` against the handler at `fd` under the read lock
    pub fn with_handler<R>(&self, fd: Fd, f: impl FnOnce(&Handler) -> R) -> DtableResult<R> {
        let state = self.state.read();
        state
            .get(fd)
            .map(f)
            .ok_or(DtableError::BadDescriptor(fd))
    }

    /// Run `f` against the handler at `fd` under the write lock
    pub fn with_handler_mut<R>(&self, fd: Fd, f: impl FnOnce(&mut Handler) -> R) -> DtableResult<R> {
        let mut state = self.state.write();
        state
            .get_mut(fd)
            .map(f)
            .ok_or(DtableError::BadDescriptor(fd))
    }
}

impl std::fmt::Debug for Dtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Dtable")
            .field("pid", &self.host.current_process())
            .field("size", &state.slots.len())
            .field("open", &state.slots.iter().flatten().count())
            .field("console_fds", &state.console_fds)
            .field("need_fixup_before", &state.need_fixup_before)
            .field("vfork_active", &state.shadow.is_some())
            .finish()
    }
}
