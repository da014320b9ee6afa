/*!
 * Simulated Host
 * In-memory handle and object namespace with per-process handle tables
 */

use super::traits::Host;
use super::types::*;
use crate::core::types::{NativeHandle, Pid, StdStream};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Process id given to the first simulated process
pub const FIRST_PID: Pid = 1000;

/// Identity of a simulated kernel object
pub type ObjectId = u64;

/// Kind of object a simulated handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    File,
    Pipe,
    ConsoleInput,
    ConsoleOutput,
    Socket,
    Serial,
    Device,
}

impl ObjectKind {
    // [read, write, except]
    fn default_readiness(self) -> [bool; 3] {
        match self {
            ObjectKind::File | ObjectKind::Device => [true, true, false],
            ObjectKind::ConsoleInput => [false, false, false],
            ObjectKind::Pipe
            | ObjectKind::ConsoleOutput
            | ObjectKind::Socket
            | ObjectKind::Serial => [false, true, false],
        }
    }
}

/// What an object-name query returns for an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectName {
    Named(String),
    Unnamed,
    Unqueryable,
}

#[derive(Debug, Clone)]
struct SimObject {
    kind: ObjectKind,
    name: ObjectName,
    position: u64,
    size: u64,
    ready: [bool; 3],
    duplicable: bool,
}

#[derive(Debug, Clone, Copy)]
struct HandleEntry {
    object: ObjectId,
    inheritable: bool,
}

#[derive(Debug, Default)]
struct ProcessState {
    handles: HashMap<NativeHandle, HandleEntry>,
    std: [Option<NativeHandle>; 3],
    console: bool,
    impersonating: bool,
    reverts: usize,
}

struct World {
    objects: DashMap<ObjectId, SimObject, RandomState>,
    processes: DashMap<Pid, ProcessState, RandomState>,
    next_handle: AtomicU64,
    next_object: AtomicU64,
    next_pid: AtomicU32,
    dos_devices: RwLock<Option<Vec<(String, String)>>>,
}

/// Simulated host bound to one process
///
/// Clones share the same process. `spawn_child` creates a new process that
/// inherits the inheritable handles under the same values, the way a native
/// child process does.
#[derive(Clone)]
pub struct SimulatedHost {
    world: Arc<World>,
    pid: Pid,
}

impl SimulatedHost {
    pub fn new() -> Self {
        let world = Arc::new(World {
            objects: DashMap::with_hasher(RandomState::new()),
            processes: DashMap::with_hasher(RandomState::new()),
            next_handle: AtomicU64::new(0x10),
            next_object: AtomicU64::new(1),
            next_pid: AtomicU32::new(FIRST_PID + 1),
            dos_devices: RwLock::new(Some(Vec::new())),
        });
        world.processes.insert(
            FIRST_PID,
            ProcessState {
                console: true,
                ..Default::default()
            },
        );
        info!("Simulated host initialized (pid {})", FIRST_PID);
        Self {
            world,
            pid: FIRST_PID,
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Create an object and a non-inheritable handle to it in this process
    pub fn open(&self, kind: ObjectKind, name: Option<&str>) -> NativeHandle {
        let object = self.world.next_object.fetch_add(1, Ordering::Relaxed);
        self.world.objects.insert(
            object,
            SimObject {
                kind,
                name: name.map_or(ObjectName::Unnamed, |n| ObjectName::Named(n.to_string())),
                position: 0,
                size: 0,
                ready: kind.default_readiness(),
                duplicable: true,
            },
        );
        let handle = self.next_handle();
        if let Some(mut process) = self.world.processes.get_mut(&self.pid) {
            process.handles.insert(
                handle,
                HandleEntry {
                    object,
                    inheritable: false,
                },
            );
        }
        debug!("pid {} opened {:?} object {} as {}", self.pid, kind, object, handle);
        handle
    }

    /// Start a child process that inherits this process's inheritable handles
    pub fn spawn_child(&self) -> SimulatedHost {
        let child = self.spawn_suspended();
        self.resume_child(&child);
        child
    }

    /// Create a child process that has not inherited any handles yet
    ///
    /// Handles can be pushed into it (see `duplicate_socket_for`) before
    /// [`SimulatedHost::resume_child`] hands over the inheritable ones.
    pub fn spawn_suspended(&self) -> SimulatedHost {
        let pid = self.world.next_pid.fetch_add(1, Ordering::Relaxed);
        let child = match self.world.processes.get(&self.pid) {
            Some(parent) => ProcessState {
                std: parent.std,
                console: parent.console,
                ..Default::default()
            },
            None => ProcessState::default(),
        };
        self.world.processes.insert(pid, child);
        debug!("Created suspended process {} from {}", pid, self.pid);
        Self {
            world: Arc::clone(&self.world),
            pid,
        }
    }

    /// Copy this process's inheritable handles into `child` under the same values
    pub fn resume_child(&self, child: &SimulatedHost) {
        let inherited: Vec<(NativeHandle, HandleEntry)> = match self.world.processes.get(&self.pid) {
            Some(parent) => parent
                .handles
                .iter()
                .filter(|(_, entry)| entry.inheritable)
                .map(|(handle, entry)| (*handle, *entry))
                .collect(),
            None => Vec::new(),
        };
        let count = inherited.len();
        if let Some(mut process) = self.world.processes.get_mut(&child.pid) {
            for (handle, entry) in inherited {
                process.handles.entry(handle).or_insert(entry);
            }
        }
        info!(
            "Started simulated process {} from {} ({} inherited handles)",
            child.pid, self.pid, count
        );
    }

    /// Object behind a handle of this process
    pub fn object_of(&self, handle: NativeHandle) -> Option<ObjectId> {
        self.entry(handle).ok().map(|e| e.object)
    }

    pub fn is_open(&self, handle: NativeHandle) -> bool {
        self.entry(handle).is_ok()
    }

    pub fn is_inheritable(&self, handle: NativeHandle) -> bool {
        self.entry(handle).map(|e| e.inheritable).unwrap_or(false)
    }

    /// Number of handles open in this process
    pub fn handle_count(&self) -> usize {
        self.world
            .processes
            .get(&self.pid)
            .map(|p| p.handles.len())
            .unwrap_or(0)
    }

    /// File pointer of the object behind a handle
    pub fn position(&self, handle: NativeHandle) -> Option<u64> {
        self.with_object(handle, |o| o.position).ok()
    }

    pub fn set_size(&self, handle: NativeHandle, size: u64) {
        let _ = self.with_object_mut(handle, |o| o.size = size);
    }

    pub fn set_ready(&self, handle: NativeHandle, readiness: Readiness, ready: bool) {
        let _ = self.with_object_mut(handle, |o| o.ready[readiness_index(readiness)] = ready);
    }

    /// Make duplication of the object behind a handle fail
    pub fn set_duplicable(&self, handle: NativeHandle, duplicable: bool) {
        let _ = self.with_object_mut(handle, |o| o.duplicable = duplicable);
    }

    pub fn set_object_name(&self, handle: NativeHandle, name: ObjectName) {
        let _ = self.with_object_mut(handle, |o| o.name = name);
    }

    /// Replace the drive-letter mapping list; `None` makes enumeration unavailable
    pub fn set_dos_devices(&self, mappings: Option<Vec<(&str, &str)>>) {
        *self.world.dos_devices.write() = mappings.map(|list| {
            list.into_iter()
                .map(|(name, target)| (name.to_string(), target.to_string()))
                .collect()
        });
    }

    pub fn set_console(&self, attached: bool) {
        if let Some(mut process) = self.world.processes.get_mut(&self.pid) {
            process.console = attached;
        }
    }

    pub fn set_impersonating(&self, impersonating: bool) {
        if let Some(mut process) = self.world.processes.get_mut(&self.pid) {
            process.impersonating = impersonating;
        }
    }

    /// How many times this process reverted its impersonation
    pub fn revert_count(&self) -> usize {
        self.world
            .processes
            .get(&self.pid)
            .map(|p| p.reverts)
            .unwrap_or(0)
    }

    fn next_handle(&self) -> NativeHandle {
        NativeHandle(self.world.next_handle.fetch_add(4, Ordering::Relaxed))
    }

    fn entry_in(&self, pid: Pid, handle: NativeHandle) -> HostResult<HandleEntry> {
        let process = self
            .world
            .processes
            .get(&pid)
            .ok_or(HostError::NoSuchProcess(pid))?;
        process
            .handles
            .get(&handle)
            .copied()
            .ok_or(HostError::InvalidHandle(handle.raw()))
    }

    fn entry(&self, handle: NativeHandle) -> HostResult<HandleEntry> {
        self.entry_in(self.pid, handle)
    }

    fn insert_in(&self, pid: Pid, object: ObjectId, inheritable: bool) -> HostResult<NativeHandle> {
        let handle = self.next_handle();
        let mut process = self
            .world
            .processes
            .get_mut(&pid)
            .ok_or(HostError::NoSuchProcess(pid))?;
        process.handles.insert(
            handle,
            HandleEntry {
                object,
                inheritable,
            },
        );
        Ok(handle)
    }

    fn close_in(&self, pid: Pid, handle: NativeHandle) -> HostResult<()> {
        let mut process = self
            .world
            .processes
            .get_mut(&pid)
            .ok_or(HostError::NoSuchProcess(pid))?;
        process
            .handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(HostError::InvalidHandle(handle.raw()))
    }

    fn with_object<R>(&self, handle: NativeHandle, f: impl FnOnce(&SimObject) -> R) -> HostResult<R> {
        let entry = self.entry(handle)?;
        let object = self
            .world
            .objects
            .get(&entry.object)
            .ok_or(HostError::InvalidHandle(handle.raw()))?;
        Ok(f(&object))
    }

    fn with_object_mut<R>(
        &self,
        handle: NativeHandle,
        f: impl FnOnce(&mut SimObject) -> R,
    ) -> HostResult<R> {
        let entry = self.entry(handle)?;
        let mut object = self
            .world
            .objects
            .get_mut(&entry.object)
            .ok_or(HostError::InvalidHandle(handle.raw()))?;
        Ok(f(&mut object))
    }

    fn duplicate_object(&self, entry: HandleEntry, handle: NativeHandle) -> HostResult<ObjectId> {
        let duplicable = self
            .world
            .objects
            .get(&entry.object)
            .map(|o| o.duplicable)
            .ok_or(HostError::InvalidHandle(handle.raw()))?;
        if !duplicable {
            return Err(HostError::AccessDenied(format!(
                "object behind {} cannot be duplicated",
                handle
            )));
        }
        Ok(entry.object)
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

fn readiness_index(readiness: Readiness) -> usize {
    match readiness {
        Readiness::Read => 0,
        Readiness::Write => 1,
        Readiness::Except => 2,
    }
}

impl Host for SimulatedHost {
    fn current_process(&self) -> Pid {
        self.pid
    }

    fn std_handle(&self, stream: StdStream) -> Option<NativeHandle> {
        self.world
            .processes
            .get(&self.pid)
            .and_then(|p| p.std[stream.fd() as usize])
    }

    fn set_std_handle(&self, stream: StdStream, handle: Option<NativeHandle>) {
        if let Some(mut process) = self.world.processes.get_mut(&self.pid) {
            process.std[stream.fd() as usize] = handle;
        }
    }

    fn file_type(&self, handle: NativeHandle) -> HostResult<NativeFileType> {
        self.with_object(handle, |o| match o.kind {
            ObjectKind::File => NativeFileType::Disk,
            ObjectKind::Pipe => NativeFileType::Pipe,
            ObjectKind::ConsoleInput
            | ObjectKind::ConsoleOutput
            | ObjectKind::Serial
            | ObjectKind::Device => NativeFileType::Char,
            ObjectKind::Socket => NativeFileType::Unknown,
        })
    }

    fn is_console_output(&self, handle: NativeHandle) -> bool {
        self.with_object(handle, |o| o.kind == ObjectKind::ConsoleOutput)
            .unwrap_or(false)
    }

    fn is_console_input(&self, handle: NativeHandle) -> bool {
        self.with_object(handle, |o| o.kind == ObjectKind::ConsoleInput)
            .unwrap_or(false)
    }

    fn is_connected_socket(&self, handle: NativeHandle) -> bool {
        self.with_object(handle, |o| o.kind == ObjectKind::Socket)
            .unwrap_or(false)
    }

    fn is_serial_port(&self, handle: NativeHandle) -> bool {
        self.with_object(handle, |o| o.kind == ObjectKind::Serial)
            .unwrap_or(false)
    }

    fn duplicate_handle(&self, handle: NativeHandle, inheritable: bool) -> HostResult<NativeHandle> {
        let entry = self.entry(handle)?;
        let object = self.duplicate_object(entry, handle)?;
        self.insert_in(self.pid, object, inheritable)
    }

    fn duplicate_from_process(
        &self,
        source: Pid,
        handle: NativeHandle,
        inheritable: bool,
    ) -> HostResult<NativeHandle> {
        let entry = self.entry_in(source, handle)?;
        let object = self.duplicate_object(entry, handle)?;
        self.insert_in(self.pid, object, inheritable)
    }

    fn duplicate_socket_for(&self, handle: NativeHandle, target: Pid) -> HostResult<NativeHandle> {
        let entry = self.entry(handle)?;
        let object = self.duplicate_object(entry, handle)?;
        self.insert_in(target, object, false)
    }

    fn set_inheritable(&self, handle: NativeHandle, inheritable: bool) -> HostResult<()> {
        let mut process = self
            .world
            .processes
            .get_mut(&self.pid)
            .ok_or(HostError::NoSuchProcess(self.pid))?;
        let entry = process
            .handles
            .get_mut(&handle)
            .ok_or(HostError::InvalidHandle(handle.raw()))?;
        entry.inheritable = inheritable;
        Ok(())
    }

    fn close_handle(&self, handle: NativeHandle) -> HostResult<()> {
        self.close_in(self.pid, handle)
    }

    fn close_remote_handle(&self, process: Pid, handle: NativeHandle) -> HostResult<()> {
        self.close_in(process, handle)
    }

    fn seek_to_end(&self, handle: NativeHandle) -> HostResult<u64> {
        self.with_object_mut(handle, |o| {
            o.position = o.size;
            o.position
        })
    }

    fn poll(&self, handle: NativeHandle, readiness: Readiness) -> bool {
        self.with_object(handle, |o| o.ready[readiness_index(readiness)])
            .unwrap_or(false)
    }

    fn has_console(&self) -> bool {
        self.world
            .processes
            .get(&self.pid)
            .map(|p| p.console)
            .unwrap_or(false)
    }

    fn free_console(&self) {
        info!("pid {} detached from its console", self.pid);
        self.set_console(false);
    }

    fn query_object_name(&self, handle: NativeHandle) -> HostResult<Option<String>> {
        match self.with_object(handle, |o| o.name.clone())? {
            ObjectName::Named(name) => Ok(Some(name)),
            ObjectName::Unnamed => Ok(None),
            ObjectName::Unqueryable => Err(HostError::NotSupported(format!(
                "object name query on {}",
                handle
            ))),
        }
    }

    fn dos_devices(&self) -> Option<Vec<String>> {
        self.world
            .dos_devices
            .read()
            .as_ref()
            .map(|list| list.iter().map(|(name, _)| name.clone()).collect())
    }

    fn dos_device_target(&self, name: &str) -> Option<String> {
        self.world.dos_devices.read().as_ref().and_then(|list| {
            list.iter()
                .find(|(dos, _)| dos.eq_ignore_ascii_case(name))
                .map(|(_, target)| target.clone())
        })
    }

    fn is_impersonating(&self) -> bool {
        self.world
            .processes
            .get(&self.pid)
            .map(|p| p.impersonating)
            .unwrap_or(false)
    }

    fn revert_to_self(&self) {
        if let Some(mut process) = self.world.processes.get_mut(&self.pid) {
            process.impersonating = false;
            process.reverts += 1;
        }
    }

    fn impersonate(&self) {
        self.set_impersonating(true);
    }
}
