/*!
 * Test Support
 * Table and host fixtures shared by the descriptor table tests
 */

#![allow(dead_code)]

use posix_dtable::{
    Dtable, DtableConfig, Fd, MountTableResolver, NativeHandle, ObjectKind, SimulatedHost,
};
use std::sync::Arc;

pub const ROOT: &str = "C:\\cygwin";

pub fn resolver() -> Arc<MountTableResolver> {
    Arc::new(MountTableResolver::with_root(ROOT))
}

/// Table with the default 32-slot layout
pub fn table(host: &SimulatedHost) -> Dtable {
    Dtable::new(Arc::new(host.clone()), resolver(), DtableConfig::default()).unwrap()
}

/// Table that starts with 4 slots and grows by 4 up to `max`
pub fn compact_table(host: &SimulatedHost, max: usize) -> Dtable {
    Dtable::new(Arc::new(host.clone()), resolver(), DtableConfig::compact(max)).unwrap()
}

/// Open a disk file at `fd` backed by a fresh native handle
pub fn open_file(table: &Dtable, host: &SimulatedHost, fd: Fd, path: &str) -> NativeHandle {
    let handle = host.open(ObjectKind::File, None);
    table.build_from_name(fd, path, Some(handle)).unwrap();
    handle
}

/// Open a handle of `kind` at `fd` under the given `/dev` path
pub fn open_device(table: &Dtable, host: &SimulatedHost, fd: Fd, path: &str, kind: ObjectKind) -> NativeHandle {
    let handle = host.open(kind, None);
    table.build_from_name(fd, path, Some(handle)).unwrap();
    handle
}

pub fn io_handle(table: &Dtable, fd: Fd) -> NativeHandle {
    table.with_handler(fd, |h| h.io_handle()).unwrap().unwrap()
}
