/*!
 * Table Tests
 * Growth, reuse search, factory registration and release accounting
 */

use crate::support::{compact_table, io_handle, open_device, open_file, table};
use posix_dtable::{
    Built, Ctty, Device, DtableError, HandlerKind, Host, ObjectKind, SimulatedHost, UNREGISTERED,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;

#[test]
fn test_new_table_is_empty() {
    let host = SimulatedHost::new();
    let table = table(&host);
    assert_eq!(table.size(), 32);
    assert!(table.snapshot().descriptors.is_empty());
    assert_eq!(table.find_unused(0).unwrap(), 0);
}

#[test]
fn test_find_unused_skips_open_descriptors() {
    let host = SimulatedHost::new();
    let table = table(&host);
    for fd in 0..3 {
        table.build_from_classification(fd, Device::NULL, None, None).unwrap();
    }
    assert_eq!(table.find_unused(0).unwrap(), 3);
    assert_eq!(table.find_unused(1).unwrap(), 3);
    assert_eq!(table.find_unused(7).unwrap(), 7);
}

#[test]
fn test_build_beyond_capacity_grows() {
    let host = SimulatedHost::new();
    let table = compact_table(&host, 64);
    assert_eq!(table.size(), 4);

    let built = table.build_from_classification(10, Device::ZERO, None, None).unwrap();
    assert!(matches!(built, Built::Registered(_)));
    assert!(table.size() >= 11);
    assert!(table.is_open(10));
    assert_eq!(table.handler_id(10), Some(built.id()));
}

#[test]
fn test_negative_descriptor_rejected() {
    let host = SimulatedHost::new();
    let table = table(&host);
    assert!(matches!(
        table.build_from_classification(-2, Device::NULL, None, None),
        Err(DtableError::BadDescriptor(-2))
    ));
    assert!(matches!(table.close(-1), Err(DtableError::BadDescriptor(-1))));
}

#[test]
fn test_unregistered_build_leaves_table_alone() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let built = table
        .build_from_classification(UNREGISTERED, Device::CONSOLE, None, None)
        .unwrap();

    match built {
        Built::Unregistered(handler) => {
            assert_eq!(handler.kind(), HandlerKind::Console);
            assert_eq!(handler.native_name(), Some("CON"));
        }
        Built::Registered(_) => panic!("expected an unregistered handler"),
    }
    assert_eq!(table.console_fds(), 0);
    assert!(table.snapshot().descriptors.is_empty());
}

#[test]
fn test_registering_over_open_descriptor_releases_occupant() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let handle = open_file(&table, &host, 3, "/home/a.txt");

    table.build_from_classification(3, Device::NULL, None, None).unwrap();

    assert!(host.is_open(handle));
    let kind = table.with_handler(3, |h| h.kind()).unwrap();
    assert_eq!(kind, HandlerKind::Null);
}

#[test]
fn test_build_from_name_classifies_paths() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 0, "/home/user/notes.txt");
    table.build_from_name(1, "/dev/null", None).unwrap();
    table.build_from_name(2, "/proc/self", None).unwrap();
    table.build_from_name(3, "/dev/ttyS1", None).unwrap();

    let snapshot = table.snapshot();
    let file = snapshot.get(0).unwrap();
    assert_eq!(file.kind, HandlerKind::DiskFile);
    assert_eq!(file.posix_name.as_deref(), Some("/home/user/notes.txt"));
    assert_eq!(file.native_name.as_deref(), Some("C:\\cygwin\\home\\user\\notes.txt"));
    assert!(file.flags.read && file.flags.write && file.flags.binary);

    assert_eq!(snapshot.get(1).unwrap().kind, HandlerKind::Null);
    assert_eq!(snapshot.get(2).unwrap().kind, HandlerKind::Process);
    let serial = snapshot.get(3).unwrap();
    assert_eq!(serial.kind, HandlerKind::Serial);
    assert_eq!(serial.native_name.as_deref(), Some("\\\\.\\COM2"));
}

#[test]
fn test_build_from_unknown_device_name_fails() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let result = table.build_from_name(0, "/dev/nonesuch", None);
    assert!(matches!(result, Err(DtableError::Path(_))));
    assert!(!table.is_open(0));
}

#[test]
fn test_tty_alias_follows_controlling_terminal() {
    let host = SimulatedHost::new();
    let table = table(&host);

    table.build_from_name(0, "/dev/tty", None).unwrap();
    assert_eq!(table.with_handler(0, |h| h.kind()).unwrap(), HandlerKind::Console);

    table.set_ctty(Ctty::Tty(2));
    table.build_from_name(1, "/dev/tty", None).unwrap();
    let device = table.with_handler(1, |h| h.device()).unwrap();
    assert_eq!(device, Device::tty_slave(2));
}

#[test]
fn test_attach_handle_picks_first_free() {
    let host = SimulatedHost::new();
    let table = table(&host);
    table.build_from_classification(0, Device::NULL, None, None).unwrap();
    let handle = host.open(ObjectKind::File, None);

    let fd = table
        .attach_handle_to_fd("/var/log/app.log", UNREGISTERED, handle, Some(false), posix_dtable::OpenFlags::append_only())
        .unwrap();

    assert_eq!(fd, 1);
    assert_eq!(io_handle(&table, 1), handle);
    let flags = table.with_handler(1, |h| h.flags()).unwrap();
    assert!(flags.append && flags.write && !flags.binary);
}

#[test]
fn test_close_closes_native_handle() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let handle = open_file(&table, &host, 3, "/tmp/x");

    table.close(3).unwrap();
    assert!(!host.is_open(handle));
    assert!(!table.is_open(3));
    assert!(matches!(table.close(3), Err(DtableError::BadDescriptor(3))));
}

#[test]
fn test_release_keeps_native_handle() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let handle = open_file(&table, &host, 3, "/tmp/x");

    table.release(3);
    table.release(3);
    table.release(-4);
    assert!(!table.is_open(3));
    assert!(host.is_open(handle));
}

#[test]
fn test_extend_is_bounded() {
    let host = SimulatedHost::new();
    let table = compact_table(&host, 8);

    assert!(!table.extend(0).unwrap());
    assert!(table.extend(4).unwrap());
    assert_eq!(table.size(), 8);
    assert!(matches!(
        table.extend(1),
        Err(DtableError::NoSpace { requested: 9, limit: 8 })
    ));
    assert_eq!(table.size(), 8);
}

#[test]
fn test_full_table_reports_no_space() {
    let host = SimulatedHost::new();
    let table = compact_table(&host, 4);
    for fd in 0..4 {
        table.build_from_classification(fd, Device::ZERO, None, None).unwrap();
    }
    assert!(matches!(table.find_unused(0), Err(DtableError::NoSpace { .. })));
    assert_eq!(table.size(), 4);
}

#[test]
fn test_console_freed_with_last_console_descriptor() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 0, "/dev/conin", ObjectKind::ConsoleInput);
    open_device(&table, &host, 1, "/dev/conout", ObjectKind::ConsoleOutput);
    assert_eq!(table.console_fds(), 2);

    table.close(0).unwrap();
    assert!(host.has_console());
    table.close(1).unwrap();
    assert_eq!(table.console_fds(), 0);
    assert!(!host.has_console());
}

#[test]
fn test_console_kept_when_it_is_the_ctty() {
    let host = SimulatedHost::new();
    let table = table(&host);
    table.set_ctty(Ctty::Console);
    open_device(&table, &host, 0, "/dev/console", ObjectKind::ConsoleOutput);

    table.close(0).unwrap();
    assert!(host.has_console());
}

#[test]
fn test_socket_counted_for_fixup() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 4, "/dev/socket", ObjectKind::Socket);
    assert_eq!(table.need_fixup_before(), 1);

    table.close(4).unwrap();
    assert_eq!(table.need_fixup_before(), 0);
}

#[test]
fn test_close_on_exec_tracks_inheritability() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let handle = open_file(&table, &host, 5, "/tmp/coe");

    table.set_close_on_exec(5, false).unwrap();
    assert!(host.is_inheritable(handle));
    table.set_close_on_exec(5, true).unwrap();
    assert!(!host.is_inheritable(handle));
    assert!(table.close_on_exec(5).unwrap());
    assert!(matches!(
        table.set_close_on_exec(6, true),
        Err(DtableError::BadDescriptor(6))
    ));
}

#[test]
fn test_close_all_files() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let a = open_file(&table, &host, 0, "/a");
    let b = open_file(&table, &host, 9, "/b");

    assert_eq!(table.close_all_files(), 2);
    assert!(!host.is_open(a));
    assert!(!host.is_open(b));
    assert!(table.snapshot().descriptors.is_empty());
}

#[test]
fn test_snapshot_serializes() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 0, "/etc/passwd");

    let json = serde_json::to_value(table.snapshot()).unwrap();
    assert_eq!(json["capacity"], 32);
    assert_eq!(json["descriptors"][0]["kind"], "disk_file");
    assert_eq!(json["descriptors"][0]["posix_name"], "/etc/passwd");
}

proptest! {
    #[test]
    fn prop_capacity_never_shrinks_and_open_set_matches(ops in proptest::collection::vec((any::<bool>(), 0i32..40), 1..60)) {
        let host = SimulatedHost::new();
        let table = compact_table(&host, 64);
        let mut model = BTreeSet::new();
        let mut capacity = table.size();

        for (open, fd) in ops {
            if open {
                table.build_from_classification(fd, Device::NULL, None, None).unwrap();
                model.insert(fd);
            } else {
                let closed = table.close(fd);
                prop_assert_eq!(closed.is_ok(), model.remove(&fd));
            }
            prop_assert!(table.size() >= capacity);
            capacity = table.size();
        }

        let open: BTreeSet<_> = table.snapshot().open_fds().into_iter().collect();
        prop_assert_eq!(open, model);
    }
}
