/*!
 * Duplication Tests
 * dup and dup2 semantics over owned native handles
 */

use crate::support::{compact_table, io_handle, open_device, open_file, table};
use posix_dtable::{DtableError, Host, ObjectKind, SimulatedHost, StdStream};
use pretty_assertions::assert_eq;

#[test]
fn test_dup_takes_lowest_free_descriptor() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let original = open_file(&table, &host, 0, "/home/a.txt");
    open_file(&table, &host, 1, "/home/b.txt");

    let fd = table.dup(0).unwrap();
    assert_eq!(fd, 2);
    assert_ne!(table.handler_id(0), table.handler_id(2));

    let copy = io_handle(&table, 2);
    assert_ne!(copy, original);
    assert_eq!(host.object_of(copy), host.object_of(original));
    let name = table.with_handler(2, |h| h.posix_name().map(str::to_owned)).unwrap();
    assert_eq!(name.as_deref(), Some("/home/a.txt"));
}

#[test]
fn test_dup_clears_close_on_exec() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 0, "/home/a.txt");
    table.set_close_on_exec(0, true).unwrap();

    let fd = table.dup(0).unwrap();
    assert!(!table.close_on_exec(fd).unwrap());
    assert!(table.close_on_exec(0).unwrap());
}

#[test]
fn test_dup_starts_at_first_fd_for_open() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 0, "/home/a.txt");
    table.set_first_fd_for_open(5);

    assert_eq!(table.dup(0).unwrap(), 5);
}

#[test]
fn test_dup_bad_descriptor() {
    let host = SimulatedHost::new();
    let table = table(&host);
    assert!(matches!(table.dup(7), Err(DtableError::BadDescriptor(7))));
}

#[test]
fn test_dup_on_full_table_leaks_nothing() {
    let host = SimulatedHost::new();
    let table = compact_table(&host, 4);
    for fd in 0..4 {
        open_file(&table, &host, fd, "/home/a.txt");
    }
    let handles = host.handle_count();

    assert!(matches!(table.dup(0), Err(DtableError::NoSpace { limit: 4, .. })));
    assert_eq!(host.handle_count(), handles);
    assert_eq!(table.snapshot().open_fds(), vec![0, 1, 2, 3]);
}

#[test]
fn test_dup2_onto_itself() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 1, "/home/a.txt");
    let id = table.handler_id(1);

    assert_eq!(table.dup2(1, 1).unwrap(), 1);
    assert_eq!(table.handler_id(1), id);
}

#[test]
fn test_dup2_rejects_bad_descriptors() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_file(&table, &host, 0, "/home/a.txt");

    assert!(matches!(table.dup2(3, 4), Err(DtableError::BadDescriptor(3))));
    assert!(matches!(table.dup2(0, -1), Err(DtableError::BadDescriptor(-1))));
}

#[test]
fn test_dup2_closes_previous_target() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let source = open_file(&table, &host, 0, "/home/a.txt");
    let target = open_file(&table, &host, 3, "/home/b.txt");

    assert_eq!(table.dup2(0, 3).unwrap(), 3);
    assert!(!host.is_open(target));
    assert_eq!(host.object_of(io_handle(&table, 3)), host.object_of(source));
}

#[test]
fn test_dup2_past_limit_leaks_nothing() {
    let host = SimulatedHost::new();
    let table = compact_table(&host, 16);
    open_file(&table, &host, 0, "/home/a.txt");
    let handles = host.handle_count();

    assert!(matches!(table.dup2(0, 40), Err(DtableError::BadDescriptor(40))));
    assert_eq!(host.handle_count(), handles);
    assert!(table.size() <= 16);
}

#[test]
fn test_dup2_failure_keeps_target() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let source = open_file(&table, &host, 0, "/home/a.txt");
    let target = open_file(&table, &host, 3, "/home/b.txt");
    let id = table.handler_id(3);
    host.set_duplicable(source, false);

    assert!(matches!(
        table.dup2(0, 3),
        Err(DtableError::DuplicationFailed { fd: 0, .. })
    ));
    assert_eq!(table.handler_id(3), id);
    assert!(host.is_open(target));
}

#[test]
fn test_dup2_rebinds_std_slot() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 5, "/dev/pipe", ObjectKind::Pipe);

    table.dup2(5, 1).unwrap();
    assert_eq!(host.std_handle(StdStream::Output), Some(io_handle(&table, 1)));
}

#[test]
fn test_dup2_counts_console_once_per_descriptor() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 0, "/dev/conout", ObjectKind::ConsoleOutput);

    table.dup2(0, 2).unwrap();
    assert_eq!(table.console_fds(), 2);
    table.dup2(0, 2).unwrap();
    assert_eq!(table.console_fds(), 2);
}
