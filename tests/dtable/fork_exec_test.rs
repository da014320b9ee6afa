/*!
 * Fork and Exec Tests
 * Inheritance preparation in the parent and fixups in the child image
 */

use crate::support::{io_handle, open_device, open_file, table};
use posix_dtable::{DtableError, Host, ObjectKind, SimulatedHost, StdStream};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn test_before_exec_makes_survivors_inheritable() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let kept = open_file(&table, &host, 3, "/home/kept");
    let dropped = open_file(&table, &host, 4, "/home/dropped");
    table.set_close_on_exec(4, true).unwrap();
    assert!(!host.is_inheritable(kept));

    table.fixup_before_exec(host.pid() + 1).unwrap();
    assert!(host.is_inheritable(kept));
    assert!(!host.is_inheritable(dropped));
}

#[test]
fn test_exec_image_drops_close_on_exec() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let kept = open_file(&table, &host, 3, "/home/kept");
    open_file(&table, &host, 4, "/home/dropped");
    table.set_close_on_exec(4, true).unwrap();
    let id = table.handler_id(3);

    let child = host.spawn_suspended();
    table.fixup_before_exec(child.pid()).unwrap();
    host.resume_child(&child);
    let image = table.fork_image(Arc::new(child.clone()));
    image.fixup_after_exec(host.pid()).unwrap();

    assert!(!image.is_open(4));
    assert!(image.is_open(3));
    assert_eq!(image.handler_id(3), id);
    assert_eq!(io_handle(&image, 3), kept);
    assert!(child.is_open(kept));
    assert_eq!(image.first_fd_for_open(), 0);

    // The parent's table is untouched
    assert!(table.is_open(4));
}

#[test]
fn test_exec_image_skips_std_bootstrap() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 0, "/dev/pipe", ObjectKind::Pipe);

    let child = host.spawn_child();
    let image = table.fork_image(Arc::new(child));
    image.stdio_init().unwrap();
    assert_eq!(image.snapshot().open_fds(), vec![0]);
}

#[test]
fn test_exec_rebinds_std_slots() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let out = open_device(&table, &host, 1, "/dev/pipew", ObjectKind::Pipe);

    let child = host.spawn_suspended();
    table.fixup_before_exec(child.pid()).unwrap();
    host.resume_child(&child);
    let image = table.fork_image(Arc::new(child.clone()));
    image.fixup_after_exec(host.pid()).unwrap();

    assert_eq!(child.std_handle(StdStream::Output), Some(out));
}

#[test]
fn test_socket_handed_to_forked_child() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let socket = open_device(&table, &host, 5, "/dev/socket", ObjectKind::Socket);
    assert_eq!(table.need_fixup_before(), 1);

    let child = host.spawn_suspended();
    table.fixup_before_fork(child.pid()).unwrap();
    let prepared = table.with_handler(5, |h| h.prepared_handle()).unwrap().unwrap();
    host.resume_child(&child);

    let image = table.fork_image(Arc::new(child.clone()));
    image.fixup_after_fork(host.pid()).unwrap();

    assert_eq!(io_handle(&image, 5), prepared);
    assert!(child.is_open(prepared));
    assert!(!child.is_open(socket));
    assert_eq!(child.object_of(prepared), host.object_of(socket));
}

#[test]
fn test_prepared_socket_moves_to_child_image() {
    let host = SimulatedHost::new();
    let table = table(&host);
    open_device(&table, &host, 5, "/dev/socket", ObjectKind::Socket);

    let abandoned = host.spawn_suspended();
    table.fixup_before_fork(abandoned.pid()).unwrap();
    let stale = table.with_handler(5, |h| h.prepared_handle()).unwrap().unwrap();

    let child = host.spawn_suspended();
    table.fixup_before_fork(child.pid()).unwrap();
    assert!(!abandoned.is_open(stale));
    let prepared = table.with_handler(5, |h| h.prepared_handle()).unwrap().unwrap();

    host.resume_child(&child);
    let image = table.fork_image(Arc::new(child.clone()));
    assert_eq!(table.with_handler(5, |h| h.prepared_handle()).unwrap(), None);

    image.fixup_after_fork(host.pid()).unwrap();
    assert_eq!(io_handle(&image, 5), prepared);
    assert!(child.is_open(prepared));
}

#[test]
fn test_fork_refreshes_close_on_exec_handles() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let private = open_file(&table, &host, 6, "/home/private");
    table.set_close_on_exec(6, true).unwrap();

    let child = host.spawn_suspended();
    table.fixup_before_fork(child.pid()).unwrap();
    host.resume_child(&child);
    assert!(!child.is_open(private));

    let image = table.fork_image(Arc::new(child.clone()));
    image.fixup_after_fork(host.pid()).unwrap();

    let copy = io_handle(&image, 6);
    assert!(child.is_open(copy));
    assert!(!child.is_inheritable(copy));
    assert_eq!(child.object_of(copy), host.object_of(private));
    assert!(image.close_on_exec(6).unwrap());
}

#[test]
fn test_fork_fixup_reports_first_failure_and_continues() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let gone = open_device(&table, &host, 0, "/dev/conout", ObjectKind::ConsoleOutput);
    let private = open_file(&table, &host, 1, "/home/private");
    table.set_close_on_exec(1, true).unwrap();

    let child = host.spawn_child();
    // The parent closes the console handle before the child could copy it
    host.close_handle(gone).unwrap();

    let image = table.fork_image(Arc::new(child.clone()));
    let result = image.fixup_after_fork(host.pid());

    assert!(matches!(result, Err(DtableError::Host(_))));
    let copy = io_handle(&image, 1);
    assert_ne!(copy, private);
    assert!(child.is_open(copy));
}

#[test]
fn test_file_pointers_moved_for_append() {
    let host = SimulatedHost::new();
    let table = table(&host);
    let log = host.open(ObjectKind::File, None);
    host.set_size(log, 4096);
    table
        .attach_handle_to_fd("/var/log/app.log", 3, log, None, posix_dtable::OpenFlags::append_only())
        .unwrap();
    let plain = open_file(&table, &host, 4, "/home/plain");
    host.set_size(plain, 100);

    table.set_file_pointers_for_exec().unwrap();
    assert_eq!(host.position(log), Some(4096));
    assert_eq!(host.position(plain), Some(0));
}
