/*!
 * Standard Stream Tests
 * Bootstrap of descriptors 0 to 2 from inherited host handles
 */

use crate::support::{io_handle, resolver};
use posix_dtable::host::ObjectName;
use posix_dtable::{
    Ctty, Device, Dtable, DtableConfig, HandlerKind, Host, ObjectKind, SimulatedHost, StdStream,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn table_with(host: &SimulatedHost, config: DtableConfig) -> Dtable {
    Dtable::new(Arc::new(host.clone()), resolver(), config).unwrap()
}

fn set_std(host: &SimulatedHost, kinds: [Option<ObjectKind>; 3]) -> [Option<posix_dtable::NativeHandle>; 3] {
    let mut handles = [None; 3];
    for (stream, kind) in StdStream::ALL.into_iter().zip(kinds) {
        let handle = kind.map(|kind| host.open(kind, None));
        host.set_std_handle(stream, handle);
        handles[stream.fd() as usize] = handle;
    }
    handles
}

#[test]
fn test_console_and_pipes() {
    let host = SimulatedHost::new();
    set_std(
        &host,
        [
            Some(ObjectKind::ConsoleInput),
            Some(ObjectKind::Pipe),
            Some(ObjectKind::Pipe),
        ],
    );
    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    let snapshot = table.snapshot();
    assert_eq!(snapshot.open_fds(), vec![0, 1, 2]);
    assert_eq!(snapshot.get(0).unwrap().kind, HandlerKind::Console);
    assert_eq!(snapshot.get(1).unwrap().device, Device::PIPEW);
    assert_eq!(snapshot.get(2).unwrap().device, Device::PIPEW);
    assert_eq!(table.console_fds(), 1);
    assert_eq!(table.ctty(), Ctty::Console);
    assert!(snapshot.get(0).unwrap().flags.binary);
}

#[test]
fn test_pipe_on_stdin_is_read_end() {
    let host = SimulatedHost::new();
    set_std(&host, [Some(ObjectKind::Pipe), None, None]);
    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    assert_eq!(table.snapshot().get(0).unwrap().device, Device::PIPER);
    assert_eq!(table.snapshot().open_fds(), vec![0]);
}

#[test]
fn test_shared_stdout_and_stderr_split() {
    let host = SimulatedHost::new();
    let out = host.open(ObjectKind::ConsoleOutput, None);
    host.set_std_handle(StdStream::Output, Some(out));
    host.set_std_handle(StdStream::Error, Some(out));

    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    let err = io_handle(&table, 2);
    assert_eq!(io_handle(&table, 1), out);
    assert_ne!(err, out);
    assert_eq!(host.object_of(err), host.object_of(out));
    assert_eq!(host.std_handle(StdStream::Error), Some(err));
}

#[test]
fn test_tty_mode_console() {
    let host = SimulatedHost::new();
    set_std(&host, [None, Some(ObjectKind::ConsoleOutput), None]);
    let config = DtableConfig {
        use_tty: true,
        ..Default::default()
    };
    let table = table_with(&host, config);
    table.set_ctty(Ctty::Tty(0));
    table.stdio_init().unwrap();

    let info = table.snapshot().get(1).cloned().unwrap();
    assert_eq!(info.kind, HandlerKind::TtySlave);
    assert_eq!(info.posix_name.as_deref(), Some("/dev/tty"));
}

#[test]
fn test_socket_and_serial() {
    let host = SimulatedHost::new();
    set_std(
        &host,
        [Some(ObjectKind::Socket), Some(ObjectKind::Serial), None],
    );
    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    let snapshot = table.snapshot();
    assert_eq!(snapshot.get(0).unwrap().kind, HandlerKind::Socket);
    assert_eq!(snapshot.get(1).unwrap().kind, HandlerKind::Serial);
    assert_eq!(snapshot.get(1).unwrap().posix_name.as_deref(), Some("/dev/ttyS0"));
    assert_eq!(table.need_fixup_before(), 1);
}

#[test]
fn test_named_disk_file() {
    let host = SimulatedHost::new();
    host.set_dos_devices(Some(vec![("C:", "\\Device\\HarddiskVolume1")]));
    let file = host.open(ObjectKind::File, Some("\\Device\\HarddiskVolume1\\cygwin\\tmp\\in.txt"));
    host.set_std_handle(StdStream::Input, Some(file));

    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    let info = table.snapshot().get(0).cloned().unwrap();
    assert_eq!(info.kind, HandlerKind::DiskFile);
    assert_eq!(info.posix_name.as_deref(), Some("/tmp/in.txt"));
    assert_eq!(info.io_handle, Some(file));
    assert!(info.flags.binary);
}

#[test]
fn test_unqueryable_file_gets_placeholder_in_text_mode() {
    let host = SimulatedHost::new();
    let file = host.open(ObjectKind::File, None);
    host.set_object_name(file, ObjectName::Unqueryable);
    host.set_std_handle(StdStream::Output, Some(file));

    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    let info = table.snapshot().get(1).cloned().unwrap();
    assert_eq!(info.posix_name.as_deref(), Some("/some disk file"));
    assert!(!info.flags.binary);
}

#[test]
fn test_missing_and_invalid_handles_leave_slots_empty() {
    let host = SimulatedHost::new();
    let unnamed = host.open(ObjectKind::File, None);
    host.set_std_handle(StdStream::Input, Some(unnamed));
    host.set_std_handle(StdStream::Output, Some(posix_dtable::NativeHandle(0xbad0)));
    host.set_console(false);

    let table = table_with(&host, DtableConfig::default());
    table.stdio_init().unwrap();

    assert!(table.snapshot().descriptors.is_empty());
    assert_eq!(table.ctty(), Ctty::None);
}

#[test]
fn test_open_descriptor_not_replaced() {
    let host = SimulatedHost::new();
    set_std(&host, [Some(ObjectKind::Pipe), None, None]);
    let table = table_with(&host, DtableConfig::default());
    table.build_from_classification(0, Device::NULL, None, None).unwrap();
    table.set_first_fd_for_open(9);

    table.stdio_init().unwrap();
    assert_eq!(table.snapshot().get(0).unwrap().kind, HandlerKind::Null);
    assert_eq!(table.first_fd_for_open(), 0);
}
