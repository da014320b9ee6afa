/*!
 * POSIX Descriptor Table Library
 * Descriptor table, handlers and process-transition fixups over a native host
 */

pub mod core;
pub mod device;
pub mod dtable;
pub mod handler;
pub mod host;
pub mod monitoring;
pub mod path;

// Re-exports
pub use crate::core::{
    Ctty, DtableConfig, DtableError, DtableResult, Fd, HandlerId, NativeHandle, Pid, SerializableError,
    StdStream, UNREGISTERED,
};
pub use device::Device;
pub use dtable::{handle_to_name, Built, DescriptorInfo, Dtable, TableSnapshot};
pub use handler::{Handler, HandlerKind, OpenFlags, SelectRecord};
pub use host::{Host, HostError, ObjectKind, ObjectName, Readiness, SimulatedHost};
pub use monitoring::{init_tracing, span_operation};
pub use path::{Mount, MountTableResolver, PathError, PathResolver, ResolveOptions, ResolvedPath};
