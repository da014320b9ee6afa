/*!
 * Host
 * Native OS services consumed by the descriptor table
 */

pub mod simulation;
pub mod traits;
pub mod types;

pub use simulation::{ObjectKind, ObjectName, SimulatedHost, FIRST_PID};
pub use traits::{Host, ImpersonationSuspended};
pub use types::*;
