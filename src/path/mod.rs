/*!
 * Path Resolution
 * Resolver contract and a mount-table implementation
 */

pub mod mount;
pub mod traits;

pub use mount::{Mount, MountTableResolver, CYGDRIVE_PREFIX};
pub use traits::*;
