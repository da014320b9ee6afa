/*!
 * Devices
 * Classification of the device kinds a descriptor can refer to
 */

pub mod types;

pub use types::*;
