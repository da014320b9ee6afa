/*!
 * Handlers
 * Polymorphic wrappers bound to descriptors, dispatched by device class
 */

#[allow(clippy::module_inception)]
mod handler;
pub mod flags;
pub mod kind;
pub mod select;

pub use flags::OpenFlags;
pub use handler::Handler;
pub use kind::HandlerKind;
pub use select::SelectRecord;
