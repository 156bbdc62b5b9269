//! Built-in phase handlers.

mod command;
mod images;
mod noop;
mod resources;

pub use command::{CommandHandler, CommandSpec};
pub use images::{ImageSet, ImagesHandler};
pub use noop::NoopHandler;
pub use resources::{ResourceSet, ResourcesHandler};
