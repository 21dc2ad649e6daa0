//! Queue of published posts waiting for the next notification digest.

mod inspector;
mod models;
mod store;

pub use inspector::{DisplayFormat, QueueInspector};
pub use models::{QueueItem, QueueStatus, STATUS_META_KEY};
pub use store::{QueueError, QueueStore};
