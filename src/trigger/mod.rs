//! Manual runs of the notification job and the admin-action guards around them.

mod controller;
pub mod nonce;
mod notice;

pub use controller::{AdminGate, AuthError, Caller, ManualTrigger};
pub use nonce::{load_or_create_secret, NonceError, NonceIssuer, ACTION_FORCE_RUN, ACTION_QUEUE_REMOVE};
pub use notice::{NoticeFlag, NoticeStore, DEFAULT_NOTICE_TTL};
