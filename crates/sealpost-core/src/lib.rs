//! Sealpost: registration, login and end-to-end encrypted messaging on
//! top of the storage and crypto crates.
//!
//! Hosts construct a [`Messenger`] around a shared
//! [`StorageEngine`](sealpost_storage::engine::StorageEngine) and call
//! its five operations: `create_user`, `get_user`, `login`,
//! `send_message` and `get_messages`. Reading message contents requires
//! a [`Session`] opened with the receiver's credentials.

pub mod clock;
pub mod messenger;
pub mod outgoing;
pub mod session;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use messenger::Messenger;
pub use session::Session;
