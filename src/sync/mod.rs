//! Client-side state of an open conversation: the message log, the live
//! subscription, the rendered rows and the inbox.

pub mod inbox;
pub mod log;
pub mod subscriber;
pub mod synchronizer;
pub mod view;

pub use synchronizer::{ConversationSync, SyncEvent, SyncOptions};
