//! Client-side model: Channel, Operation, and the per-kind operations
//! built on top of them (§3 Entities, §4.7, §4.8).

pub mod channel;
pub mod operation;
pub mod operations;
pub mod search;

pub use channel::{Channel, ChannelConnectionState};
pub use operation::{ExternalHandle, Operation, OperationCallbacks, OperationCore};
