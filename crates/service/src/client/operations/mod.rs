//! Per-kind operations built on top of `OperationCore` (§4.8).

pub mod array;
pub mod get;
pub mod monitor;
pub mod put;
pub mod putget;
pub mod rpc;

pub use get::{GetOperation, GetRequester};
pub use monitor::{MonitorOperation, MonitorRequester};
pub use put::{PutOperation, PutRequester};
pub use putget::{PutGetOperation, PutGetRequester};
pub use rpc::{RpcOperation, RpcRequester};
pub use array::{ArrayOperation, ArrayRequester};
