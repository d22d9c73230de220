//! Session state machine and operation multiplexer built on top of
//! `pva-codec`'s framing.
//!
//! `client` holds the Channel/Operation model a library consumer (the
//! CLI tools, or any other caller) drives; `server` holds the mirror-image
//! per-connection channel table a server process drives. Both share the
//! identifier types, QoS flags, error kinds, transport state machine, send
//! queue, security plugin registries, and back-off timer defined at this
//! crate's root.

pub mod backoff;
pub mod client;
pub mod error;
pub mod ids;
pub mod monitor;
pub mod qos;
pub mod security;
pub mod send_queue;
pub mod server;
pub mod transport_state;

pub use error::Error;
