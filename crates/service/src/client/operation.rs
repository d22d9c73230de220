//! Operation (§3 Entities, §4.7, §4.8): the state shared by every
//! operation kind (Get/Put/PutGet/RPC/Array/Monitor) — IOID, weak back
//! reference to its channel, the single-outstanding-request rule, and the
//! external-handle-drop-triggers-destroy ownership pattern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::client::channel::Channel;
use crate::ids::Ioid;
use crate::qos::{self, QosFlags};
use crate::Error;

/// A status delivered to a user callback: success or a `kind` plus a
/// human message (§7 policy: every callback receives a status with kind +
/// message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub success: bool,
    pub kind: Option<Error>,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            success: true,
            kind: None,
            message: String::new(),
        }
    }

    pub fn error(kind: Error, message: impl Into<String>) -> Self {
        Self {
            success: false,
            kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }
}

/// Per-kind user callbacks. Each operation kind's requester trait
/// (`GetRequester`, `MonitorRequester`, …) extends this with its own
/// completion hooks; this is the subset every kind shares.
pub trait OperationCallbacks: Send + Sync {
    fn channel_disconnected(&self);
    fn message(&self, status: &Status);
}

/// Shared state + lifecycle for one outstanding operation.
pub struct OperationCore {
    ioid: Ioid,
    channel: Weak<Channel>,
    pending: parking_lot::Mutex<Option<QosFlags>>,
    initialized: AtomicBool,
    destroyed: AtomicBool,
    send_destroy_request: Box<dyn Fn() + Send + Sync>,
}

impl OperationCore {
    pub fn new(
        ioid: Ioid,
        channel: Weak<Channel>,
        send_destroy_request: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            ioid,
            channel,
            pending: parking_lot::Mutex::new(None),
            initialized: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            send_destroy_request: Box::new(send_destroy_request),
        }
    }

    pub fn ioid(&self) -> Ioid {
        self.ioid
    }

    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn require_initialized(&self) -> Result<(), Error> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Records `qos` as the in-flight request, or rejects with
    /// `OtherRequestPending` if one is already outstanding. Pure destroy
    /// and pure cancel always bypass this rule (§4.8).
    pub fn start_request(&self, qos: QosFlags) -> Result<(), Error> {
        if qos::is_pure_destroy_or_cancel(qos) {
            return Ok(());
        }
        let mut pending = self.pending.lock();
        if pending.is_some() {
            return Err(Error::OtherRequestPending);
        }
        *pending = Some(qos);
        Ok(())
    }

    pub fn stop_request(&self) {
        *self.pending.lock() = None;
    }

    pub fn has_pending_request(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Tears the operation down: idempotent (§4.7, §8 property 5 — at
    /// most one `DESTROY_REQUEST` frame regardless of how many times
    /// `destroy` is called), unregisters from the channel's request table
    /// before emitting the control packet (§3 invariant 1).
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channel) = self.channel.upgrade() {
            channel.unregister_request(self.ioid);
        }
        (self.send_destroy_request)();
    }
}

/// The subset of behavior every operation kind exposes uniformly.
pub trait Operation: Send + Sync {
    fn core(&self) -> &OperationCore;

    fn cancel(&self);

    fn resubscribe(&self);
}

/// Owning handle returned to the caller. Dropping the last clone tears the
/// operation down deterministically (§3 Ownership).
pub struct ExternalHandle<O: Operation> {
    inner: Option<Arc<O>>,
}

impl<O: Operation> ExternalHandle<O> {
    pub fn new(inner: Arc<O>) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn get(&self) -> &Arc<O> {
        self.inner.as_ref().expect("handle used after drop")
    }
}

impl<O: Operation> Drop for ExternalHandle<O> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.core().destroy();
        }
    }
}
