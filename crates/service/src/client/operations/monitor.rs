//! Monitor (§4.8, §4.9): streaming subscription built on `MonitorQueue`
//! and, when pipelining is enabled, `PipelineWindow`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::monitor::{BitSet, Element, MonitorQueue, PipelineWindow};
use crate::qos::{self, QosFlags};
use crate::Error;

#[derive(Debug, Clone, Copy)]
pub struct MonitorRequest {
    pub queue_size: usize,
    pub pipeline: bool,
    /// Acknowledgement granularity: every `ack_any`-th released element
    /// triggers a `GET_PUT` ack back to the server.
    pub ack_any: usize,
}

pub trait MonitorRequester: OperationCallbacks {
    /// Called once a new ready element is available to `poll`.
    fn monitor_event(&self);
    /// Server marked end-of-stream; the ready queue has been drained.
    fn unlisten(&self);
}

pub struct MonitorOperation {
    core: OperationCore,
    requester: Arc<dyn MonitorRequester>,
    request: MonitorRequest,
    queue: Mutex<Option<MonitorQueue<Vec<u8>>>>,
    window: Mutex<PipelineWindow>,
    released_since_ack: Mutex<usize>,
    running: std::sync::atomic::AtomicBool,
}

impl MonitorOperation {
    pub fn new(
        core: OperationCore,
        requester: Arc<dyn MonitorRequester>,
        request: MonitorRequest,
    ) -> Self {
        assert!(request.queue_size >= 2, "queueSize must be >= 2 (notify-only mode is out of scope)");
        Self {
            core,
            requester,
            request,
            queue: Mutex::new(None),
            window: Mutex::new(PipelineWindow::new()),
            released_since_ack: Mutex::new(0),
            running: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn init(&self) -> Result<(), Error> {
        self.core.start_request(QosFlags::new(qos::INIT))
    }

    pub fn on_init_reply(&self, status: Status, num_bits: usize) {
        self.core.stop_request();
        if status.is_ok() {
            self.core.mark_initialized();
            *self.queue.lock() = Some(MonitorQueue::new(
                self.request.queue_size,
                num_bits,
                Vec::new(),
            ));
            if self.request.pipeline {
                self.window.lock().open_initial(self.request.queue_size);
            }
        }
        self.requester.message(&status);
    }

    /// `PROCESS` qos bit starts/stops the subscription (§4.8 QoS table).
    pub fn start(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        self.core.start_request(QosFlags::new(qos::PROCESS))?;
        self.core.stop_request();
        Ok(())
    }

    pub fn stop(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        self.core.start_request(QosFlags::new(qos::DEFAULT))?;
        self.core.stop_request();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// A sample arrived from the server.
    pub fn on_update(&self, changed: BitSet, value: Vec<u8>) {
        if let Some(queue) = self.queue.lock().as_mut() {
            queue.arrival(changed, value);
        }
        if self.request.pipeline {
            self.window.lock().try_send();
        }
        self.requester.monitor_event();
    }

    pub fn poll(&self) -> Option<Element<Vec<u8>>> {
        self.queue.lock().as_mut().and_then(MonitorQueue::poll)
    }

    /// Returns a polled element and, if pipelining, accumulates released
    /// count toward the `ackAny` granularity, emitting a `GET_PUT` ack
    /// request when the threshold is hit (S6).
    pub fn release(&self, element: Element<Vec<u8>>) -> bool {
        if let Some(queue) = self.queue.lock().as_mut() {
            queue.release(element);
        }
        if !self.request.pipeline {
            return false;
        }
        let mut released = self.released_since_ack.lock();
        *released += 1;
        if *released >= self.request.ack_any.max(1) {
            let count = *released;
            *released = 0;
            self.window.lock().ack(count);
            true
        } else {
            false
        }
    }

    pub fn on_unlisten(&self) {
        self.requester.unlisten();
    }
}

impl Operation for MonitorOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn cancel(&self) {
        self.core.stop_request();
    }

    /// Reconnect preserves the IOID: re-sends INIT with the queue
    /// (still present, now empty) so the client sees no duplicate
    /// delivery (§4.8 Reconnect, S3).
    fn resubscribe(&self) {
        if self.core.is_initialized() {
            let _ = self.init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder;
    impl OperationCallbacks for Recorder {
        fn channel_disconnected(&self) {}
        fn message(&self, _status: &Status) {}
    }
    impl MonitorRequester for Recorder {
        fn monitor_event(&self) {}
        fn unlisten(&self) {}
    }

    fn monitor(request: MonitorRequest) -> MonitorOperation {
        let core = OperationCore::new(crate::ids::Ioid(9), std::sync::Weak::new(), || {});
        MonitorOperation::new(core, Arc::new(Recorder), request)
    }

    // S6 — queueSize=4, ackAny=2, pipeline=true: window fills to 4 then
    // stalls; releasing 2 elements reopens it by 2.
    #[test]
    fn pipeline_ack_reopens_window_at_threshold() {
        let op = monitor(MonitorRequest {
            queue_size: 4,
            pipeline: true,
            ack_any: 2,
        });
        op.init().unwrap();
        op.on_init_reply(Status::ok(), 1);
        for _ in 0..4 {
            op.on_update(BitSet::new(1), vec![1]);
        }
        assert!(op.window.lock().is_suspended());
        let e1 = op.poll().unwrap();
        assert!(!op.release(e1));
        let e2 = op.poll().unwrap();
        assert!(op.release(e2));
        assert_eq!(op.window.lock().open(), 2);
    }

    #[test]
    fn resubscribe_only_after_init_was_sent() {
        let op = monitor(MonitorRequest {
            queue_size: 2,
            pipeline: false,
            ack_any: 1,
        });
        op.resubscribe(); // no-op, never initialized
        assert!(!op.core().is_initialized());
    }
}
