//! Send Queue + Sender (§4.3): a FIFO of closures the write side drains
//! until it empties or the socket blocks.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::Error;

/// What a `Sender` accomplished when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The sender finished emitting everything it had.
    Done,
    /// The socket signalled it would block; the writer must suspend and
    /// retry this sender (or its continuation) once write-ready fires.
    Blocked,
}

/// One queued unit of write work: given the send buffer/control handle
/// `T`, emit zero or more messages.
pub type Sender<T> = Box<dyn FnOnce(&mut T) -> Result<SendOutcome, Error> + Send>;

enum Item<T> {
    Sender(Sender<T>),
    /// Sentinel used to unwind the drain loop on shutdown without the
    /// caller having to special-case an empty queue vs. "please stop".
    Break,
}

/// Two flush strategies (§4.3): `Immediate` flushes the socket at every
/// `end_message`; `Delayed` flushes only when the buffer fills or the
/// queue drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStrategy {
    Immediate,
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainResult {
    /// The queue emptied; everything queued has been flushed.
    Drained,
    /// The socket blocked; resume draining once write-ready fires.
    Blocked,
    /// A `Break` sentinel or a `ConnectionClosed` sender error was hit.
    Closed,
}

pub struct SendQueue<T> {
    items: Mutex<VecDeque<Item<T>>>,
    flush: FlushStrategy,
}

impl<T> SendQueue<T> {
    pub fn new(flush: FlushStrategy) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            flush,
        }
    }

    pub fn flush_strategy(&self) -> FlushStrategy {
        self.flush
    }

    /// Enqueues a sender. Safe to call re-entrantly from inside a sender
    /// currently being drained, since the lock is not held across a
    /// sender invocation.
    pub fn push(&self, sender: Sender<T>) {
        self.items.lock().push_back(Item::Sender(sender));
    }

    /// Enqueues the shutdown sentinel.
    pub fn push_break(&self) {
        self.items.lock().push_back(Item::Break);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Pops and runs senders against `ctx` until the queue empties, a
    /// sender reports `Blocked`, or `Break`/`ConnectionClosed` is hit.
    pub fn drain(&self, ctx: &mut T) -> Result<DrainResult, Error> {
        loop {
            let item = self.items.lock().pop_front();
            let Some(item) = item else {
                return Ok(DrainResult::Drained);
            };
            match item {
                Item::Break => return Ok(DrainResult::Closed),
                Item::Sender(sender) => match sender(ctx) {
                    Ok(SendOutcome::Done) => continue,
                    Ok(SendOutcome::Blocked) => return Ok(DrainResult::Blocked),
                    Err(Error::ConnectionClosed) => return Ok(DrainResult::Closed),
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// Drops everything still queued, invoking `on_dropped` once per
    /// discarded sender (§4.3: senders still queued at close are dropped
    /// with an error callback).
    pub fn close(&self, mut on_dropped: impl FnMut()) {
        let mut items = self.items.lock();
        for item in items.drain(..) {
            if matches!(item, Item::Sender(_)) {
                on_dropped();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_senders_in_fifo_order() {
        let queue: SendQueue<Vec<i32>> = SendQueue::new(FlushStrategy::Immediate);
        queue.push(Box::new(|ctx: &mut Vec<i32>| {
            ctx.push(1);
            Ok(SendOutcome::Done)
        }));
        queue.push(Box::new(|ctx: &mut Vec<i32>| {
            ctx.push(2);
            Ok(SendOutcome::Done)
        }));
        let mut ctx = Vec::new();
        assert_eq!(queue.drain(&mut ctx).unwrap(), DrainResult::Drained);
        assert_eq!(ctx, vec![1, 2]);
    }

    #[test]
    fn reentrant_push_from_inside_a_sender_is_observed() {
        let queue: SendQueue<Vec<i32>> = SendQueue::new(FlushStrategy::Immediate);
        let queue = std::sync::Arc::new(queue);
        let inner = queue.clone();
        queue.push(Box::new(move |ctx: &mut Vec<i32>| {
            ctx.push(1);
            inner.push(Box::new(|ctx: &mut Vec<i32>| {
                ctx.push(2);
                Ok(SendOutcome::Done)
            }));
            Ok(SendOutcome::Done)
        }));
        let mut ctx = Vec::new();
        assert_eq!(queue.drain(&mut ctx).unwrap(), DrainResult::Drained);
        assert_eq!(ctx, vec![1, 2]);
    }

    #[test]
    fn blocked_sender_suspends_drain_leaving_rest_queued() {
        let queue: SendQueue<Vec<i32>> = SendQueue::new(FlushStrategy::Immediate);
        queue.push(Box::new(|_: &mut Vec<i32>| Ok(SendOutcome::Blocked)));
        queue.push(Box::new(|ctx: &mut Vec<i32>| {
            ctx.push(2);
            Ok(SendOutcome::Done)
        }));
        let mut ctx = Vec::new();
        assert_eq!(queue.drain(&mut ctx).unwrap(), DrainResult::Blocked);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn close_notifies_once_per_dropped_sender() {
        let queue: SendQueue<()> = SendQueue::new(FlushStrategy::Delayed);
        queue.push(Box::new(|_: &mut ()| Ok(SendOutcome::Done)));
        queue.push(Box::new(|_: &mut ()| Ok(SendOutcome::Done)));
        let mut dropped = 0;
        queue.close(|| dropped += 1);
        assert_eq!(dropped, 2);
    }
}
