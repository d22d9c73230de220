//! Monitor Pipeline (§4.9): the free/ready element queues, overrun-bit
//! compression, and the pipelining window used for ack-based flow control.

use std::collections::VecDeque;

/// A fixed-width set of changed-field flags. Field indices are whatever
/// the owning structure's flattened leaf order assigns; this type only
/// knows about bit positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; len.div_ceil(64).max(1)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn set(&mut self, index: usize) {
        assert!(index < self.len);
        self.words[index / 64] |= 1 << (index % 64);
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len);
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn clear(&mut self) {
        for word in &mut self.words {
            *word = 0;
        }
    }

    pub fn or_with(&mut self, other: &BitSet) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn and(&self, other: &BitSet) -> BitSet {
        let mut result = BitSet::new(self.len);
        for ((r, a), b) in result.words.iter_mut().zip(&self.words).zip(&other.words) {
            *r = a & b;
        }
        result
    }
}

/// One queue slot: a structure snapshot plus the bits that changed since
/// the previous sample delivered to the consumer, and the subset of those
/// that changed *more than once* while this element absorbed an overrun.
#[derive(Debug, Clone)]
pub struct Element<T> {
    pub changed: BitSet,
    pub overrun: BitSet,
    pub value: T,
}

/// Client-side monitor queue: `N` elements cycling between `free` and
/// `ready`, with overrun compression when updates arrive faster than the
/// consumer drains them.
///
/// While an overrun is being absorbed, this queue transiently holds `N+1`
/// elements (the `N` cycling between `free`/`ready`, plus the one being
/// merged into); `release` folds it back down to `N` by handing the
/// overrun element to `ready` and the just-released element to `free`, at
/// which point `len(free) + len(ready) == N` holds again (§8 property 2).
pub struct MonitorQueue<T> {
    num_bits: usize,
    free: VecDeque<Element<T>>,
    ready: VecDeque<Element<T>>,
    overrun: Option<Element<T>>,
}

impl<T: Clone> MonitorQueue<T> {
    /// `queue_size` must be `>= 2` (§4.9, §9: `queueSize == -1`
    /// "notify-only" mode is out of scope for this implementation).
    pub fn new(queue_size: usize, num_bits: usize, initial: T) -> Self {
        assert!(queue_size >= 2, "queueSize must be >= 2");
        let mut free = VecDeque::with_capacity(queue_size);
        for _ in 0..queue_size {
            free.push_back(Element {
                changed: BitSet::new(num_bits),
                overrun: BitSet::new(num_bits),
                value: initial.clone(),
            });
        }
        Self {
            num_bits,
            free,
            ready: VecDeque::new(),
            overrun: None,
        }
    }

    pub fn queue_size(&self) -> usize {
        self.free.len() + self.ready.len() + self.overrun.is_some() as usize
    }

    /// A new sample arrived from the server. Takes a free element if one
    /// is available; otherwise merges into (or starts) the pending
    /// overrun element, ORing `changed` into its bits and recording which
    /// fields changed more than once in `overrun`.
    pub fn arrival(&mut self, changed: BitSet, value: T) {
        if let Some(mut element) = self.free.pop_front() {
            element.changed = changed;
            element.overrun.clear();
            element.value = value;
            self.ready.push_back(element);
            return;
        }
        match &mut self.overrun {
            Some(existing) => {
                let repeated = existing.changed.and(&changed);
                existing.overrun.or_with(&repeated);
                existing.changed.or_with(&changed);
                existing.value = value;
            }
            None => {
                self.overrun = Some(Element {
                    changed,
                    overrun: BitSet::new(self.num_bits),
                    value,
                });
            }
        }
    }

    /// Removes and returns the next ready element, or `None` if the
    /// consumer has caught up. The caller must call `release` with it
    /// exactly once.
    pub fn poll(&mut self) -> Option<Element<T>> {
        self.ready.pop_front()
    }

    /// Returns a consumed element to `free`. If an overrun was pending,
    /// it is promoted into `ready` in the same call, so the consumer
    /// never needs to ask twice.
    pub fn release(&mut self, consumed: Element<T>) {
        match self.overrun.take() {
            Some(overrun) => {
                self.ready.push_front(overrun);
                self.free.push_back(consumed);
            }
            None => self.free.push_back(consumed),
        }
    }
}

/// Ack-based flow control window for a pipelined monitor (§4.9). The
/// sender keeps `open`; each element sent decrements it, each client
/// acknowledgement increments it by the number of elements the consumer
/// released.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineWindow {
    open: usize,
}

impl PipelineWindow {
    pub fn new() -> Self {
        Self { open: 0 }
    }

    pub fn open(&self) -> usize {
        self.open
    }

    pub fn is_suspended(&self) -> bool {
        self.open == 0
    }

    /// The first ack at INIT opens the window to the full queue size.
    pub fn open_initial(&mut self, queue_size: usize) {
        self.open = queue_size;
    }

    /// Attempts to send one element; returns whether the window allowed
    /// it.
    pub fn try_send(&mut self) -> bool {
        if self.open > 0 {
            self.open -= 1;
            true
        } else {
            false
        }
    }

    pub fn ack(&mut self, released: usize) {
        self.open += released;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S2 — Monitor with overrun: queue size 2, three updates (1, 2, 3)
    // arrive before the consumer polls.
    #[test]
    fn overrun_compresses_to_latest_value_with_both_bits_set() {
        let mut queue = MonitorQueue::new(2, 1, 0.0f64);
        let mut bits = || {
            let mut b = BitSet::new(1);
            b.set(0);
            b
        };
        queue.arrival(bits(), 1.0);
        queue.arrival(bits(), 2.0);
        queue.arrival(bits(), 3.0); // free empty after first two; this one overruns

        let first = queue.poll().unwrap();
        assert_eq!(first.value, 1.0);
        queue.release(first);

        let second = queue.poll().unwrap();
        assert_eq!(second.value, 3.0);
        assert!(second.changed.get(0));
        assert!(second.overrun.get(0));

        queue.release(second);
        assert!(queue.poll().is_none());
    }

    #[test]
    fn queue_size_invariant_holds_after_release() {
        let mut queue = MonitorQueue::new(2, 1, 0i32);
        let mut bits = BitSet::new(1);
        bits.set(0);
        queue.arrival(bits.clone(), 1);
        queue.arrival(bits.clone(), 2);
        queue.arrival(bits, 3);
        let element = queue.poll().unwrap();
        queue.release(element);
        assert_eq!(queue.queue_size(), 2);
    }

    #[test]
    #[should_panic(expected = "queueSize must be >= 2")]
    fn rejects_queue_size_below_two() {
        MonitorQueue::new(1, 1, 0i32);
    }

    // S6 — Pipeline ack: queueSize=4, window fills then stalls; two
    // releases reopen it by two.
    #[test]
    fn window_reopens_by_acked_count() {
        let mut window = PipelineWindow::new();
        window.open_initial(4);
        for _ in 0..4 {
            assert!(window.try_send());
        }
        assert!(!window.try_send());
        assert!(window.is_suspended());
        window.ack(2);
        assert!(window.try_send());
        assert!(window.try_send());
        assert!(!window.try_send());
    }
}
