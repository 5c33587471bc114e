//! Counting admission control for in-flight frames.
//!
//! A bounded channel is pre-filled with one token per frame slot. Acquiring
//! takes a token (blocking when none are left), and dropping the returned
//! [`SlotPermit`] puts the token back. Because tokens name their slot, a
//! slot is only handed out again after its own frame completed, even when
//! completions arrive out of order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

const PUMP_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Counters {
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

/// Bounds the number of frames queued to the GPU at the same time.
#[derive(Debug)]
pub struct FrameAdmission {
    capacity: usize,
    tokens: Receiver<usize>,
    returns: Sender<usize>,
    counters: Arc<Counters>,
}

impl FrameAdmission {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (returns, tokens) = bounded(capacity);
        for slot in 0..capacity {
            returns
                .send(slot)
                .expect("admission channel sized for every slot");
        }
        Self {
            capacity,
            tokens,
            returns,
            counters: Arc::new(Counters {
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    /// Largest number of permits ever held at once.
    pub fn high_water(&self) -> usize {
        self.counters.high_water.load(Ordering::Acquire)
    }

    /// Blocks until a slot is free.
    ///
    /// Only suitable when completions are signalled from another thread.
    pub fn acquire(&self) -> SlotPermit {
        let slot = self
            .tokens
            .recv()
            .expect("admission channel cannot disconnect while it owns a sender");
        self.grant(slot)
    }

    pub fn try_acquire(&self) -> Option<SlotPermit> {
        self.tokens.try_recv().ok().map(|slot| self.grant(slot))
    }

    pub fn acquire_timeout(&self, timeout: Duration) -> Option<SlotPermit> {
        match self.tokens.recv_timeout(timeout) {
            Ok(slot) => Some(self.grant(slot)),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Blocks until a slot is free, calling `pump` between waits.
    ///
    /// GPU completion callbacks only fire while someone polls the device, so
    /// the producer drives that polling itself while it waits.
    pub fn acquire_pumped(&self, mut pump: impl FnMut()) -> SlotPermit {
        loop {
            if let Some(permit) = self.try_acquire() {
                return permit;
            }
            pump();
            if let Some(permit) = self.acquire_timeout(PUMP_INTERVAL) {
                return permit;
            }
        }
    }

    fn grant(&self, slot: usize) -> SlotPermit {
        let held = self.counters.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(held <= self.capacity, "admission exceeded capacity");
        self.counters.high_water.fetch_max(held, Ordering::AcqRel);
        SlotPermit {
            slot,
            returns: self.returns.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

/// Ownership of one frame slot; returns it to the pool on drop.
#[derive(Debug)]
#[must_use = "dropping a permit releases its slot immediately"]
pub struct SlotPermit {
    slot: usize,
    returns: Sender<usize>,
    counters: Arc<Counters>,
}

impl SlotPermit {
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the slot to the pool. Same as dropping the permit.
    pub fn release(self) {}
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        // The pool holds exactly one token per slot, so this never blocks.
        let _ = self.returns.try_send(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;

    #[test]
    fn hands_out_each_slot_once() {
        let admission = FrameAdmission::new(3);
        let permits: Vec<_> = (0..3).map(|_| admission.acquire()).collect();
        let slots: HashSet<_> = permits.iter().map(SlotPermit::slot).collect();
        assert_eq!(slots, HashSet::from([0, 1, 2]));
        assert!(admission.try_acquire().is_none());
        assert_eq!(admission.in_flight(), 3);
    }

    #[test]
    fn release_returns_the_same_slot() {
        let admission = FrameAdmission::new(2);
        let first = admission.acquire();
        let second = admission.acquire();
        let freed = second.slot();
        second.release();
        let again = admission.try_acquire().expect("slot freed");
        assert_eq!(again.slot(), freed);
        drop(first);
        assert_eq!(admission.in_flight(), 1);
    }

    #[test]
    fn acquire_blocks_until_release() {
        let admission = FrameAdmission::new(1);
        let held = admission.acquire();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(held);
        });
        let permit = admission.acquire();
        assert_eq!(permit.slot(), 0);
        releaser.join().unwrap();
    }

    #[test]
    fn timeout_gives_up_when_full() {
        let admission = FrameAdmission::new(1);
        let _held = admission.acquire();
        assert!(admission
            .acquire_timeout(Duration::from_millis(5))
            .is_none());
    }

    #[test]
    fn pump_runs_while_waiting() {
        let admission = FrameAdmission::new(1);
        let mut parked = Some(admission.acquire());
        let mut pumps = 0;
        let permit = admission.acquire_pumped(|| {
            pumps += 1;
            parked.take();
        });
        assert_eq!(permit.slot(), 0);
        assert_eq!(pumps, 1);
    }

    #[test]
    fn out_of_order_completion_never_exceeds_capacity() {
        let admission = FrameAdmission::new(3);
        let mut outstanding: Vec<SlotPermit> = Vec::new();
        for frame in 0..200usize {
            if outstanding.len() == 3 {
                // Retire the middle frame first, then the newest, then the oldest.
                let index = [1, 2, 0][frame % 3].min(outstanding.len() - 1);
                outstanding.remove(index);
            }
            let permit = admission.try_acquire().expect("a slot is free");
            assert!(outstanding.iter().all(|held| held.slot() != permit.slot()));
            outstanding.push(permit);
            assert!(admission.in_flight() <= 3);
        }
        assert_eq!(admission.high_water(), 3);
    }

    #[test]
    fn concurrent_completions_respect_bound() {
        let admission = FrameAdmission::new(2);
        let mut workers = Vec::new();
        for _ in 0..50 {
            let permit = admission.acquire();
            assert!(admission.in_flight() <= 2);
            workers.push(thread::spawn(move || {
                thread::sleep(Duration::from_micros(200));
                drop(permit);
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(admission.in_flight(), 0);
        assert!(admission.high_water() <= 2);
    }
}
