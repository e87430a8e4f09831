//! Lock-free hand-off of coefficient sets from the control path to readers
//!
//! Each reader owns a single-slot mailbox. `publish` replaces whatever the
//! reader has not yet picked up, so readers always converge on the newest
//! set. Sets a reader lets go of are sent back through a return queue and
//! dropped on the publishing thread, never on the reader's thread.

use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use super::design::CoefficientSet;

/// Shared-ownership handle to a published coefficient set
pub type SharedCoefficients = Arc<CoefficientSet>;

/// Capacity of each reader's return queue.
/// A reader can retire at most one set per publish and the queue is
/// drained on every publish.
const RETIRE_CAPACITY: usize = 8;

struct Mailbox {
    slot: Sender<SharedCoefficients>,
    evict: Receiver<SharedCoefficients>,
    retired: Receiver<SharedCoefficients>,
}

impl Mailbox {
    /// Free sets the reader has handed back; false once the reader is gone
    fn collect_retired(&self) -> bool {
        loop {
            match self.retired.try_recv() {
                Ok(set) => drop(set),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn deliver(&self, set: &SharedCoefficients) {
        let mut pending = Arc::clone(set);
        loop {
            match self.slot.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // Reader hasn't picked up the previous set; supersede it.
                    let _ = self.evict.try_recv();
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

struct PublisherState {
    latest: SharedCoefficients,
    mailboxes: Vec<Mailbox>,
    generation: u64,
}

/// Control-side end of the coefficient exchange
///
/// Cloning yields another handle to the same exchange. All locking happens
/// here, on the control path; readers never touch the mutex.
#[derive(Clone)]
pub struct CoefficientPublisher {
    state: Arc<Mutex<PublisherState>>,
}

impl CoefficientPublisher {
    pub fn new(initial: CoefficientSet) -> Self {
        Self {
            state: Arc::new(Mutex::new(PublisherState {
                latest: Arc::new(initial),
                mailboxes: Vec::new(),
                generation: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make a fully built set visible to every reader
    ///
    /// Concurrent callers are serialized; the last store wins.
    pub fn publish(&self, set: CoefficientSet) {
        let set = Arc::new(set);
        let mut state = self.lock();

        state.mailboxes.retain(Mailbox::collect_retired);
        for mailbox in &state.mailboxes {
            mailbox.deliver(&set);
        }

        // The superseded set is released here, on the control thread.
        state.latest = set;
        state.generation += 1;
    }

    /// Register a new reader, primed with the latest published set
    pub fn subscribe(&self) -> CoefficientReader {
        let (slot_tx, slot_rx) = bounded(1);
        let (retire_tx, retire_rx) = bounded(RETIRE_CAPACITY);

        let mut state = self.lock();
        state.mailboxes.push(Mailbox {
            slot: slot_tx,
            evict: slot_rx.clone(),
            retired: retire_rx,
        });

        CoefficientReader {
            current: Arc::clone(&state.latest),
            slot: slot_rx,
            retire: retire_tx,
        }
    }

    /// Latest published set, as seen from the control path
    pub fn latest(&self) -> SharedCoefficients {
        Arc::clone(&self.lock().latest)
    }

    /// Number of publishes since construction
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Number of live readers (as of the last publish)
    pub fn reader_count(&self) -> usize {
        self.lock().mailboxes.len()
    }
}

/// Reader end of the coefficient exchange
///
/// `current` never blocks, allocates or frees: picking up a new set is a
/// lock-free channel pop, and the replaced set is pushed onto the return
/// queue for the publisher to drop.
pub struct CoefficientReader {
    current: SharedCoefficients,
    slot: Receiver<SharedCoefficients>,
    retire: Sender<SharedCoefficients>,
}

impl CoefficientReader {
    /// Newest set published so far
    pub fn current(&mut self) -> &SharedCoefficients {
        while let Ok(next) = self.slot.try_recv() {
            let previous = std::mem::replace(&mut self.current, next);
            // Only fails if the publisher is gone, in which case the set is
            // dropped in place.
            let _ = self.retire.try_send(previous);
        }
        &self.current
    }

    /// Set picked up by the most recent `current` call, without polling
    pub fn last_seen(&self) -> &SharedCoefficients {
        &self.current
    }

    /// Whether a newer set is waiting to be picked up
    pub fn has_update(&self) -> bool {
        !self.slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn constant_set(value: f64, len: usize) -> CoefficientSet {
        CoefficientSet::from_taps(vec![value; len]).unwrap()
    }

    #[test]
    fn test_reader_starts_with_initial_set() {
        let publisher = CoefficientPublisher::new(constant_set(0.5, 3));
        let mut reader = publisher.subscribe();
        assert_eq!(reader.current().taps(), &[0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_publish_round_trip() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 5));
        let mut reader = publisher.subscribe();

        let set = CoefficientSet::from_taps(vec![0.1, 0.2, 0.4, 0.2, 0.1]).unwrap();
        publisher.publish(set.clone());

        assert_eq!(**reader.current(), set);
        // Unchanged until the next publish
        assert_eq!(**reader.current(), set);
        assert_eq!(*publisher.latest(), set);
        assert_eq!(publisher.generation(), 1);
    }

    #[test]
    fn test_last_publish_wins() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 3));
        let mut reader = publisher.subscribe();

        publisher.publish(constant_set(1.0, 3));
        publisher.publish(constant_set(2.0, 3));
        publisher.publish(constant_set(3.0, 3));

        assert!(reader.has_update());
        assert_eq!(reader.current().taps(), &[3.0, 3.0, 3.0]);
        assert!(!reader.has_update());
    }

    #[test]
    fn test_every_reader_sees_publish() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 3));
        let mut a = publisher.subscribe();
        let mut b = publisher.subscribe();

        publisher.publish(constant_set(7.0, 3));

        assert_eq!(a.current().taps()[0], 7.0);
        assert_eq!(b.current().taps()[0], 7.0);
    }

    #[test]
    fn test_superseded_set_released_by_publisher() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 3));
        let mut reader = publisher.subscribe();

        publisher.publish(constant_set(1.0, 3));
        let first = Arc::downgrade(reader.current());

        publisher.publish(constant_set(2.0, 3));
        reader.current();

        // The reader handed the old set back instead of freeing it.
        assert!(first.upgrade().is_some());

        publisher.publish(constant_set(3.0, 3));
        assert!(first.upgrade().is_none());
    }

    #[test]
    fn test_dropped_reader_is_pruned() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 3));
        let reader = publisher.subscribe();
        let _kept = publisher.subscribe();
        assert_eq!(publisher.reader_count(), 2);

        drop(reader);
        publisher.publish(constant_set(1.0, 3));
        assert_eq!(publisher.reader_count(), 1);
    }

    #[test]
    fn test_reader_never_observes_torn_set() {
        let publisher = CoefficientPublisher::new(constant_set(0.0, 65));
        let mut reader = publisher.subscribe();
        let done = Arc::new(AtomicBool::new(false));

        let reader_done = Arc::clone(&done);
        let handle = thread::spawn(move || {
            let mut observed = 0.0;
            while !reader_done.load(Ordering::Acquire) {
                let set = reader.current();
                let first = set.taps()[0];
                assert!(set.taps().iter().all(|&t| t == first), "torn set observed");
                assert!(first >= observed, "went backwards: {} < {}", first, observed);
                observed = first;
            }
            reader.current().taps()[0]
        });

        for k in 1..=2000 {
            publisher.publish(constant_set(k as f64, 65));
        }
        done.store(true, Ordering::Release);

        let last = handle.join().unwrap();
        assert_eq!(last, 2000.0);
    }
}
