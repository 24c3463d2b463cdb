//! Bounded hand-off queue between the playback thread and the device callback.
//!
//! The producer blocks while the queue is full, so the rate at which the
//! device drains samples is the rate at which the playback loop runs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Why a blocking push gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The queue was closed by its owner.
    Closed,
    /// The device reported an error.
    Failed(String),
    /// The device stopped consuming samples.
    Stalled,
}

struct Inner {
    samples: VecDeque<f32>,
    closed: bool,
    failure: Option<String>,
}

/// Bounded queue of interleaved `f32` samples.
pub struct SampleQueue {
    inner: Mutex<Inner>,
    changed: Condvar,
    capacity: usize,
}

impl SampleQueue {
    /// Create a queue holding at most `capacity` samples (not frames).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                samples: VecDeque::with_capacity(capacity),
                closed: false,
                failure: None,
            }),
            changed: Condvar::new(),
            capacity,
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered samples (best-effort snapshot).
    pub fn len(&self) -> usize {
        self.inner.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push all of `samples`, blocking while the queue is full.
    ///
    /// Gives up with [`PushError::Stalled`] if no space frees up for
    /// `stall_timeout`.
    pub fn push_blocking(&self, samples: &[f32], stall_timeout: Duration) -> Result<(), PushError> {
        let mut offset = 0;

        while offset < samples.len() {
            let mut guard = self.inner.lock();

            loop {
                if let Some(reason) = &guard.failure {
                    return Err(PushError::Failed(reason.clone()));
                }
                if guard.closed {
                    return Err(PushError::Closed);
                }
                if guard.samples.len() < self.capacity {
                    break;
                }
                if self
                    .changed
                    .wait_for(&mut guard, stall_timeout)
                    .timed_out()
                    && guard.samples.len() >= self.capacity
                {
                    return Err(PushError::Stalled);
                }
            }

            let room = self.capacity - guard.samples.len();
            let take = room.min(samples.len() - offset);
            guard
                .samples
                .extend(samples[offset..offset + take].iter().copied());
            offset += take;
        }

        Ok(())
    }

    /// Move up to `out.len()` samples into `out`; returns how many were moved.
    ///
    /// Never blocks beyond the queue lock. Called from the device callback.
    pub fn pop_into(&self, out: &mut [f32]) -> usize {
        let mut guard = self.inner.lock();
        let count = out.len().min(guard.samples.len());
        for (slot, sample) in out.iter_mut().zip(guard.samples.drain(..count)) {
            *slot = sample;
        }
        drop(guard);

        if count > 0 {
            self.changed.notify_all();
        }
        count
    }

    /// Record a device failure and wake any blocked producer.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut guard = self.inner.lock();
        if guard.failure.is_none() {
            guard.failure = Some(reason.into());
        }
        drop(guard);
        self.changed.notify_all();
    }

    /// Refuse further pushes and wake any blocked producer. Idempotent.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.changed.notify_all();
    }

    /// Wait until the consumer has drained everything, up to `timeout`.
    ///
    /// Returns `true` if the queue emptied in time.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock();
        while !guard.samples.is_empty() && guard.failure.is_none() {
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return guard.samples.is_empty();
            }
        }
        guard.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Arc;

    const STALL: Duration = Duration::from_secs(2);

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_push_and_pop() {
        let queue = SampleQueue::new(8);
        queue.push_blocking(&[1.0, 2.0, 3.0], STALL).unwrap();
        assert_eq!(queue.len(), 3);

        let mut out = [0.0f32; 5];
        assert_eq!(queue.pop_into(&mut out), 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_blocks_until_consumer_drains() {
        let queue = Arc::new(SampleQueue::new(4));
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut out = [0.0f32; 2];
                let mut total = 0;
                while total < 16 {
                    total += queue.pop_into(&mut out);
                    std::thread::sleep(Duration::from_millis(1));
                }
                total
            })
        };

        queue.push_blocking(&[0.5; 16], STALL).unwrap();
        assert_eq!(consumer.join().unwrap(), 16);
    }

    #[test]
    fn test_full_queue_without_consumer_stalls() {
        let queue = SampleQueue::new(2);
        let err = queue
            .push_blocking(&[0.0; 4], Duration::from_millis(20))
            .unwrap_err();
        assert_eq!(err, PushError::Stalled);
    }

    #[test]
    fn test_failure_wakes_blocked_producer() {
        let queue = Arc::new(SampleQueue::new(2));
        let failer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                queue.fail("device unplugged");
            })
        };

        let err = queue.push_blocking(&[0.0; 8], STALL).unwrap_err();
        assert_eq!(err, PushError::Failed("device unplugged".to_string()));
        failer.join().unwrap();
    }

    #[test]
    fn test_closed_queue_rejects_pushes() {
        let queue = SampleQueue::new(4);
        queue.close();
        queue.close();
        assert_eq!(queue.push_blocking(&[0.0], STALL), Err(PushError::Closed));
    }

    #[test]
    fn test_wait_drained() {
        let queue = SampleQueue::new(4);
        assert!(queue.wait_drained(Duration::from_millis(1)));

        queue.push_blocking(&[0.0; 2], STALL).unwrap();
        assert!(!queue.wait_drained(Duration::from_millis(10)));

        let mut out = [0.0f32; 2];
        queue.pop_into(&mut out);
        assert!(queue.wait_drained(Duration::from_millis(1)));
    }
}
