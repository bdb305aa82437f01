//! A bounded, lock-free single-consumer mailbox.
//!
//! Mirrors the producer/consumer split used for per-core inboxes
//! elsewhere in this workspace: a fixed-capacity [`crossbeam_queue::ArrayQueue`]
//! gives `try_push`/`try_pop` without a mutex, and a blocking receive is
//! built on top by spin-yielding until something lands. Capacity is the
//! only back-pressure knob — there is no unbounded fallback queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_queue::ArrayQueue;

/// Outcome of a non-blocking push.
pub enum PushOutcome<T> {
    Delivered,
    Full(T),
}

pub struct Mailbox<T> {
    queue: ArrayQueue<T>,
    closed: AtomicBool,
}

impl<T> Mailbox<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn try_push(&self, value: T) -> PushOutcome<T> {
        match self.queue.push(value) {
            Ok(()) => PushOutcome::Delivered,
            Err(value) => PushOutcome::Full(value),
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Blocks the calling thread until a value is available or the
    /// mailbox is closed.
    pub fn recv_blocking(&self) -> Option<T> {
        let mut backoff = Duration::from_micros(5);
        loop {
            if let Some(value) = self.queue.pop() {
                return Some(value);
            }
            if self.closed.load(Ordering::Acquire) {
                return self.queue.pop();
            }
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(Duration::from_millis(2));
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_round_trips() {
        let mailbox: Mailbox<u32> = Mailbox::new(2);
        assert!(matches!(mailbox.try_push(1), PushOutcome::Delivered));
        assert_eq!(mailbox.try_pop(), Some(1));
    }

    #[test]
    fn push_reports_full_at_capacity() {
        let mailbox: Mailbox<u32> = Mailbox::new(1);
        assert!(matches!(mailbox.try_push(1), PushOutcome::Delivered));
        match mailbox.try_push(2) {
            PushOutcome::Full(value) => assert_eq!(value, 2),
            PushOutcome::Delivered => panic!("expected the mailbox to report full"),
        }
    }

    #[test]
    fn recv_blocking_wakes_once_a_value_lands() {
        use std::sync::Arc;
        use std::thread;

        let mailbox: Arc<Mailbox<u32>> = Arc::new(Mailbox::new(4));
        let producer = Arc::clone(&mailbox);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.try_push(7);
        });
        assert_eq!(mailbox.recv_blocking(), Some(7));
        handle.join().unwrap();
    }

    #[test]
    fn recv_blocking_returns_none_after_close_when_empty() {
        let mailbox: Mailbox<u32> = Mailbox::new(1);
        mailbox.close();
        assert_eq!(mailbox.recv_blocking(), None);
    }
}
