//! Bounded blocking queue
//!
//! One mutex guards the items and the end flag; two condition variables wake
//! producers (`not_full`) and consumers (`not_empty`).
//!
//! ```text
//!  producer ──push──▶ [ a | b | c | _ | _ ] ──pop──▶ consumers (N threads)
//!              waits on not_full        waits on not_empty
//! ```
//!
//! A consumer's `pop` returns `None` only once the queue is empty **and**
//! finished, so every queued item is handed out before consumers exit.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    finished: bool,
}

/// Fixed-capacity multi-producer multi-consumer queue with an end flag
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                finished: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue, blocking while full. Hands the item back if the queue is finished.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        while state.items.len() >= self.capacity && !state.finished {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.finished {
            return Err(item);
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue, blocking while empty. `None` once empty and finished.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        while state.items.is_empty() && !state.finished {
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Mark the end of input; consumers drain what is left, then stop
    pub fn finish(&self) {
        self.lock().finished = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Finish and drop everything still queued
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.finished = true;
            state.items.clear();
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Clear the end flag so the queue can serve another run
    pub fn rearm(&self) {
        let mut state = self.lock();
        state.items.clear();
        state.finished = false;
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
