//! FIFO work queue shared between a producer and one polling worker

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Mutex-guarded FIFO that can be closed to new insertions
pub struct WorkQueue<T> {
    name: &'static str,
    items: Mutex<VecDeque<T>>,
    closed: AtomicBool,
}

impl<T> WorkQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Append at the tail; refused once the queue is closed
    pub fn push(&self, item: T) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ShuttingDown(format!("{} queue is closed", self.name)));
        }
        self.items.lock().unwrap().push_back(item);
        Ok(())
    }

    /// Remove the head. The lock is released before this returns.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().unwrap().pop_front()
    }

    /// Refuse further insertions. Queued items stay poppable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
