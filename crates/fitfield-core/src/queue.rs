use std::cell::RefCell;
use std::collections::VecDeque;

/// Single-threaded deferred task queue.
///
/// Everything here runs on the UI event-processing thread. A task posted
/// while the host is dispatching an event runs after that dispatch completes;
/// the host drains the queue once per event-loop turn. Tasks posted from
/// inside a draining task are held for the *next* turn, so a deferred state
/// flip never observes the toolkit mid-teardown.
pub struct UiQueue {
    tasks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl UiQueue {
    pub fn new() -> Self {
        Self {
            tasks: RefCell::new(VecDeque::new()),
        }
    }

    /// Enqueue a task to run after the current event dispatch completes.
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
        log::trace!("UiQueue: task posted ({} queued)", self.tasks.borrow().len());
    }

    /// Run every task that was queued before this call. Returns the number of
    /// tasks run.
    pub fn drain(&self) -> usize {
        // Swap the queue out so tasks posted during the drain land on the
        // next turn rather than running re-entrantly.
        let batch: VecDeque<_> = std::mem::take(&mut *self.tasks.borrow_mut());
        let n = batch.len();
        for task in batch {
            task();
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}
