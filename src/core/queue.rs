//! Latest-wins navigation queue.
//!
//! At most one navigation runs at a time; while one is in flight, newer
//! requests overwrite each other so that only the most recent survives.
//! Requests are never processed out of order because there is never more
//! than one waiting.

use log::debug;

/// The queue itself holds no locking; the owner wraps it in a mutex and the
/// returned values tell it what to run next.
#[derive(Debug)]
pub struct NavigationQueue<T> {
    pending: Option<T>,
    busy: bool,
}

impl<T> Default for NavigationQueue<T> {
    fn default() -> Self {
        Self {
            pending: None,
            busy: false,
        }
    }
}

impl<T> NavigationQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a new request. Returns `Some` when the queue was idle and the
    /// request should start immediately; otherwise the request is parked,
    /// replacing any previously parked one.
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        if self.busy {
            if self.pending.is_some() {
                debug!("Replacing queued navigation with a newer request");
            }
            self.pending = Some(item);
            None
        } else {
            self.busy = true;
            Some(item)
        }
    }

    /// Marks the in-flight request finished. Returns the parked request to
    /// run next, if any; otherwise the queue goes idle.
    pub fn finish(&mut self) -> Option<T> {
        match self.pending.take() {
            Some(next) => Some(next),
            None => {
                self.busy = false;
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_queue_starts_immediately() {
        let mut queue = NavigationQueue::new();
        assert_eq!(queue.enqueue(1), Some(1));
        assert!(queue.is_busy());
    }

    #[test]
    fn test_busy_queue_parks_request() {
        let mut queue = NavigationQueue::new();
        queue.enqueue(1);
        assert_eq!(queue.enqueue(2), None);
        assert_eq!(queue.finish(), Some(2));
        assert!(queue.is_busy());
    }

    #[test]
    fn test_newer_request_replaces_parked_one() {
        let mut queue = NavigationQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        queue.enqueue(3);
        // Only the latest parked request survives.
        assert_eq!(queue.finish(), Some(3));
        assert_eq!(queue.finish(), None);
        assert!(!queue.is_busy());
    }

    #[test]
    fn test_finish_with_nothing_parked_goes_idle() {
        let mut queue = NavigationQueue::new();
        queue.enqueue(1);
        assert_eq!(queue.finish(), None);
        assert!(!queue.is_busy());
        assert_eq!(queue.enqueue(4), Some(4));
    }
}
