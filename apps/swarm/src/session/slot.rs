//! Single-slot overwrite channel.
//!
//! The background reader stages derived payload batches for its session's
//! scheduler. The slot holds at most one value: staging over an unconsumed
//! batch discards the old one (last write wins), and a drained batch is
//! gone for good.

use std::sync::Arc;

use parking_lot::Mutex;

pub fn channel<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let shared = Arc::new(Mutex::new(None));
    (
        SlotSender {
            shared: shared.clone(),
        },
        SlotReceiver { shared },
    )
}

pub struct SlotSender<T> {
    shared: Arc<Mutex<Option<T>>>,
}

impl<T> SlotSender<T> {
    /// Stage a value, returning whatever it displaced.
    pub fn send(&self, value: T) -> Option<T> {
        self.shared.lock().replace(value)
    }
}

impl<T> Clone for SlotSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

pub struct SlotReceiver<T> {
    shared: Arc<Mutex<Option<T>>>,
}

impl<T> SlotReceiver<T> {
    /// Drain the slot, if occupied.
    pub fn take(&self) -> Option<T> {
        self.shared.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_write_displaces_the_first() {
        let (tx, rx) = channel();
        assert!(tx.send("first").is_none());
        assert_eq!(tx.send("second"), Some("first"));
        assert_eq!(rx.take(), Some("second"));
        assert!(rx.take().is_none());
    }

    #[test]
    fn drained_slot_is_empty() {
        let (tx, rx) = channel();
        tx.send(1);
        assert!(!rx.is_empty());
        rx.take();
        assert!(rx.is_empty());
    }
}
