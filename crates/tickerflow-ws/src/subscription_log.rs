//! Replay log of raw subscribe frames.
//!
//! The owning adapter rewrites the log as its subscription state changes;
//! the proxy reads it when re-establishing a dropped connection. Frames
//! are replayed in insertion order.

use parking_lot::RwLock;
use std::sync::Arc;

/// Ordered, shareable log of raw subscribe frames.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionLog {
    frames: Arc<RwLock<Vec<String>>>,
}

impl SubscriptionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame to the end of the log.
    pub fn append(&self, frame: String) {
        self.frames.write().push(frame);
    }

    /// Replace the whole log.
    pub fn replace(&self, frames: Vec<String>) {
        *self.frames.write() = frames;
    }

    /// Copy of the current frames, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.frames.read().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let log = SubscriptionLog::new();
        log.append("f1".to_string());
        log.append("f2".to_string());
        log.append("f3".to_string());

        assert_eq!(log.snapshot(), vec!["f1", "f2", "f3"]);
    }

    #[test]
    fn test_replace() {
        let log = SubscriptionLog::new();
        log.append("old".to_string());
        log.replace(vec!["new".to_string()]);

        assert_eq!(log.snapshot(), vec!["new"]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_shared_between_clones() {
        let log = SubscriptionLog::new();
        let other = log.clone();
        other.append("f1".to_string());

        assert_eq!(log.snapshot(), vec!["f1"]);
    }
}
