//! Cooperative cancellation for the proof-of-work search.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag checked by search threads between batches.
///
/// Clones observe the same flag. An optional deadline makes the token
/// report cancelled once it has passed. A child token also reports
/// cancelled whenever its parent does.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also cancels itself after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: None,
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A token with its own flag and deadline that is also cancelled
    /// whenever `self` is. Cancelling the child leaves the parent untouched.
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn deadline_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        let later = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!later.is_cancelled());
    }

    #[test]
    fn parent_cancels_child_but_not_the_reverse() {
        let root = CancelToken::new();
        let first = root.child(None);
        first.cancel();
        assert!(first.is_cancelled());
        assert!(!root.is_cancelled());

        let second = root.child(Some(Duration::from_secs(3600)));
        assert!(!second.is_cancelled());
        let grandchild = second.child(None);
        root.cancel();
        assert!(second.is_cancelled());
        assert!(grandchild.is_cancelled());
    }
}
