//! Cancellation tokens for render work
//!
//! A token is shared between the owner of a render task and the worker
//! executing it. Cancellation is cooperative: the worker checks the token
//! before and after rasterizing, and the owner treats a cancelled task as a
//! silent terminal state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative task cancellation
///
/// All clones share the same flag.
///
/// # Example
///
/// ```
/// use viewer_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// assert!(token.cancel());
/// assert!(worker_token.is_cancelled());
///
/// // Only the first call flips the flag
/// assert!(!token.cancel());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and every clone of it
    ///
    /// Returns `true` only for the call that performed the transition, so
    /// callers can count cancellations without double counting.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Check whether `cancel()` has been called on this token or any clone
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether two tokens share the same flag
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();

        token.cancel();

        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
        assert!(token.same_as(&clone));
    }

    #[test]
    fn cancel_reports_only_first_transition() {
        let token = CancellationToken::new();

        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(!token.clone().cancel());
        assert!(token.is_cancelled());
    }

    #[test]
    fn independent_tokens_do_not_share_state() {
        let first = CancellationToken::new();
        let second = CancellationToken::new();

        first.cancel();

        assert!(!second.is_cancelled());
        assert!(!first.same_as(&second));
    }

    #[test]
    fn cancel_from_another_thread() {
        let token = CancellationToken::new();
        let remote = token.clone();

        std::thread::spawn(move || {
            remote.cancel();
        })
        .join()
        .unwrap();

        assert!(token.is_cancelled());
    }
}
