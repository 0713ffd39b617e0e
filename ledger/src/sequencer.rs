//! Single-writer nonce assignment for admin transactions.

use tokio::sync::{Mutex, MutexGuard};

/// Serializes nonce assignment and submission of admin transactions.
///
/// The next nonce is cached after the first successful submission. Any
/// failed submission clears the cache so the next one re-reads the pending
/// count from the chain.
#[derive(Debug, Default)]
pub struct SubmissionSequencer {
    next_nonce: Mutex<Option<u64>>,
}

/// Exclusive right to submit one transaction.
///
/// Dropping the slot without calling [`NonceSlot::commit`] or
/// [`NonceSlot::reset`] leaves the cached nonce unchanged.
pub struct NonceSlot<'a> {
    guard: MutexGuard<'a, Option<u64>>,
}

impl SubmissionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> NonceSlot<'_> {
        NonceSlot {
            guard: self.next_nonce.lock().await,
        }
    }
}

impl NonceSlot<'_> {
    /// The cached next nonce, if any.
    pub fn cached(&self) -> Option<u64> {
        *self.guard
    }

    /// Record that `used` was accepted by the chain node.
    pub fn commit(mut self, used: u64) {
        *self.guard = Some(used + 1);
    }

    /// Forget the cached nonce.
    pub fn reset(mut self) {
        *self.guard = None;
    }
}
