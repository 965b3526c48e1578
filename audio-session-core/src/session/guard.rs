use tokio::sync::{Mutex, MutexGuard};

use crate::models::error::SessionError;

/// Serializes a session's operations and owns its handle slot.
///
/// A second call into the same session while an operation is in flight is
/// rejected immediately with `OperationInProgress` rather than queued, so a
/// double-tapped start can never allocate two handles. Teardown paths, which
/// must always run, wait instead of rejecting.
///
/// Holding the claim across backend awaits is what makes a session's
/// operations mutually exclusive; the recording and playback sessions guard
/// independently, so one may have an operation in flight while the other does.
pub struct ResourceGuard<T> {
    slot: Mutex<T>,
}

impl<T> ResourceGuard<T> {
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(value),
        }
    }

    /// Claim the session for one operation, holding the claim until the
    /// returned guard drops. Rejects instead of queueing.
    pub fn try_claim(&self) -> Result<MutexGuard<'_, T>, SessionError> {
        self.slot
            .try_lock()
            .map_err(|_| SessionError::OperationInProgress)
    }

    /// Wait for any in-flight operation to finish, then claim. Reserved for
    /// paths that must always run: disposal and playback teardown.
    pub async fn claim_for_teardown(&self) -> MutexGuard<'_, T> {
        self.slot.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_claim_is_rejected_not_queued() {
        let guard = ResourceGuard::new(0u32);

        let held = guard.try_claim().unwrap();
        assert_eq!(
            guard.try_claim().err(),
            Some(SessionError::OperationInProgress)
        );

        drop(held);
        assert!(guard.try_claim().is_ok());
    }

    #[tokio::test]
    async fn teardown_claim_waits_for_in_flight_operation() {
        use std::sync::Arc;

        let guard = Arc::new(ResourceGuard::new(0u32));

        let mut held = guard.try_claim().unwrap();
        *held = 7;

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { *guard.claim_for_teardown().await })
        };

        tokio::task::yield_now().await;
        drop(held);

        assert_eq!(waiter.await.unwrap(), 7);
    }
}
