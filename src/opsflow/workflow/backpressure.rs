// SPDX-License-Identifier: MIT

//! Admission control for producers feeding the engine
//!
//! A bounded pool of tokens. `acquire` never blocks; producers that want to
//! wait call `wait_for_capacity` and retry.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

#[derive(Debug)]
pub struct BackpressureController {
    max_tokens: usize,
    tokens: AtomicUsize,
    capacity: Notify,
}

impl BackpressureController {
    /// Create a controller with a full pool
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            tokens: AtomicUsize::new(max_tokens),
            capacity: Notify::new(),
        }
    }

    /// Take a token if one is free
    pub fn acquire(&self) -> bool {
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| t.checked_sub(1))
            .is_ok()
    }

    /// Return a token; the pool never grows past `max_tokens`
    pub fn release(&self) {
        let previous = self
            .tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                (t < self.max_tokens).then_some(t + 1)
            });

        if previous == Ok(0) {
            self.capacity.notify_waiters();
        }
    }

    /// True iff no tokens remain
    pub fn is_pressured(&self) -> bool {
        self.available() == 0
    }

    pub fn available(&self) -> usize {
        self.tokens.load(Ordering::Acquire)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Suspend until at least one token is free. Does not take the token.
    pub async fn wait_for_capacity(&self) {
        loop {
            let notified = self.capacity.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if !self.is_pressured() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_acquire_until_empty() {
        let bp = BackpressureController::new(2);
        assert!(!bp.is_pressured());
        assert!(bp.acquire());
        assert!(bp.acquire());
        assert!(bp.is_pressured());
        assert!(!bp.acquire());
        assert_eq!(bp.available(), 0);
    }

    #[test]
    fn test_release_is_capped() {
        let bp = BackpressureController::new(2);
        bp.release();
        bp.release();
        assert_eq!(bp.available(), 2);

        assert!(bp.acquire());
        bp.release();
        bp.release();
        assert_eq!(bp.available(), 2);
    }

    #[test]
    fn test_tokens_stay_in_bounds_over_mixed_sequence() {
        let bp = BackpressureController::new(3);
        // a = acquire, r = release
        let ops = "aaaarrrrrarararaaaaarr";
        for op in ops.chars() {
            match op {
                'a' => {
                    bp.acquire();
                }
                _ => bp.release(),
            }
            let t = bp.available();
            assert!(t <= bp.max_tokens());
            assert_eq!(bp.is_pressured(), t == 0);
        }
    }

    #[test]
    fn test_zero_capacity_is_always_pressured() {
        let bp = BackpressureController::new(0);
        assert!(bp.is_pressured());
        assert!(!bp.acquire());
        bp.release();
        assert!(bp.is_pressured());
    }

    #[tokio::test]
    async fn test_wait_for_capacity_returns_immediately_when_free() {
        let bp = BackpressureController::new(1);
        tokio::time::timeout(Duration::from_secs(1), bp.wait_for_capacity())
            .await
            .expect("should not wait");
    }

    #[tokio::test]
    async fn test_wait_for_capacity_wakes_on_release() {
        let bp = Arc::new(BackpressureController::new(1));
        assert!(bp.acquire());

        let waiter = {
            let bp = bp.clone();
            tokio::spawn(async move {
                bp.wait_for_capacity().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        bp.release();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(bp.available(), 1);
    }
}
