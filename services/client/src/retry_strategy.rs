use backoff::backoff::{Backoff, Constant};
use std::time::Duration;

/// Fixed-delay retry policy for the winner query.
///
/// Only the "raffle pending" answer is retried; transport errors never are.
pub struct RetryStrategy {
    delay: Duration,
    max_attempts: Option<u32>,
    backoff: Constant,
}

impl RetryStrategy {
    /// `max_attempts == 0` means "retry until an answer arrives"
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: (max_attempts > 0).then_some(max_attempts),
            backoff: Constant::new(delay),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.backoff.next_backoff().unwrap_or(self.delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempt < max,
            None => true,
        }
    }

    pub fn reset(&mut self) {
        self.backoff.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        let strategy = RetryStrategy::fixed(Duration::from_millis(500), 3);
        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(2));
        assert!(!strategy.should_retry(3));
    }

    #[test]
    fn test_unbounded_by_default() {
        let strategy = RetryStrategy::fixed(Duration::from_millis(500), 0);
        assert!(strategy.should_retry(0));
        assert!(strategy.should_retry(u32::MAX - 1));
    }

    #[test]
    fn test_delay_is_constant() {
        let mut strategy = RetryStrategy::fixed(Duration::from_millis(500), 0);
        for _ in 0..5 {
            assert_eq!(strategy.next_delay(), Duration::from_millis(500));
        }
        strategy.reset();
        assert_eq!(strategy.next_delay(), Duration::from_millis(500));
    }
}
