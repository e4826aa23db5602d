//! Bounded exponential backoff for the backend event stream

use std::time::Duration;

/// First reconnect delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Reconnect attempts before the channel is forced to disconnect
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// What to do after a channel failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reopen after `delay`; `attempt` is 1-based
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached, stop reconnecting
    GiveUp { attempts: u32 },
}

/// Retry bookkeeping: `delay = base * 2^attempts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
    ceiling: u32,
    base_delay: Duration,
}

impl ReconnectState {
    pub fn new(base_delay: Duration, ceiling: u32) -> Self {
        Self {
            attempts: 0,
            ceiling,
            base_delay,
        }
    }

    /// Record a channel failure and decide whether to retry
    pub fn on_failure(&mut self) -> ReconnectDecision {
        if self.attempts >= self.ceiling {
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Back to a fresh budget (successful event or explicit disconnect)
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(state: &mut ReconnectState, n: usize) -> Vec<ReconnectDecision> {
        (0..n).map(|_| state.on_failure()).collect()
    }

    #[test]
    fn doubling_sequence_then_give_up() {
        let mut state = ReconnectState::default();
        let decisions = delays(&mut state, 6);
        let ms: Vec<u128> = decisions
            .iter()
            .filter_map(|d| match d {
                ReconnectDecision::Retry { delay, .. } => Some(delay.as_millis()),
                ReconnectDecision::GiveUp { .. } => None,
            })
            .collect();
        assert_eq!(ms, vec![2000, 4000, 8000, 16000, 32000]);
        assert_eq!(decisions[5], ReconnectDecision::GiveUp { attempts: 5 });
    }

    #[test]
    fn reset_restarts_at_base() {
        let mut state = ReconnectState::default();
        state.on_failure();
        state.on_failure();
        state.reset();
        assert_eq!(
            state.on_failure(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(2000)
            }
        );
    }

    #[test]
    fn zero_ceiling_never_retries() {
        let mut state = ReconnectState::new(DEFAULT_BASE_DELAY, 0);
        assert_eq!(state.on_failure(), ReconnectDecision::GiveUp { attempts: 0 });
    }

    #[test]
    fn huge_ceiling_saturates() {
        let mut state = ReconnectState::new(Duration::from_secs(1), 64);
        let mut last = Duration::ZERO;
        for _ in 0..64 {
            if let ReconnectDecision::Retry { delay, .. } = state.on_failure() {
                assert!(delay >= last);
                last = delay;
            }
        }
    }
}
