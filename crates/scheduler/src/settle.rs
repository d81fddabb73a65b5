//! Debounce timing for bursty input
//!
//! Continuous zoom gestures produce many scale changes in quick succession.
//! The settle timer collapses them: every `arm` pushes the deadline out, and
//! `fire` reports the deadline only once it has passed.

use std::time::{Duration, Instant};

/// Default settle delay for zoom gestures
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Debounce timer driven by the caller's clock
///
/// # Example
///
/// ```
/// use viewer_scheduler::SettleTimer;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut timer = SettleTimer::new(Duration::from_millis(100));
///
/// timer.arm(start);
/// assert!(!timer.fire(start + Duration::from_millis(50)));
///
/// // Re-arming pushes the deadline out
/// timer.arm(start + Duration::from_millis(50));
/// assert!(!timer.fire(start + Duration::from_millis(120)));
/// assert!(timer.fire(start + Duration::from_millis(150)));
///
/// // Fires once per arm
/// assert!(!timer.fire(start + Duration::from_millis(200)));
/// ```
#[derive(Debug, Clone)]
pub struct SettleTimer {
    delay: Duration,
    deadline: Option<Instant>,
    rearm_count: u32,
}

impl SettleTimer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None, rearm_count: 0 }
    }

    /// Start or restart the timer from `now`
    pub fn arm(&mut self, now: Instant) {
        if self.deadline.is_some() {
            self.rearm_count += 1;
        }
        self.deadline = Some(now + self.delay);
    }

    /// Returns `true` exactly once after the deadline has passed
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.rearm_count = 0;
                true
            }
            _ => false,
        }
    }

    /// Disarm without firing
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.rearm_count = 0;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, `None` when disarmed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(now))
    }

    /// How many times the pending deadline was pushed out
    pub fn rearm_count(&self) -> u32 {
        self.rearm_count
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SettleTimer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_timer_never_fires() {
        let mut timer = SettleTimer::default();
        let now = Instant::now();

        assert!(!timer.is_armed());
        assert!(!timer.fire(now + Duration::from_secs(10)));
        assert_eq!(timer.remaining(now), None);
    }

    #[test]
    fn zero_delay_fires_on_next_check() {
        let mut timer = SettleTimer::new(Duration::ZERO);
        let now = Instant::now();

        timer.arm(now);
        assert!(timer.fire(now));
        assert!(!timer.is_armed());
    }

    #[test]
    fn rearm_extends_deadline_and_counts() {
        let mut timer = SettleTimer::new(Duration::from_millis(100));
        let start = Instant::now();

        timer.arm(start);
        timer.arm(start + Duration::from_millis(80));
        assert_eq!(timer.rearm_count(), 1);
        assert_eq!(
            timer.remaining(start + Duration::from_millis(100)),
            Some(Duration::from_millis(80))
        );

        assert!(!timer.fire(start + Duration::from_millis(179)));
        assert!(timer.fire(start + Duration::from_millis(180)));
        assert_eq!(timer.rearm_count(), 0);
    }

    #[test]
    fn cancel_disarms() {
        let mut timer = SettleTimer::new(Duration::from_millis(10));
        let start = Instant::now();

        timer.arm(start);
        timer.cancel();

        assert!(!timer.fire(start + Duration::from_secs(1)));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut timer = SettleTimer::new(Duration::from_millis(10));
        let start = Instant::now();

        timer.arm(start);
        assert_eq!(timer.remaining(start + Duration::from_secs(1)), Some(Duration::ZERO));
    }
}
