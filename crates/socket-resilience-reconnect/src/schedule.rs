//! Finite reconnect backoff schedules.

use std::sync::Arc;
use std::time::Duration;

/// An ordered, finite table of reconnect delays.
///
/// `delay(n)` is the wait before reconnect attempt `n` (0-indexed). Looking up
/// past the end returns `None`, which the supervisor treats as "give up".
/// Schedules are never merged: a caller-supplied schedule fully replaces the
/// default.
///
/// # Examples
///
/// ```
/// use socket_resilience_reconnect::BackoffSchedule;
/// use std::time::Duration;
///
/// let schedule = BackoffSchedule::default();
/// assert_eq!(schedule.delay(0), Some(Duration::ZERO));
/// assert_eq!(schedule.delay(1), Some(Duration::from_secs(3)));
/// assert_eq!(schedule.delay(2), Some(Duration::from_secs(10)));
/// assert_eq!(schedule.delay(3), None);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Arc<[Duration]>,
}

impl BackoffSchedule {
    /// Creates a schedule from an explicit list of delays.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self {
            delays: delays.into(),
        }
    }

    /// Creates an empty schedule: the first abnormal closure is final.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    /// Creates a schedule of `attempts` identical delays.
    pub fn fixed(delay: Duration, attempts: usize) -> Self {
        Self::new(vec![delay; attempts])
    }

    /// Creates a doubling schedule of `attempts` delays capped at `max_delay`.
    ///
    /// # Arguments
    /// * `initial_delay` - First delay (e.g., 100ms)
    /// * `max_delay` - Cap for every later delay (e.g., 5 seconds)
    /// * `attempts` - Number of reconnect attempts before giving up
    pub fn exponential(initial_delay: Duration, max_delay: Duration, attempts: usize) -> Self {
        let delays = (0..attempts)
            .map(|attempt| {
                let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
                let factor = 2u32.saturating_pow(exponent);
                initial_delay.saturating_mul(factor).min(max_delay)
            })
            .collect();
        Self::new(delays)
    }

    /// Prepends an immediate attempt to `delays`.
    pub fn immediate_then<I>(delays: I) -> Self
    where
        I: IntoIterator<Item = Duration>,
    {
        std::iter::once(Duration::ZERO).chain(delays).collect()
    }

    /// Returns the delay before attempt `attempt`, or `None` when exhausted.
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }

    /// Returns the number of reconnect attempts this schedule allows.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// Returns true if the schedule allows no reconnect at all.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Returns the delays in order.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Returns the sum of every delay in the schedule.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        // Immediate first retry, then 3s, then 10s.
        Self::new(vec![
            Duration::ZERO,
            Duration::from_secs(3),
            Duration::from_secs(10),
        ])
    }
}

impl From<Vec<Duration>> for BackoffSchedule {
    fn from(delays: Vec<Duration>) -> Self {
        Self::new(delays)
    }
}

impl FromIterator<Duration> for BackoffSchedule {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for BackoffSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.delays.iter()).finish()
    }
}
