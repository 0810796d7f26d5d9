//! Configuration for the sync engine.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`crate::SyncEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Documents directory that bare media names resolve against.
    pub documents_dir: PathBuf,
    /// Minimum wall-clock gap between successive push cycles.
    pub push_cooldown: Duration,
    /// Age after which a synced tombstone is hard-deleted.
    pub retention_days: i64,
    /// Cap on active synced posts kept locally.
    pub max_posts: usize,
    /// Posts fetched per pull cycle.
    pub post_pull_limit: u32,
    /// Likes and comments fetched per pull cycle, each.
    pub child_pull_limit: u32,
    /// Retry behavior for remote calls.
    pub retry: RetryPolicy,
}

impl EngineConfig {
    /// Creates a configuration with the documented defaults.
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            push_cooldown: Duration::from_millis(3000),
            retention_days: 30,
            max_posts: 500,
            post_pull_limit: 20,
            child_pull_limit: 100,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the push cooldown.
    #[must_use]
    pub fn with_push_cooldown(mut self, cooldown: Duration) -> Self {
        self.push_cooldown = cooldown;
        self
    }

    /// Sets the tombstone retention window in days.
    #[must_use]
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Sets the active-post cap.
    #[must_use]
    pub fn with_max_posts(mut self, cap: usize) -> Self {
        self.max_posts = cap;
        self
    }

    /// Sets the per-cycle pull limits.
    #[must_use]
    pub fn with_pull_limits(mut self, posts: u32, children: u32) -> Self {
        self.post_pull_limit = posts;
        self.child_pull_limit = children;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Capped exponential backoff policy for idempotent remote operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (so `max_retries + 1` attempts).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per further retry.
    pub multiplier: f64,
    /// Whether to stretch delays by up to 25% of jitter.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Creates a policy with the given retry count and the default ladder.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(2000),
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// A policy that gives up after the initial attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables jitter.
    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before attempt `attempt` (1-indexed retry number):
    /// `base × multiplier^(attempt−1)`, so 2 s, 4 s, 8 s with defaults.
    /// Attempt 0 is the initial call and has no delay.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let secs =
            self.base_delay.as_secs_f64() * self.multiplier.powi(attempt.saturating_sub(1) as i32);

        if self.jitter {
            Duration::from_secs_f64(secs + secs * 0.25 * time_jitter())
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Total sleep across a fully exhausted run, jitter excluded.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries)
            .map(|attempt| {
                Duration::from_secs_f64(
                    self.base_delay.as_secs_f64()
                        * self.multiplier.powi(attempt.saturating_sub(1) as i32),
                )
            })
            .sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Deterministic pseudo-jitter derived from the clock, avoiding an RNG
/// dependency for something this coarse.
fn time_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
