//! Tunable constants for the sync engine (§1.1).
//!
//! Production code uses [`SyncConfig::default`]; tests override individual
//! fields (e.g. a millisecond-scale `push_cooldown`) to exercise timing
//! behavior without sleeping for real-world durations.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// §4.G — minimum gap between successive push cycles.
    pub push_cooldown: Duration,
    /// §4.B — base delay for attempt 1; doubles each subsequent attempt.
    pub retry_base_delay: Duration,
    /// §4.B — N_MAX, number of retries after the first attempt (3 → 4 total attempts).
    pub retry_max_attempts: u32,
    /// §4.F — RETENTION_DAYS.
    pub retention: chrono::Duration,
    /// §4.F — MAX_POSTS.
    pub max_active_posts: usize,
    /// §4.E — posts page size per pull cycle.
    pub pull_posts_limit: u32,
    /// §4.E — likes/comments page size per pull cycle.
    pub pull_children_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_cooldown: Duration::from_millis(3000),
            retry_base_delay: Duration::from_millis(2000),
            retry_max_attempts: 3,
            retention: chrono::Duration::days(30),
            max_active_posts: 500,
            pull_posts_limit: 20,
            pull_children_limit: 100,
        }
    }
}
