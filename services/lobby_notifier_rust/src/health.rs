//! Lobby connection health and poll statistics

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Coarse state of the lobby session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyHealth {
    /// No poll has completed yet
    Starting,
    /// The last poll succeeded
    Healthy,
    /// The lobby server could not be reached or answered with an error
    Unavailable { reason: String },
    /// Login was rejected; re-login runs on its own cadence
    AuthFailed { reason: String },
    Stopped,
}

impl LobbyHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Unavailable { .. } => "unavailable",
            Self::AuthFailed { .. } => "auth_failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LobbyHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } | Self::AuthFailed { reason } => {
                write!(f, "{} ({})", self.as_str(), reason)
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Counters for monitoring the poll loop
#[derive(Debug, Default)]
pub struct PollStats {
    pub ticks: AtomicU64,
    pub polls_issued: AtomicU64,
    /// Ticks that found the previous poll still running
    pub polls_skipped: AtomicU64,
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub consecutive_failures: AtomicU32,
    pub connects: AtomicU64,
    pub notifications: AtomicU64,
}

impl PollStats {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_issued(&self) {
        self.polls_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.polls_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the failure streak that just ended, if any
    pub fn record_success(&self) -> u32 {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.swap(0, Ordering::Relaxed)
    }

    /// Returns the current failure streak
    pub fn record_failure(&self) -> u32 {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get_consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            ticks: self.ticks.load(Ordering::Relaxed),
            polls_issued: self.polls_issued.load(Ordering::Relaxed),
            polls_skipped: self.polls_skipped.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub ticks: u64,
    pub polls_issued: u64,
    pub polls_skipped: u64,
    pub successes: u64,
    pub failures: u64,
    pub connects: u64,
    pub notifications: u64,
}

/// Log a warning once a failure streak reaches this length
const FAILURE_ALERT_THRESHOLD: u32 = 3;

/// Shared health state, written by the poller and read by commands
#[derive(Debug)]
pub struct HealthMonitor {
    status: RwLock<(LobbyHealth, DateTime<Utc>)>,
    stats: PollStats,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            status: RwLock::new((LobbyHealth::Starting, Utc::now())),
            stats: PollStats::default(),
        }
    }

    pub fn health(&self) -> LobbyHealth {
        self.status.read().0.clone()
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Move to `health`. `Stopped` is final.
    pub fn set(&self, health: LobbyHealth) {
        let mut status = self.status.write();
        if status.0 == LobbyHealth::Stopped {
            return;
        }
        if status.0 != health {
            info!("Lobby health: {} -> {}", status.0, health);
            *status = (health, Utc::now());
        }
    }

    pub fn poll_succeeded(&self) {
        let streak = self.stats.record_success();
        if streak > 0 {
            info!("Lobby polling recovered after {} failures", streak);
        }
        self.set(LobbyHealth::Healthy);
    }

    /// Record a failed poll; auth failures keep their own state.
    pub fn poll_failed(&self, reason: String) {
        let streak = self.stats.record_failure();
        if streak == FAILURE_ALERT_THRESHOLD {
            error!("Lobby polling failed {} times in a row: {}", streak, reason);
        }
        let auth_failed = matches!(self.health(), LobbyHealth::AuthFailed { .. });
        if !auth_failed {
            self.set(LobbyHealth::Unavailable { reason });
        }
    }

    pub fn auth_failed(&self, reason: String) {
        warn!("Lobby login rejected: {}", reason);
        self.set(LobbyHealth::AuthFailed { reason });
    }

    pub fn stopped(&self) {
        self.set(LobbyHealth::Stopped);
    }

    /// One-line status for logs and the `status` command
    pub fn status_line(&self) -> String {
        let (health, since) = self.status.read().clone();
        let s = self.stats.summary();
        format!(
            "lobby {} since {} | polls={} ok={} failed={} skipped={} connects={} notifications={}",
            health,
            since.format("%Y-%m-%d %H:%M:%S UTC"),
            s.polls_issued,
            s.successes,
            s.failures,
            s.polls_skipped,
            s.connects,
            s.notifications
        )
    }
}

/// Log the status line every `interval` (runs until aborted)
pub async fn status_loop(health: Arc<HealthMonitor>, interval: Duration) {
    info!("Status loop started (interval: {:?})", interval);
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        info!("{}", health.status_line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats() {
        let stats = PollStats::default();

        stats.record_issued();
        assert_eq!(stats.record_failure(), 1);
        assert_eq!(stats.record_failure(), 2);
        assert_eq!(stats.get_consecutive_failures(), 2);

        assert_eq!(stats.record_success(), 2);
        assert_eq!(stats.get_consecutive_failures(), 0);

        let summary = stats.summary();
        assert_eq!(summary.polls_issued, 1);
        assert_eq!(summary.failures, 2);
        assert_eq!(summary.successes, 1);
    }

    #[test]
    fn test_transitions() {
        let monitor = HealthMonitor::new();
        assert_eq!(monitor.health(), LobbyHealth::Starting);

        monitor.poll_failed("connection refused".to_string());
        assert_eq!(
            monitor.health(),
            LobbyHealth::Unavailable {
                reason: "connection refused".to_string()
            }
        );

        monitor.poll_succeeded();
        assert_eq!(monitor.health(), LobbyHealth::Healthy);

        monitor.stopped();
        assert_eq!(monitor.health().as_str(), "stopped");
    }

    #[test]
    fn test_stopped_is_final() {
        let monitor = HealthMonitor::new();
        monitor.stopped();
        monitor.poll_failed("late failure".to_string());
        monitor.poll_succeeded();

        assert_eq!(monitor.health(), LobbyHealth::Stopped);
    }

    #[test]
    fn test_auth_failure_survives_poll_failures() {
        let monitor = HealthMonitor::new();
        monitor.auth_failed("bad password".to_string());
        monitor.poll_failed("not authenticated".to_string());

        assert_eq!(
            monitor.health(),
            LobbyHealth::AuthFailed {
                reason: "bad password".to_string()
            }
        );
        assert_eq!(monitor.stats().get_consecutive_failures(), 1);
    }

    #[test]
    fn test_status_line() {
        let monitor = HealthMonitor::new();
        monitor.auth_failed("bad password".to_string());

        let line = monitor.status_line();
        assert!(line.starts_with("lobby auth_failed (bad password) since "));
        assert!(line.contains("polls=0"));
    }
}
