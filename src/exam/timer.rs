// src/exam/timer.rs

//! Session countdown.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Seconds left after this tick.
    Running(u32),
    /// Reached zero on this tick. Reported once.
    Expired,
    /// Already expired on an earlier tick.
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    remaining: u32,
    expired: bool,
}

impl Countdown {
    pub fn new(limit_secs: u32) -> Self {
        Self {
            remaining: limit_secs,
            expired: false,
        }
    }

    /// Countdown for a session started at `started_at`; the deadline is
    /// `started_at + limit_secs` no matter how long the session was away.
    pub fn resume(limit_secs: u32, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = (now - started_at).num_seconds().max(0);
        let remaining = i64::from(limit_secs).saturating_sub(elapsed).max(0) as u32;
        Self::new(remaining)
    }

    pub fn tick(&mut self) -> Tick {
        if self.expired {
            return Tick::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// True once no time is left, whether or not a tick has reported it.
    pub fn is_over(&self) -> bool {
        self.expired || self.remaining == 0
    }
}

/// Owns the task driving a countdown; dropping it stops the task.
#[derive(Debug)]
pub struct TimerGuard(JoinHandle<()>);

impl TimerGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn expires_exactly_once() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.tick(), Tick::Running(2));
        assert_eq!(countdown.tick(), Tick::Running(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Stopped);
        assert_eq!(countdown.tick(), Tick::Stopped);
        assert!(countdown.is_over());
    }

    #[test]
    fn zero_limit_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert!(countdown.is_over());
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Stopped);
    }

    #[test]
    fn resume_keeps_the_original_deadline() {
        let started = Utc::now();
        let countdown = Countdown::resume(600, started, started + Duration::seconds(250));
        assert_eq!(countdown.remaining(), 350);

        let late = Countdown::resume(600, started, started + Duration::seconds(900));
        assert_eq!(late.remaining(), 0);
        assert!(late.is_over());
    }

    #[test]
    fn resume_ignores_clock_skew() {
        let started = Utc::now();
        let countdown = Countdown::resume(60, started, started - Duration::seconds(30));
        assert_eq!(countdown.remaining(), 60);
    }

    #[tokio::test]
    async fn dropping_guard_aborts_task() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await
        });
        drop(TimerGuard::new(handle));
        // The sender is dropped with the aborted task.
        assert!(rx.await.is_err());
    }
}
