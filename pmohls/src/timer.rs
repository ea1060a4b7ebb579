//! Pausable countdown used for manifest refresh and idle disconnect
//!
//! A [`CountdownTimer`] fires once after a duration. Pausing stores the
//! remaining time, resuming restarts the countdown from that remainder, and
//! [`CountdownTimer::reuse`] rearms it with the original duration. All
//! arithmetic happens on [`Duration`] values from the tokio clock, so repeated
//! pause/resume cycles never accumulate rounding drift and tests can drive
//! the timer with a paused runtime.

use std::future;

use tokio::time::{sleep_until, Duration, Instant};

/// Lifecycle of a countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Running,
    Paused,
    Fired,
    Destroyed,
}

#[derive(Debug)]
pub struct CountdownTimer {
    total: Duration,
    remaining: Duration,
    started_at: Instant,
    state: TimerState,
}

impl CountdownTimer {
    /// Arms a new countdown that starts immediately
    pub fn start(duration: Duration) -> Self {
        Self {
            total: duration,
            remaining: duration,
            started_at: Instant::now(),
            state: TimerState::Running,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Duration the timer was armed with
    pub fn duration(&self) -> Duration {
        self.total
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == TimerState::Destroyed
    }

    /// Suspends the countdown, keeping the remaining time
    ///
    /// Returns false (and does nothing) unless the timer is running.
    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(self.started_at.elapsed());
        self.state = TimerState::Paused;
        true
    }

    /// Restarts a paused countdown from its remaining time
    ///
    /// Returns false (and does nothing) unless the timer is paused.
    pub fn resume(&mut self) -> bool {
        if self.state != TimerState::Paused {
            return false;
        }
        self.started_at = Instant::now();
        self.state = TimerState::Running;
        true
    }

    /// Rearms the countdown with its original duration
    ///
    /// Works from any state except destroyed.
    pub fn reuse(&mut self) -> bool {
        if self.state == TimerState::Destroyed {
            return false;
        }
        self.remaining = self.total;
        self.started_at = Instant::now();
        self.state = TimerState::Running;
        true
    }

    /// Cancels the countdown for good. Calling it twice is harmless.
    pub fn destroy(&mut self) {
        self.state = TimerState::Destroyed;
        self.remaining = Duration::ZERO;
    }

    /// Time left before the timer fires
    pub fn remaining(&self) -> Duration {
        match self.state {
            TimerState::Running => self.remaining.saturating_sub(self.started_at.elapsed()),
            TimerState::Paused => self.remaining,
            TimerState::Fired | TimerState::Destroyed => Duration::ZERO,
        }
    }

    /// Instant at which a running timer fires
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TimerState::Running => Some(self.started_at + self.remaining),
            _ => None,
        }
    }

    /// Completes when the countdown fires
    ///
    /// Never completes while the timer is paused, fired or destroyed. The
    /// future is cancel-safe: dropping it before completion leaves the
    /// timer untouched, which makes it usable as a `tokio::select!` branch.
    pub async fn expired(&mut self) {
        match self.deadline() {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.state = TimerState::Fired;
                self.remaining = Duration::ZERO;
            }
            None => future::pending::<()>().await,
        }
    }
}
