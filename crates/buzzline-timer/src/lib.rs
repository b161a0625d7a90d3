//! Pausable countdown for question and buzzer timers.
//!
//! A [`Countdown`] fires on a fixed interval (250 ms by default) and takes
//! one interval off the remaining time per tick. Remaining time only ever
//! changes on a tick, so pausing freezes it exactly and resuming continues
//! from the frozen value however long the pause lasted.
//!
//! The countdown is driven from the owner's event loop rather than a
//! spawned task, which means dropping it is the only cancellation needed:
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use buzzline_timer::{Countdown, CountdownConfig};
//!
//! # async fn example(mut commands: tokio::sync::mpsc::Receiver<()>) {
//! let mut countdown = Countdown::start(Duration::from_secs(20), CountdownConfig::default());
//! loop {
//!     tokio::select! {
//!         tick = countdown.wait_for_tick() => {
//!             println!("{} ms left", tick.remaining.as_millis());
//!         }
//!         Some(()) = commands.recv() => { countdown.pause(); }
//!     }
//! }
//! # }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Time between remaining-time updates.
    pub interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self { interval: Self::DEFAULT_INTERVAL }
    }
}

impl CountdownConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Raises intervals below [`Self::MIN_INTERVAL`] to the minimum.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "countdown interval too small, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// Result of one fired tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based tick number.
    pub tick: u64,
    /// Remaining time after this tick.
    pub remaining: Duration,
    /// This tick brought the countdown to zero; no further ticks follow.
    pub finished: bool,
    /// Whole intervals missed because the owner polled late. They are
    /// still charged against the remaining time.
    pub skipped: u64,
}

impl Tick {
    pub fn remaining_ms(&self) -> u64 {
        self.remaining.as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

pub struct Countdown {
    interval: Duration,
    remaining: Duration,
    next_tick: Option<Instant>,
    paused: bool,
    ticks: u64,
}

impl Countdown {
    /// Starts counting down from `duration`. The first tick fires one
    /// interval from now. A zero duration is finished immediately.
    pub fn start(duration: Duration, config: CountdownConfig) -> Self {
        let interval = config.validated().interval;
        let next_tick = (!duration.is_zero()).then(|| Instant::now() + interval);

        debug!(
            duration_ms = duration.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "countdown started"
        );

        Self { interval, remaining: duration, next_tick, paused: false, ticks: 0 }
    }

    /// Waits for the next tick.
    ///
    /// Pends forever while paused or once finished, which makes it safe to
    /// poll unconditionally from a `select!` loop.
    pub async fn wait_for_tick(&mut self) -> Tick {
        let next = match self.next_tick {
            Some(next) if !self.paused => next,
            _ => std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        let skipped = (late_by.as_nanos() / self.interval.as_nanos()) as u64;
        if skipped > 0 {
            warn!(
                tick = self.ticks + 1,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "countdown polled late, charging missed intervals"
            );
        }

        let elapsed = self.interval * (1 + skipped as u32);
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.ticks += 1;

        let finished = self.remaining.is_zero();
        self.next_tick = if finished { None } else { Some(now + self.interval) };

        trace!(tick = self.ticks, remaining_ms = self.remaining.as_millis() as u64, "countdown tick");
        if finished {
            debug!(ticks = self.ticks, "countdown finished");
        }

        Tick { tick: self.ticks, remaining: self.remaining, finished, skipped }
    }

    /// Freezes the remaining time. Returns `false` if already paused or
    /// finished.
    pub fn pause(&mut self) -> bool {
        if self.paused || self.is_finished() {
            return false;
        }
        self.paused = true;
        self.next_tick = None;
        debug!(remaining_ms = self.remaining.as_millis() as u64, "countdown paused");
        true
    }

    /// Continues from the frozen remaining time; the next tick fires one
    /// interval from now. Returns `false` if not paused.
    pub fn resume(&mut self) -> bool {
        if !self.paused {
            return false;
        }
        self.paused = false;
        self.next_tick = Some(Instant::now() + self.interval);
        debug!(remaining_ms = self.remaining.as_millis() as u64, "countdown resumed");
        true
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining.as_millis() as u64
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_is_quarter_second() {
        assert_eq!(CountdownConfig::default().interval, Duration::from_millis(250));
    }

    #[test]
    fn test_validated_clamps_tiny_interval() {
        let config = CountdownConfig::with_interval(Duration::from_millis(1)).validated();
        assert_eq!(config.interval, CountdownConfig::MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_is_finished() {
        let countdown = Countdown::start(Duration::ZERO, CountdownConfig::default());
        assert!(countdown.is_finished());
        assert_eq!(countdown.remaining_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_twice_is_noop() {
        let mut countdown = Countdown::start(Duration::from_secs(5), CountdownConfig::default());
        assert!(countdown.pause());
        assert!(!countdown.pause());
        assert!(countdown.resume());
        assert!(!countdown.resume());
    }
}
