//! Daily occasion scheduler.
//! One send per day, at a fixed "HH:MM" or a random minute inside a window.
//! Works on naive local wall-clock time.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use nudge_core::config::ReminderConfig;
use nudge_core::error::{NudgeError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Parse "HH:MM" (24h).
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| NudgeError::Config(format!("Invalid time '{s}' (expected HH:MM): {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccasionState {
    /// Nothing computed yet.
    Idle,
    /// Waiting for `at`.
    Armed { at: NaiveDateTime },
    /// `at` has been reported due; needs re-arming.
    Fired { at: NaiveDateTime },
}

pub struct OccasionScheduler {
    start: NaiveTime,
    end: NaiveTime,
    randomize: bool,
    state: OccasionState,
    rng: StdRng,
}

impl OccasionScheduler {
    pub fn new(start: &str, end: &str, randomize: bool) -> Result<Self> {
        let start = parse_time_of_day(start)?;
        let end = parse_time_of_day(end)?;
        if randomize && start > end {
            return Err(NudgeError::Config(format!(
                "Time range start {} is after end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self {
            start,
            end,
            randomize,
            state: OccasionState::Idle,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn from_config(config: &ReminderConfig) -> Result<Self> {
        Self::new(
            &config.time_range.start,
            &config.time_range.end,
            config.randomize_time,
        )
    }

    /// Deterministic random source for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> OccasionState {
        self.state
    }

    /// The armed occasion, if any.
    pub fn next_occasion(&self) -> Option<NaiveDateTime> {
        match self.state {
            OccasionState::Armed { at } => Some(at),
            _ => None,
        }
    }

    fn pick_time(&mut self) -> NaiveTime {
        if !self.randomize {
            return self.start;
        }
        let lo = self.start.num_seconds_from_midnight() / 60;
        let hi = self.end.num_seconds_from_midnight() / 60;
        let minute = self.rng.gen_range(lo..=hi);
        NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(self.start)
    }

    pub fn compute_next(&mut self) -> NaiveDateTime {
        self.compute_next_at(Local::now().naive_local())
    }

    /// Arm the next occasion strictly after `now`.
    pub fn compute_next_at(&mut self, now: NaiveDateTime) -> NaiveDateTime {
        let mut at = now.date().and_time(self.pick_time());
        if now >= at {
            let tomorrow = now.date() + TimeDelta::days(1);
            at = tomorrow.and_time(self.pick_time());
        }
        self.state = OccasionState::Armed { at };
        tracing::info!("⏰ Next reminder scheduled for {}", at.format("%Y-%m-%d %H:%M"));
        at
    }

    pub fn is_due(&mut self) -> bool {
        self.is_due_at(Local::now().naive_local())
    }

    /// True exactly once per armed occasion.
    pub fn is_due_at(&mut self, now: NaiveDateTime) -> bool {
        match self.state {
            OccasionState::Idle => {
                self.compute_next_at(now);
                false
            }
            OccasionState::Armed { at } => {
                if now >= at {
                    self.state = OccasionState::Fired { at };
                    tracing::info!("🔔 Reminder due (scheduled {})", at.format("%H:%M"));
                    true
                } else {
                    false
                }
            }
            OccasionState::Fired { at } => {
                tracing::warn!(
                    "⚠️ Occasion {} already fired, waiting for the next one to be computed",
                    at.format("%Y-%m-%d %H:%M")
                );
                false
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_at(Local::now().naive_local())
    }

    /// Sleep coarsely while far away, finely when close.
    pub fn poll_interval_at(&self, now: NaiveDateTime) -> Duration {
        let remaining = match self.state {
            OccasionState::Armed { at } => (at - now).num_seconds(),
            _ => 0,
        };
        if remaining > 3600 {
            Duration::from_secs(300)
        } else if remaining > 600 {
            Duration::from_secs(60)
        } else {
            Duration::from_secs(10)
        }
    }
}
