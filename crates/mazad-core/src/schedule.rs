// Trading-day schedule: where each phase window starts and when the next
// change happens.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use serde::Deserialize;
use thiserror::Error;

use crate::phase::{AuctionPhase, LocalHour};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error(
        "phase windows out of order: live starts at {live}, instant at {instant}, \
         silent at {silent} (each must start after the previous)"
    )]
    OutOfOrder { live: u8, instant: u8, silent: u8 },

    #[error("`{field}` must be at most 24, got {value}")]
    HourOutOfRange { field: &'static str, value: u8 },

    #[error("silent window is empty (live starts at midnight and instant runs until midnight)")]
    EmptySilentWindow,
}

// ---------------------------------------------------------------------------
// PhaseSchedule
// ---------------------------------------------------------------------------

/// Start hours of the three daily phase windows.
///
/// Live runs `[live_start, instant_start)`, instant runs
/// `[instant_start, silent_start)`, and silent covers the rest of the day,
/// wrapping midnight. `silent_start` may be 24, meaning instant runs to the
/// end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseSchedule {
    #[serde(rename = "live_start_hour")]
    pub live_start: u8,
    #[serde(rename = "instant_start_hour")]
    pub instant_start: u8,
    #[serde(rename = "silent_start_hour")]
    pub silent_start: u8,
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        PhaseSchedule::STANDARD
    }
}

/// A change from one phase to the next, and the instant it takes effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTransition<Tz: TimeZone> {
    pub from: AuctionPhase,
    pub to: AuctionPhase,
    pub at: DateTime<Tz>,
}

impl<Tz: TimeZone> PhaseTransition<Tz> {
    /// The same transition with its instant expressed as a fixed offset.
    pub fn fixed_offset(&self) -> PhaseTransition<FixedOffset> {
        PhaseTransition {
            from: self.from,
            to: self.to,
            at: self.at.fixed_offset(),
        }
    }
}

impl PhaseSchedule {
    /// 16:00 live, 19:00 instant, 22:00 silent.
    pub const STANDARD: PhaseSchedule = PhaseSchedule {
        live_start: 16,
        instant_start: 19,
        silent_start: 22,
    };

    pub fn new(live_start: u8, instant_start: u8, silent_start: u8) -> Result<Self, ScheduleError> {
        let schedule = PhaseSchedule {
            live_start,
            instant_start,
            silent_start,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.silent_start > 24 {
            return Err(ScheduleError::HourOutOfRange {
                field: "silent_start_hour",
                value: self.silent_start,
            });
        }
        if !(self.live_start < self.instant_start && self.instant_start < self.silent_start) {
            return Err(ScheduleError::OutOfOrder {
                live: self.live_start,
                instant: self.instant_start,
                silent: self.silent_start,
            });
        }
        if self.live_start == 0 && self.silent_start == 24 {
            return Err(ScheduleError::EmptySilentWindow);
        }
        Ok(())
    }

    /// The phase in effect during `hour`.
    pub fn phase_at(&self, hour: LocalHour) -> AuctionPhase {
        let h = hour.get();
        if h >= self.live_start && h < self.instant_start {
            AuctionPhase::Live
        } else if h >= self.instant_start && h < self.silent_start {
            AuctionPhase::Instant
        } else {
            AuctionPhase::Silent
        }
    }

    /// The phase in effect at `time`, read in `time`'s own zone.
    pub fn phase_at_time<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> AuctionPhase {
        self.phase_at(LocalHour::of(time))
    }

    /// `[start, end)` hours of a phase's window. The silent window wraps
    /// midnight, so its start is greater than its end unless it begins at 0.
    pub fn window(&self, phase: AuctionPhase) -> (u8, u8) {
        match phase {
            AuctionPhase::Live => (self.live_start, self.instant_start),
            AuctionPhase::Instant => (self.instant_start, self.silent_start),
            AuctionPhase::Silent => (self.silent_start % 24, self.live_start),
        }
    }

    /// Hours at which a phase begins, ascending.
    fn boundaries(&self) -> [u8; 3] {
        let mut hours = [self.live_start, self.instant_start, self.silent_start % 24];
        hours.sort_unstable();
        hours
    }

    /// The next phase change strictly after the start of `now`'s hour.
    ///
    /// Boundaries are wall-clock hours in `now`'s zone. A boundary that falls
    /// in a DST gap resolves to the first valid local time after it.
    pub fn next_transition<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PhaseTransition<Tz> {
        let from = self.phase_at_time(now);
        let current = LocalHour::of(now).get();
        let bounds = self.boundaries();

        let (date, hour) = match bounds.iter().find(|&&b| b > current) {
            Some(&b) => (now.date_naive(), b),
            None => {
                let today = now.date_naive();
                (today.succ_opt().unwrap_or(today), bounds[0])
            }
        };

        let naive = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour));
        let at = resolve_local(now, naive);
        let to = self.phase_at(LocalHour::of(&at));

        PhaseTransition { from, to, at }
    }

    /// When the window containing `now` began: today's start hour if it has
    /// passed, otherwise yesterday's (the silent window wraps midnight).
    pub fn window_start<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let (start, _) = self.window(self.phase_at_time(now));
        let today = now.date_naive();
        let date = if start <= LocalHour::of(now).get() {
            today
        } else {
            today.pred_opt().unwrap_or(today)
        };
        let naive = date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(start));
        resolve_local(now, naive)
    }
}

/// Map a wall-clock time in `reference`'s zone to an instant. Ambiguous times
/// take the earlier instant; nonexistent times step forward to the end of the
/// gap.
fn resolve_local<Tz: TimeZone>(reference: &DateTime<Tz>, naive: NaiveDateTime) -> DateTime<Tz> {
    let tz = reference.timezone();
    let mut candidate = naive;
    // Real-world gaps are at most a couple of hours.
    for _ in 0..=16 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(t) => return t,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    reference.clone() + (naive - reference.naive_local())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
