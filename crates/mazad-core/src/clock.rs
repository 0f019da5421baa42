// Clock sources. The classifier never reads the system time itself; callers
// hold a `Clock` and pass the reading in.

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

use crate::phase::PhaseError;
use crate::schedule::{PhaseSchedule, PhaseTransition};

/// Source of the current time, expressed in the zone phases are evaluated in.
///
/// Readings carry a fixed offset, which loses any DST rules of the zone.
/// Clocks for zones with DST override the boundary methods so hours are
/// placed by the zone's own rules; the defaults reuse the reading's offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    /// Next phase change after `now`.
    fn next_transition(
        &self,
        schedule: &PhaseSchedule,
        now: &DateTime<FixedOffset>,
    ) -> PhaseTransition<FixedOffset> {
        schedule.next_transition(now)
    }

    /// Start of the phase window containing `now`.
    fn window_start(&self, schedule: &PhaseSchedule, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        schedule.window_start(now)
    }
}

// ---------------------------------------------------------------------------
// PhaseTimezone
// ---------------------------------------------------------------------------

/// The zone whose wall-clock hour decides the phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhaseTimezone {
    /// The device's configured local zone.
    #[default]
    Local,
    /// A fixed offset from UTC, shared by every caller.
    Fixed(FixedOffset),
}

impl PhaseTimezone {
    /// Express an instant in this zone.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            PhaseTimezone::Local => instant.with_timezone(&Local).fixed_offset(),
            PhaseTimezone::Fixed(offset) => instant.with_timezone(offset),
        }
    }

    /// [`PhaseSchedule::next_transition`] with boundaries placed by this
    /// zone's rules, including DST changes for `Local`.
    pub fn next_transition(
        &self,
        schedule: &PhaseSchedule,
        now: &DateTime<FixedOffset>,
    ) -> PhaseTransition<FixedOffset> {
        match self {
            PhaseTimezone::Local => schedule.next_transition(&now.with_timezone(&Local)).fixed_offset(),
            PhaseTimezone::Fixed(offset) => schedule.next_transition(&now.with_timezone(offset)),
        }
    }

    /// [`PhaseSchedule::window_start`] in this zone.
    pub fn window_start(&self, schedule: &PhaseSchedule, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        match self {
            PhaseTimezone::Local => schedule.window_start(&now.with_timezone(&Local)).fixed_offset(),
            PhaseTimezone::Fixed(offset) => schedule.window_start(&now.with_timezone(offset)),
        }
    }
}

impl fmt::Display for PhaseTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseTimezone::Local => f.write_str("local"),
            PhaseTimezone::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for PhaseTimezone {
    type Err = PhaseError;

    /// Accepts `local`, `utc`, `z`, or a signed offset: `+03`, `+03:00`,
    /// `-0530`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let invalid = |message: &str| PhaseError::InvalidTimezone {
            value: s.to_string(),
            message: message.to_string(),
        };

        match value.to_ascii_lowercase().as_str() {
            "local" => return Ok(PhaseTimezone::Local),
            "utc" | "z" => {
                return FixedOffset::east_opt(0)
                    .map(PhaseTimezone::Fixed)
                    .ok_or_else(|| invalid("offset out of range"));
            }
            _ => {}
        }

        let (sign, rest) = match value.as_bytes().first() {
            Some(b'+') => (1, &value[1..]),
            Some(b'-') => (-1, &value[1..]),
            _ => return Err(invalid("expected \"local\", \"utc\" or an offset like +03:00")),
        };

        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) || !(digits.len() == 2 || digits.len() == 4) {
            return Err(invalid("offset must be +HH, +HH:MM or +HHMM"));
        }
        if rest.contains(':') && rest.find(':') != Some(2) {
            return Err(invalid("offset must be +HH, +HH:MM or +HHMM"));
        }

        let hours: i32 = digits[..2].parse().map_err(|_| invalid("bad hours"))?;
        let minutes: i32 = if digits.len() == 4 {
            digits[2..].parse().map_err(|_| invalid("bad minutes"))?
        } else {
            0
        };
        if hours > 23 || minutes > 59 {
            return Err(invalid("offset out of range"));
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(PhaseTimezone::Fixed)
            .ok_or_else(|| invalid("offset out of range"))
    }
}

impl<'de> Deserialize<'de> for PhaseTimezone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Clock implementations
// ---------------------------------------------------------------------------

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    zone: PhaseTimezone,
}

impl SystemClock {
    pub fn new(zone: PhaseTimezone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> PhaseTimezone {
        self.zone
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.zone.localize(Utc::now())
    }

    fn next_transition(
        &self,
        schedule: &PhaseSchedule,
        now: &DateTime<FixedOffset>,
    ) -> PhaseTransition<FixedOffset> {
        self.zone.next_transition(schedule, now)
    }

    fn window_start(&self, schedule: &PhaseSchedule, now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.zone.window_start(schedule, now)
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn offset_secs(s: &str) -> i32 {
        match s.parse::<PhaseTimezone>().unwrap() {
            PhaseTimezone::Fixed(o) => o.local_minus_utc(),
            PhaseTimezone::Local => panic!("expected fixed offset for {s}"),
        }
    }

    #[test]
    fn parses_zone_names() {
        assert_eq!("local".parse::<PhaseTimezone>().unwrap(), PhaseTimezone::Local);
        assert_eq!(" Local ".parse::<PhaseTimezone>().unwrap(), PhaseTimezone::Local);
        assert_eq!(offset_secs("UTC"), 0);
        assert_eq!(offset_secs("Z"), 0);
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(offset_secs("+03"), 3 * 3600);
        assert_eq!(offset_secs("+03:00"), 3 * 3600);
        assert_eq!(offset_secs("-0530"), -(5 * 3600 + 30 * 60));
        assert_eq!(offset_secs("+05:45"), 5 * 3600 + 45 * 60);
    }

    #[test]
    fn rejects_malformed_offsets() {
        for bad in ["", "riyadh", "3", "+3", "+24:00", "+03:60", "+0:300", "+03:0a", "+030"] {
            assert!(
                matches!(
                    bad.parse::<PhaseTimezone>(),
                    Err(PhaseError::InvalidTimezone { .. })
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn display_round_trips_fixed_offset() {
        let zone: PhaseTimezone = "+03:00".parse().unwrap();
        assert_eq!(zone.to_string(), "+03:00");
        assert_eq!(zone.to_string().parse::<PhaseTimezone>().unwrap(), zone);
        assert_eq!(PhaseTimezone::Local.to_string(), "local");
    }

    #[test]
    fn fixed_zone_localizes_instant() {
        let zone: PhaseTimezone = "+03:00".parse().unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 1, 1, 14, 0, 0).unwrap();
        let local = zone.localize(instant);
        assert_eq!(local.hour(), 17);
        assert_eq!(local, instant);
    }

    #[test]
    fn system_clock_reports_in_its_zone() {
        let zone: PhaseTimezone = "-02:00".parse().unwrap();
        let clock = SystemClock::new(zone);
        assert_eq!(clock.now().offset().local_minus_utc(), -2 * 3600);
        assert_eq!(clock.zone(), zone);
    }

    #[test]
    fn local_zone_places_boundaries_on_local_wall_clock() {
        let schedule = PhaseSchedule::STANDARD;
        let clock = SystemClock::new(PhaseTimezone::Local);
        let now = clock.now();

        let next = clock.next_transition(&schedule, &now);
        let wall = next.at.with_timezone(&Local);
        assert!(next.at > now);
        assert_eq!(wall.minute(), 0);
        assert!([16, 19, 22].contains(&wall.hour()), "boundary at {wall}");
        assert_eq!(next.to, schedule.phase_at_time(&wall));

        let start = clock.window_start(&schedule, &now);
        assert!(start <= now);
        assert_eq!(start.with_timezone(&Local).minute(), 0);
    }

    #[test]
    fn fixed_zone_matches_schedule_math() {
        let schedule = PhaseSchedule::STANDARD;
        let zone: PhaseTimezone = "+03:00".parse().unwrap();
        let now = zone.localize(Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap());
        assert_eq!(zone.next_transition(&schedule, &now), schedule.next_transition(&now));
        assert_eq!(zone.window_start(&schedule, &now), schedule.window_start(&now));
    }

    #[test]
    fn fixed_clock_is_constant() {
        let t = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 1, 1, 16, 0, 0)
            .unwrap();
        let clock = FixedClock(t);
        assert_eq!(clock.now(), t);
        assert_eq!(clock.now(), clock.now());
    }
}
