// Auction phase classification by local hour of day.
//
// The marketplace runs three trading modes across the day. Which one is in
// effect depends only on the hour component of the caller's clock, so the
// classifier takes that hour as an argument; reading the clock is the job of
// `crate::clock`.

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::schedule::PhaseSchedule;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("hour out of range (expected 0-23): {0}")]
    InvalidHour(u32),

    #[error("unknown auction phase: {0:?}")]
    UnknownPhase(String),

    #[error("unknown locale: {0:?} (expected \"en\" or \"ar\")")]
    UnknownLocale(String),

    #[error("invalid timezone {value:?}: {message}")]
    InvalidTimezone { value: String, message: String },
}

// ---------------------------------------------------------------------------
// AuctionPhase
// ---------------------------------------------------------------------------

/// The trading mode the marketplace is in for a given hour.
///
/// Serialized as `live`, `instant` or `silent`. The older names used by the
/// marketplace backend and earlier clients (`immediate`, `live_instant`,
/// `late`, `silent_instant`) are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionPhase {
    /// Human-moderated bidding in the live room.
    Live,
    /// Fast fixed-rule bidding.
    #[serde(alias = "immediate", alias = "live_instant")]
    Instant,
    /// No active room; listings sit in the silent market.
    #[serde(alias = "late", alias = "silent_instant")]
    Silent,
}

impl AuctionPhase {
    /// All phases in the order they occur during the trading day.
    pub const ALL: [AuctionPhase; 3] = [
        AuctionPhase::Live,
        AuctionPhase::Instant,
        AuctionPhase::Silent,
    ];

    /// Canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionPhase::Live => "live",
            AuctionPhase::Instant => "instant",
            AuctionPhase::Silent => "silent",
        }
    }

    /// Human-facing market name in the given locale.
    pub fn label(&self, locale: Locale) -> &'static str {
        match (locale, self) {
            (Locale::En, AuctionPhase::Live) => "Live auction",
            (Locale::En, AuctionPhase::Instant) => "Instant market",
            (Locale::En, AuctionPhase::Silent) => "Silent market",
            (Locale::Ar, AuctionPhase::Live) => "الحراج المباشر",
            (Locale::Ar, AuctionPhase::Instant) => "السوق الفوري",
            (Locale::Ar, AuctionPhase::Silent) => "السوق المتأخر",
        }
    }

    /// Whether a live bidding room is open during this phase.
    pub fn is_live_bidding(&self) -> bool {
        matches!(self, AuctionPhase::Live | AuctionPhase::Instant)
    }
}

impl fmt::Display for AuctionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuctionPhase {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(AuctionPhase::Live),
            "instant" | "immediate" | "live_instant" => Ok(AuctionPhase::Instant),
            "silent" | "late" | "silent_instant" => Ok(AuctionPhase::Silent),
            _ => Err(PhaseError::UnknownPhase(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// Language used for phase labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl FromStr for Locale {
    type Err = PhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ar" => Ok(Locale::Ar),
            _ => Err(PhaseError::UnknownLocale(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// LocalHour
// ---------------------------------------------------------------------------

/// An hour of the day, 0 through 23, in whatever zone the caller observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalHour(u8);

impl LocalHour {
    pub fn new(hour: u32) -> Result<Self, PhaseError> {
        if hour < 24 {
            Ok(LocalHour(hour as u8))
        } else {
            Err(PhaseError::InvalidHour(hour))
        }
    }

    /// The hour component of `time`, in `time`'s own zone.
    pub fn of<Tz: TimeZone>(time: &DateTime<Tz>) -> Self {
        // chrono guarantees hour() < 24
        LocalHour(time.hour() as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every hour of the day, midnight first.
    pub fn all() -> impl Iterator<Item = LocalHour> {
        (0u8..24).map(LocalHour)
    }
}

impl TryFrom<u32> for LocalHour {
    type Error = PhaseError;

    fn try_from(hour: u32) -> Result<Self, Self::Error> {
        LocalHour::new(hour)
    }
}

impl fmt::Display for LocalHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify an hour with the standard trading day:
/// 16:00-19:00 live, 19:00-22:00 instant, silent otherwise.
pub fn classify(hour: LocalHour) -> AuctionPhase {
    PhaseSchedule::STANDARD.phase_at(hour)
}

/// Classify a timestamp by its hour component in its own zone.
pub fn classify_time<Tz: TimeZone>(time: &DateTime<Tz>) -> AuctionPhase {
    classify(LocalHour::of(time))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn hour(h: u32) -> LocalHour {
        LocalHour::new(h).unwrap()
    }

    #[test]
    fn boundary_hours() {
        let cases = [
            (15, AuctionPhase::Silent),
            (16, AuctionPhase::Live),
            (18, AuctionPhase::Live),
            (19, AuctionPhase::Instant),
            (21, AuctionPhase::Instant),
            (22, AuctionPhase::Silent),
            (0, AuctionPhase::Silent),
            (23, AuctionPhase::Silent),
        ];
        for (h, expected) in cases {
            assert_eq!(classify(hour(h)), expected, "hour {h}");
        }
    }

    #[test]
    fn windows_partition_the_day() {
        let mut counts = [0usize; 3];
        for h in LocalHour::all() {
            let phase = classify(h);
            let expected = match h.get() {
                16..=18 => AuctionPhase::Live,
                19..=21 => AuctionPhase::Instant,
                _ => AuctionPhase::Silent,
            };
            assert_eq!(phase, expected, "hour {}", h.get());
            counts[AuctionPhase::ALL.iter().position(|p| *p == phase).unwrap()] += 1;
        }
        assert_eq!(counts, [3, 3, 18]);
        assert_eq!(counts.iter().sum::<usize>(), 24);
    }

    #[test]
    fn same_hour_gives_same_phase() {
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let a = tz.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap();
        let b = tz.with_ymd_and_hms(2026, 3, 1, 17, 59, 59).unwrap();
        assert_eq!(classify_time(&a), AuctionPhase::Live);
        assert_eq!(classify_time(&a), classify_time(&b));
        assert_eq!(classify_time(&a), classify_time(&a));
    }

    #[test]
    fn classify_time_uses_the_timestamps_own_zone() {
        // 14:00 UTC is 17:00 at +03:00.
        let utc = Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap();
        let riyadh = utc.with_timezone(&FixedOffset::east_opt(3 * 3600).unwrap());
        assert_eq!(classify_time(&utc), AuctionPhase::Silent);
        assert_eq!(classify_time(&riyadh), AuctionPhase::Live);
    }

    #[test]
    fn rejects_hour_24() {
        assert_eq!(LocalHour::new(24), Err(PhaseError::InvalidHour(24)));
        assert!(LocalHour::try_from(99u32).is_err());
        assert_eq!(LocalHour::try_from(23u32).unwrap().get(), 23);
    }

    #[test]
    fn parses_canonical_and_legacy_names() {
        assert_eq!("live".parse::<AuctionPhase>().unwrap(), AuctionPhase::Live);
        assert_eq!("Instant".parse::<AuctionPhase>().unwrap(), AuctionPhase::Instant);
        assert_eq!("immediate".parse::<AuctionPhase>().unwrap(), AuctionPhase::Instant);
        assert_eq!("live_instant".parse::<AuctionPhase>().unwrap(), AuctionPhase::Instant);
        assert_eq!(" late ".parse::<AuctionPhase>().unwrap(), AuctionPhase::Silent);
        assert_eq!("silent_instant".parse::<AuctionPhase>().unwrap(), AuctionPhase::Silent);
        assert!(matches!(
            "closed".parse::<AuctionPhase>(),
            Err(PhaseError::UnknownPhase(s)) if s == "closed"
        ));
    }

    #[test]
    fn serde_uses_canonical_names_and_accepts_aliases() {
        assert_eq!(serde_json::to_string(&AuctionPhase::Instant).unwrap(), "\"instant\"");
        let p: AuctionPhase = serde_json::from_str("\"late\"").unwrap();
        assert_eq!(p, AuctionPhase::Silent);
        let p: AuctionPhase = serde_json::from_str("\"live_instant\"").unwrap();
        assert_eq!(p, AuctionPhase::Instant);
    }

    #[test]
    fn labels_per_locale() {
        assert_eq!(AuctionPhase::Live.label(Locale::En), "Live auction");
        assert_eq!(AuctionPhase::Instant.label(Locale::Ar), "السوق الفوري");
        assert_eq!(AuctionPhase::Silent.to_string(), "silent");
        assert_eq!("AR".parse::<Locale>().unwrap(), Locale::Ar);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn live_bidding_flag() {
        assert!(AuctionPhase::Live.is_live_bidding());
        assert!(AuctionPhase::Instant.is_live_bidding());
        assert!(!AuctionPhase::Silent.is_live_bidding());
    }
}
