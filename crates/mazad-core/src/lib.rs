// Library root: auction phase classification and the pieces around it
// (schedule, clock sources, listing rules, phase watcher, configuration).

pub mod clock;
pub mod config;
pub mod listing;
pub mod phase;
pub mod schedule;
pub mod watch;

pub use phase::{classify, classify_time, AuctionPhase, LocalHour, Locale, PhaseError};
pub use schedule::{PhaseSchedule, PhaseTransition};
