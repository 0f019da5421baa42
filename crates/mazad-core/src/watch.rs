// Background task that reports the phase and every change to it.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::phase::AuctionPhase;
use crate::schedule::{PhaseSchedule, PhaseTransition};

/// Events emitted by [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The phase in effect when watching started.
    Current {
        phase: AuctionPhase,
        at: DateTime<FixedOffset>,
    },
    /// The phase changed. `at` is where the new phase's window began, which
    /// is the boundary just crossed unless the clock jumped past it.
    Changed(PhaseTransition<FixedOffset>),
}

/// Watch the clock and send a [`PhaseEvent`] for the starting phase and each
/// change after it. Returns once the receiver is dropped.
///
/// The task sleeps until the next scheduled boundary, then re-reads the clock
/// rather than trusting the sleep, so clock adjustments and DST shifts are
/// picked up at the next wake.
pub async fn run(
    clock: Arc<dyn Clock>,
    schedule: PhaseSchedule,
    tx: mpsc::Sender<PhaseEvent>,
) -> anyhow::Result<()> {
    let now = clock.now();
    let mut last = schedule.phase_at_time(&now);
    info!("Watching auction phase, currently {last} at {now}");

    if tx.send(PhaseEvent::Current { phase: last, at: now }).await.is_err() {
        return Ok(());
    }

    loop {
        let now = clock.now();
        let next = clock.next_transition(&schedule, &now);
        let wait = (next.at - now).to_std().unwrap_or_default();
        debug!("Next boundary {} -> {} at {} (in {:?})", next.from, next.to, next.at, wait);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tx.closed() => return Ok(()),
        }

        let now = clock.now();
        let phase = schedule.phase_at_time(&now);
        if phase == last {
            continue;
        }

        info!("Auction phase changed: {last} -> {phase}");
        let event = PhaseEvent::Changed(PhaseTransition {
            from: last,
            to: phase,
            at: clock.window_start(&schedule, &now),
        });
        last = phase;
        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }
}
