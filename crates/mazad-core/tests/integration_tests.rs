// Integration tests for the auction phase clock.
//
// These exercise the public API the way a caller at the boundary would: read
// a clock once, classify, and act on the phase for a listing.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tokio::sync::mpsc;

use mazad_core::clock::{Clock, FixedClock, PhaseTimezone};
use mazad_core::listing::{BidDecision, BidRejection, BidRules, Listing, ListingStatus};
use mazad_core::watch::{self, PhaseEvent};
use mazad_core::{classify, classify_time, AuctionPhase, LocalHour, PhaseSchedule};

// ===========================================================================
// Test helpers
// ===========================================================================

fn riyadh() -> PhaseTimezone {
    "+03:00".parse().unwrap()
}

fn clock_at_utc(h: u32, m: u32) -> FixedClock {
    let instant = Utc.with_ymd_and_hms(2026, 4, 20, h, m, 0).unwrap();
    FixedClock(riyadh().localize(instant))
}

// ===========================================================================
// Classification
// ===========================================================================

#[test]
fn every_hour_maps_to_exactly_one_phase() {
    let mut live = 0;
    let mut instant = 0;
    let mut silent = 0;
    for h in 0..24u32 {
        match classify(LocalHour::new(h).unwrap()) {
            AuctionPhase::Live => {
                assert!((16..19).contains(&h));
                live += 1;
            }
            AuctionPhase::Instant => {
                assert!((19..22).contains(&h));
                instant += 1;
            }
            AuctionPhase::Silent => {
                assert!(h < 16 || h >= 22);
                silent += 1;
            }
        }
    }
    assert_eq!((live, instant, silent), (3, 3, 18));
}

#[test]
fn same_instant_differs_by_zone() {
    // 13:30 UTC is 16:30 in Riyadh and 13:30 in London (winter).
    let instant = Utc.with_ymd_and_hms(2026, 1, 15, 13, 30, 0).unwrap();
    let in_riyadh = riyadh().localize(instant);
    let in_utc: DateTime<FixedOffset> = instant.fixed_offset();
    assert_eq!(classify_time(&in_riyadh), AuctionPhase::Live);
    assert_eq!(classify_time(&in_utc), AuctionPhase::Silent);
}

#[test]
fn boundary_caller_reads_clock_once() {
    let clock = clock_at_utc(16, 15); // 19:15 in Riyadh
    let now = clock.now();
    let schedule = PhaseSchedule::default();
    assert_eq!(schedule.phase_at_time(&now), AuctionPhase::Instant);

    let next = schedule.next_transition(&now);
    assert_eq!(next.to, AuctionPhase::Silent);
    assert_eq!(next.at, riyadh().localize(Utc.with_ymd_and_hms(2026, 4, 20, 19, 0, 0).unwrap()));
}

// ===========================================================================
// Listing lifecycle across a trading day
// ===========================================================================

#[test]
fn listing_moves_through_the_day() {
    let schedule = PhaseSchedule::default();
    let rules = BidRules::default();

    let mut listing = Listing {
        opening_price: Some(40_000.0),
        reserve_price: Some(50_000.0),
        ..Listing::new(AuctionPhase::Silent, true)
    };

    // 16:30 local: live room, open bidding.
    listing.update_phase(schedule.phase_at_time(&clock_at_utc(13, 30).now()));
    assert_eq!(listing.phase, AuctionPhase::Live);
    assert_eq!(listing.record_bid(47_000.0, &rules), Ok(BidDecision::Placed));

    // 19:30 local: instant market starts from the live price.
    listing.update_phase(schedule.phase_at_time(&clock_at_utc(16, 30).now()));
    assert_eq!(listing.phase, AuctionPhase::Instant);
    assert_eq!(listing.opening_price, Some(47_000.0));
    assert!(listing.record_bid(70_000.0, &rules).is_err());
    assert_eq!(listing.record_bid(48_000.0, &rules), Ok(BidDecision::Placed));

    // 22:30 local: silent market, reserve met closes the sale.
    listing.update_phase(schedule.phase_at_time(&clock_at_utc(19, 30).now()));
    assert_eq!(listing.phase, AuctionPhase::Silent);
    assert_eq!(listing.opening_price, Some(48_000.0));
    assert_eq!(listing.record_bid(50_000.0, &rules), Ok(BidDecision::AutoAccepted));
    assert_eq!(listing.status, ListingStatus::Ended);

    // A sold listing stays closed when the next day's live window opens.
    listing.update_phase(schedule.phase_at_time(&clock_at_utc(13, 30).now()));
    assert_eq!(listing.phase, AuctionPhase::Silent);
    assert_eq!(listing.status, ListingStatus::Ended);
    assert_eq!(
        listing.record_bid(51_000.0, &rules),
        Err(BidRejection::NotActive(ListingStatus::Ended))
    );
}

// ===========================================================================
// Watcher
// ===========================================================================

#[tokio::test]
async fn watcher_reports_current_phase_first() {
    let clock: Arc<dyn Clock> = Arc::new(clock_at_utc(14, 0)); // 17:00 local
    let (tx, mut rx) = mpsc::channel(4);
    let handle = tokio::spawn(watch::run(clock, PhaseSchedule::default(), tx));

    match rx.recv().await {
        Some(PhaseEvent::Current { phase, .. }) => assert_eq!(phase, AuctionPhase::Live),
        other => panic!("expected Current event, got {other:?}"),
    }

    drop(rx);
    handle.await.unwrap().unwrap();
}
