// Per-listing effects of the trading phase: which phase a listing is in, how
// its opening price carries across a phase change, and which bids it takes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::phase::AuctionPhase;

// ---------------------------------------------------------------------------
// Bid rules
// ---------------------------------------------------------------------------

/// Allowed bid band for the fixed-rule phases, as fractions of the base price.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BidRules {
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl Default for BidRules {
    fn default() -> Self {
        Self {
            min_fraction: 0.9,
            max_fraction: 1.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BidRulesError {
    #[error("min_fraction must be in (0, 1], got {0}")]
    MinFraction(f64),

    #[error("max_fraction must be at least 1, got {0}")]
    MaxFraction(f64),
}

impl BidRules {
    pub fn validate(&self) -> Result<(), BidRulesError> {
        if !(self.min_fraction > 0.0 && self.min_fraction <= 1.0) {
            return Err(BidRulesError::MinFraction(self.min_fraction));
        }
        if !(self.max_fraction >= 1.0 && self.max_fraction.is_finite()) {
            return Err(BidRulesError::MaxFraction(self.max_fraction));
        }
        Ok(())
    }

    /// Inclusive `(min, max)` bid amounts around `base`.
    pub fn band(&self, base: f64) -> (f64, f64) {
        (base * self.min_fraction, base * self.max_fraction)
    }
}

// ---------------------------------------------------------------------------
// Bid outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BidDecision {
    /// Recorded as the new current bid; the auction stays open.
    Placed,
    /// Met the reserve in the silent market; the sale closes at this amount.
    AutoAccepted,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BidRejection {
    #[error("bid {amount} must be higher than the current bid {current}")]
    NotAboveCurrent { amount: f64, current: f64 },

    #[error("bid {amount} is outside the allowed range {min}-{max}")]
    OutOfRange { amount: f64, min: f64, max: f64 },

    #[error("bid amount must be a finite positive number, got {0}")]
    InvalidAmount(f64),

    #[error("listing is not open for bids (status: {0})")]
    NotActive(ListingStatus),
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Whether a listing is still trading, and how it finished if not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Active,
    /// Sold: a bid met the reserve.
    Ended,
    /// Closed without meeting the reserve; the car goes back on the market.
    Failed,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Ended => "ended",
            ListingStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The live room only hosts listings approved for it; others stay in the
/// silent market through live hours.
pub fn effective_phase(clock_phase: AuctionPhase, approved_for_live: bool) -> AuctionPhase {
    match clock_phase {
        AuctionPhase::Live if !approved_for_live => AuctionPhase::Silent,
        other => other,
    }
}

/// Price state of one listing, as far as phase rules need it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub phase: AuctionPhase,
    pub approved_for_live: bool,
    pub opening_price: Option<f64>,
    pub reserve_price: Option<f64>,
    pub minimum_bid: Option<f64>,
    #[serde(default)]
    pub current_bid: f64,
    #[serde(default)]
    pub status: ListingStatus,
}

impl Listing {
    pub fn new(phase: AuctionPhase, approved_for_live: bool) -> Self {
        Self {
            phase,
            approved_for_live,
            opening_price: None,
            reserve_price: None,
            minimum_bid: None,
            current_bid: 0.0,
            status: ListingStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn has_bids(&self) -> bool {
        self.current_bid > 0.0
    }

    /// Move the listing into the phase the clock reports. Leaving the live
    /// room for instant, or instant for silent, restarts the next phase from
    /// the price reached so far. Returns the phase the listing was in.
    /// Closed listings keep the phase they closed in.
    pub fn update_phase(&mut self, clock_phase: AuctionPhase) -> AuctionPhase {
        let previous = self.phase;
        if !self.is_active() {
            return previous;
        }
        let next = effective_phase(clock_phase, self.approved_for_live);

        let carries_price = matches!(
            (previous, next),
            (AuctionPhase::Live, AuctionPhase::Instant) | (AuctionPhase::Instant, AuctionPhase::Silent)
        );
        if carries_price && self.has_bids() {
            debug!(
                "{previous} -> {next}: opening price {:?} -> {}",
                self.opening_price, self.current_bid
            );
            self.opening_price = Some(self.current_bid);
        }

        self.phase = next;
        previous
    }

    /// Reference price for the bid band: opening, else reserve, else minimum
    /// bid, else the current bid (at least 1).
    pub fn base_price(&self) -> f64 {
        [self.opening_price, self.reserve_price, self.minimum_bid]
            .into_iter()
            .flatten()
            .find(|p| *p > 0.0)
            .unwrap_or_else(|| self.current_bid.max(1.0))
    }

    /// Decide whether `amount` is acceptable in the listing's current phase.
    /// Does not mutate; see [`Listing::record_bid`].
    pub fn evaluate_bid(&self, amount: f64, rules: &BidRules) -> Result<BidDecision, BidRejection> {
        if !self.is_active() {
            return Err(BidRejection::NotActive(self.status));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(BidRejection::InvalidAmount(amount));
        }
        if amount <= self.current_bid {
            return Err(BidRejection::NotAboveCurrent {
                amount,
                current: self.current_bid,
            });
        }

        match self.phase {
            AuctionPhase::Live => Ok(BidDecision::Placed),
            AuctionPhase::Instant | AuctionPhase::Silent => {
                let (min, max) = rules.band(self.base_price());
                if amount < min || amount > max {
                    return Err(BidRejection::OutOfRange { amount, min, max });
                }
                match self.reserve_price {
                    Some(reserve) if self.phase == AuctionPhase::Silent && amount >= reserve => {
                        Ok(BidDecision::AutoAccepted)
                    }
                    _ => Ok(BidDecision::Placed),
                }
            }
        }
    }

    /// Evaluate and, if accepted, make `amount` the current bid. An
    /// auto-accepted bid sells the listing.
    pub fn record_bid(&mut self, amount: f64, rules: &BidRules) -> Result<BidDecision, BidRejection> {
        let decision = self.evaluate_bid(amount, rules)?;
        self.current_bid = amount;
        if decision == BidDecision::AutoAccepted {
            debug!("Reserve met at {amount} in {} market, listing sold", self.phase);
            self.status = ListingStatus::Ended;
        }
        Ok(decision)
    }

    /// End trading on an active listing: sold if it has a bid that meets the
    /// reserve (any bid when no reserve is set), failed otherwise. A listing
    /// that is already closed is left as it is. Returns the resulting status.
    pub fn close(&mut self) -> ListingStatus {
        if !self.is_active() {
            return self.status;
        }
        let reserve_met = self.has_bids() && self.current_bid >= self.reserve_price.unwrap_or(0.0);
        self.status = if reserve_met {
            ListingStatus::Ended
        } else {
            ListingStatus::Failed
        };
        debug!("Listing closed at {} as {}", self.current_bid, self.status);
        self.status
    }
}
