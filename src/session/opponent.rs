use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::domain::{Money, offer::OfferComponents};

/// How many historical counterparty offers the model keeps.
const OFFER_WINDOW: usize = 3;

/// Elasticity learning step per observed move.
const ELASTICITY_STEP: f64 = 0.1;

/// Price movements below one currency unit count as a stall.
const PRICE_MOVE_EPSILON: f64 = 1.0;

/// Session-local beliefs about the counterparty's private constraints.
///
/// The model lives for exactly one session and is opaque to the other side.
/// It is serializable for debugging only; it never crosses a session
/// boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentModel {
    /// Lowest unit price the counterparty is believed to tolerate.
    /// Non-decreasing over the session.
    pub price_floor_estimate: Money,

    /// Highest unit price the counterparty is believed to reach for.
    pub price_ceiling_estimate: Money,

    /// How movable the counterparty is on price, in [0.1, 0.9].
    pub price_elasticity: f64,

    /// How movable the counterparty is on contract length.
    pub term_elasticity: f64,

    /// How movable the counterparty is on payment schedule.
    pub payment_elasticity: f64,

    /// Consecutive observed offers without a meaningful price move.
    pub consecutive_no_price_moves: u32,

    /// Bounded window of the counterparty's most recent offers.
    recent_offers: SmallVec<[OfferComponents; OFFER_WINDOW]>,
}

impl OpponentModel {
    /// Priors from a reference price (the counterparty's list price when we
    /// are the buyer, our budget ceiling when we are the seller): the floor
    /// is guessed at 80% of the reference, the ceiling at 110%.
    pub fn from_reference(reference: Money) -> Self {
        Self::with_priors(reference * 0.8, reference * 1.1)
    }

    /// Explicit priors. The learning layer, when enabled, feeds its own
    /// floor/ceiling here; nothing else about the engine changes.
    pub fn with_priors(floor: Money, ceiling: Money) -> Self {
        Self {
            price_floor_estimate: floor,
            price_ceiling_estimate: ceiling,
            price_elasticity: 0.5,
            term_elasticity: 0.5,
            payment_elasticity: 0.5,
            consecutive_no_price_moves: 0,
            recent_offers: SmallVec::new(),
        }
    }

    /// Fold one observed counter-offer into the beliefs.
    pub fn observe(&mut self, offer: &OfferComponents) {
        if let Some(previous) = self.recent_offers.last().cloned() {
            let price_change = offer.unit_price.0 - previous.unit_price.0;

            if price_change.abs() < PRICE_MOVE_EPSILON {
                self.consecutive_no_price_moves += 1;
                self.price_elasticity = (self.price_elasticity - ELASTICITY_STEP).max(0.1);
            } else {
                self.consecutive_no_price_moves = 0;
                self.price_elasticity = (self.price_elasticity + ELASTICITY_STEP).min(0.9);
                if price_change < 0.0 {
                    // A falling price reveals headroom just above its floor.
                    self.price_floor_estimate = self
                        .price_floor_estimate
                        .max(offer.unit_price - Money(50.0));
                }
            }

            if offer.term_months != previous.term_months {
                self.term_elasticity = (self.term_elasticity + ELASTICITY_STEP).min(0.9);
            }

            if offer.payment_terms != previous.payment_terms {
                self.payment_elasticity = (self.payment_elasticity + ELASTICITY_STEP).min(0.9);
            }
        }

        if self.recent_offers.len() == OFFER_WINDOW {
            self.recent_offers.remove(0);
        }
        self.recent_offers.push(offer.clone());
    }

    /// Perceived counterparty aggressiveness: a rigid, stalling opponent
    /// reads as aggressive, a movable one as accommodating.
    pub fn aggressiveness(&self) -> f64 {
        let rigidity = 1.0 - self.price_elasticity;
        let stall = (self.consecutive_no_price_moves.min(3)) as f64 / 3.0;
        (0.7 * rigidity + 0.3 * stall).clamp(0.0, 1.0)
    }

    pub fn recent_offers(&self) -> &[OfferComponents] {
        &self.recent_offers
    }
}
