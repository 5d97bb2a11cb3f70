use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, Currency, Money, OfferId, PaymentTerms, RequestId, VendorId};

/// One concrete proposal on the table.
///
/// The unit price is quoted at the request's billing cadence; cadence
/// normalization happens in the pricing module, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferComponents {
    pub unit_price: Money,

    pub currency: Currency,

    pub quantity: u32,

    pub term_months: u32,

    pub payment_terms: PaymentTerms,

    /// Named credits attached to the offer (e.g. training credits), valued
    /// in the offer currency. Ordered map so serialized offers are stable.
    pub value_adds: BTreeMap<String, Money>,

    pub delivery_days: Option<u32>,

    /// Optional prepayment discount as a fraction (0.05 = 5%), granted when
    /// the buyer pays the full term up front.
    pub prepay_discount: Option<f64>,
}

impl OfferComponents {
    pub fn new(
        unit_price: Money,
        currency: Currency,
        quantity: u32,
        term_months: u32,
        payment_terms: PaymentTerms,
    ) -> Self {
        Self {
            unit_price,
            currency,
            quantity,
            term_months,
            payment_terms,
            value_adds: BTreeMap::new(),
            delivery_days: None,
            prepay_discount: None,
        }
    }

    pub fn with_value_add(mut self, name: impl Into<String>, value: Money) -> Self {
        self.value_adds.insert(name.into(), value);
        self
    }

    pub fn with_delivery_days(mut self, days: u32) -> Self {
        self.delivery_days = Some(days);
        self
    }

    pub fn with_prepay_discount(mut self, fraction: f64) -> Self {
        self.prepay_discount = Some(fraction);
        self
    }

    /// Total monetary value of attached credits.
    pub fn value_add_total(&self) -> Money {
        self.value_adds.values().copied().sum()
    }
}

/// Per-offer metric bundle produced by the scoring service.
///
/// All dimensionless fields live in [0, 1]; a value outside that interval is
/// a scoring-service bug, asserted at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfferScore {
    /// Fraction of must-have capabilities covered.
    pub spec_match: f64,

    /// 1.0 when every required certification is held, else 0.0.
    pub compliance: f64,

    /// Present-valued total cost of ownership.
    pub tco: Money,

    /// How comfortably the TCO fits the budget.
    pub tco_fit: f64,

    /// Inverse of normalized vendor risk.
    pub risk: f64,

    /// Time-to-value score derived from lead time.
    pub time: f64,

    /// Composite buyer utility.
    pub utility: f64,
}

impl OfferScore {
    /// Panics when a dimension escaped [0, 1]. Scores are contract-checked
    /// at the seam rather than revalidated by every consumer.
    pub fn assert_bounded(&self) {
        for (name, value) in [
            ("spec_match", self.spec_match),
            ("compliance", self.compliance),
            ("tco_fit", self.tco_fit),
            ("risk", self.risk),
            ("time", self.time),
            ("utility", self.utility),
        ] {
            assert!(
                (0.0..=1.0).contains(&value),
                "score dimension `{name}` out of bounds: {value}"
            );
        }
    }
}

/// A scored offer bound to its request and vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: OfferId,
    pub request_id: RequestId,
    pub vendor_id: VendorId,
    pub components: OfferComponents,
    pub score: OfferScore,
}

impl Offer {
    /// Stable offer identifier: `<request>-<vendor>-<actor>-<round>`.
    pub fn make_id(request: &RequestId, vendor: &VendorId, actor: Actor, round: u32) -> OfferId {
        OfferId::new(format!(
            "{request}-{vendor}-{}-{round}",
            actor.to_string().to_lowercase()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_adds_sum() {
        let offer = OfferComponents::new(Money(100.0), Currency::Usd, 10, 12, PaymentTerms::Net30)
            .with_value_add("training_credits", Money(5000.0))
            .with_value_add("premium_support", Money(1200.0));
        assert_eq!(offer.value_add_total(), Money(6200.0));
    }

    #[test]
    fn offer_ids_are_stable() {
        let id = Offer::make_id(
            &RequestId::new("req-1"),
            &VendorId::new("acme"),
            Actor::Seller,
            3,
        );
        assert_eq!(id.as_str(), "req-1-acme-seller-3");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn out_of_bounds_score_panics() {
        let score = OfferScore {
            spec_match: 1.2,
            compliance: 1.0,
            tco: Money(1.0),
            tco_fit: 1.0,
            risk: 1.0,
            time: 1.0,
            utility: 1.0,
        };
        score.assert_bounded();
    }
}
