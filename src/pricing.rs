use serde::{Deserialize, Serialize};

use crate::{
    domain::{BillingCadence, Money, offer::OfferComponents},
    error::ConfigError,
};

/// Annual discount rate used for present-valuing future payments.
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.05;

/// Convert a unit amount into an annual figure based on its billing cadence.
///
/// An absent cadence is a pass-through: the amount is assumed annual
/// already. The operation is idempotent over annual figures.
pub fn annualize(amount: Money, cadence: Option<BillingCadence>) -> Money {
    match cadence {
        Some(cadence) => amount * cadence.annualization_factor(),
        None => amount,
    }
}

/// Normalize an aggregate budget into an annual amount.
pub fn normalize_budget(budget_total: Money, cadence: Option<BillingCadence>) -> Money {
    annualize(budget_total, cadence)
}

/// A 0..1 ratio expressing how well a unit price fits the per-unit budget.
///
/// Returns 0.0 for degenerate inputs (non-positive budget or list price).
pub fn price_fit_ratio(budget_unit_annual: Money, list_price_annual: Money) -> f64 {
    if !budget_unit_annual.is_positive() || !list_price_annual.is_positive() {
        return 0.0;
    }
    (budget_unit_annual.0 / list_price_annual.0).clamp(0.0, 1.0)
}

/// Total-cost-of-ownership calculator.
///
/// TCO is the present-valued sum of the monthly payments over the contract
/// term. Each monthly payment is the annualized unit price divided back to
/// a monthly figure, times quantity, adjusted for the payment-term cash-flow
/// multiplier and any prepayment discount, then discounted at `rate / 12`
/// per elapsed month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TcoCalculator {
    discount_rate_annual: f64,
}

impl Default for TcoCalculator {
    fn default() -> Self {
        Self {
            discount_rate_annual: DEFAULT_DISCOUNT_RATE,
        }
    }
}

impl TcoCalculator {
    pub fn new(discount_rate_annual: f64) -> Result<Self, ConfigError> {
        if !(0.0..1.0).contains(&discount_rate_annual) {
            return Err(ConfigError::OutOfRange {
                knob: "discount_rate_annual",
                value: discount_rate_annual,
            });
        }
        Ok(Self {
            discount_rate_annual,
        })
    }

    pub fn discount_rate_annual(&self) -> f64 {
        self.discount_rate_annual
    }

    /// Present-valued total cost of ownership for an offer quoted at the
    /// given billing cadence.
    pub fn tco(&self, offer: &OfferComponents, cadence: Option<BillingCadence>) -> Money {
        let annual_unit = annualize(offer.unit_price, cadence);
        let mut monthly_payment = annual_unit.0 / 12.0
            * offer.quantity as f64
            * offer.payment_terms.tco_multiplier();
        if let Some(prepay) = offer.prepay_discount {
            monthly_payment *= 1.0 - prepay;
        }

        let monthly_rate = self.discount_rate_annual / 12.0;
        let total = (0..offer.term_months)
            .map(|month| monthly_payment / (1.0 + monthly_rate).powi(month as i32))
            .sum();
        Money(total)
    }
}
