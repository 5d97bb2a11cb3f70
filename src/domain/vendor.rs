use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{BillingCadence, Money, PaymentTerms, RiskLevel, VendorId};

/// Vendor-side hard constraints on what the seller agent may concede.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorGuardrails {
    /// The seller never counters below this unit price.
    pub price_floor: Money,

    /// Payment schedules the vendor can operate.
    pub payment_terms_allowed: Vec<PaymentTerms>,

    /// Contract lengths the vendor sells. Empty means unrestricted.
    pub term_months_offered: BTreeSet<u32>,
}

impl VendorGuardrails {
    pub fn allows_payment(&self, terms: PaymentTerms) -> bool {
        self.payment_terms_allowed.is_empty() || self.payment_terms_allowed.contains(&terms)
    }

    pub fn offers_term(&self, term_months: u32) -> bool {
        self.term_months_offered.is_empty() || self.term_months_offered.contains(&term_months)
    }
}

/// Operational reliability statistics, used as the final ranking tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityStats {
    /// Contractual service-level attainment, in [0, 1].
    pub sla: f64,

    /// Observed trailing uptime, in [0, 1].
    pub uptime: f64,
}

impl Default for ReliabilityStats {
    fn default() -> Self {
        Self {
            sla: 0.99,
            uptime: 0.99,
        }
    }
}

/// Trade rates the vendor is known to honor: how much price movement a
/// concession on another axis can buy.
///
/// Rates are fractions of the unit price per step, where a term step is
/// 12 months of additional commitment and a payment step is one rank on
/// the payment-speed axis (see [`PaymentTerms::speed_rank`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangePolicy {
    /// Price drop per extra 12-month commitment step.
    pub term_trade_rate: f64,

    /// Price drop per one-step-faster payment schedule.
    pub payment_trade_rate: f64,

    /// Value-add credits the vendor can attach instead of price movement.
    pub value_add_offsets: BTreeMap<String, Money>,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            term_trade_rate: 0.04,
            payment_trade_rate: 0.02,
            value_add_offsets: BTreeMap::new(),
        }
    }
}

impl ExchangePolicy {
    /// Largest price relief (as a fraction of the floor) that term and
    /// payment trades can plausibly buy: two term steps (12 -> 36 months)
    /// and two payment steps (NET_45 -> NET_15), capped at 25%.
    pub fn max_price_relief(&self) -> f64 {
        (self.term_trade_rate * 2.0 + self.payment_trade_rate * 2.0).min(0.25)
    }
}

/// A counterparty. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorProfile {
    pub vendor_id: VendorId,

    pub name: String,

    /// Capabilities offered, matched against the request's must-haves.
    pub capability_tags: BTreeSet<String>,

    /// Certifications held (e.g. "soc2", "gdpr").
    pub certifications: BTreeSet<String>,

    /// Regions the vendor serves.
    pub regions: BTreeSet<String>,

    /// Quantity bracket (minimum quantity) to list unit price.
    pub price_tiers: BTreeMap<u32, Money>,

    /// Cadence the price tiers are quoted in. `None` means annual.
    pub billing_cadence: Option<BillingCadence>,

    pub guardrails: VendorGuardrails,

    pub reliability: ReliabilityStats,

    pub risk_level: RiskLevel,

    pub exchange_policy: ExchangePolicy,

    /// Typical days from signature to go-live.
    pub lead_time_days: u32,
}

impl VendorProfile {
    /// List unit price for a quantity: the largest bracket at or below the
    /// requested quantity, falling back to the smallest bracket quoted.
    pub fn list_price_for(&self, quantity: u32) -> Money {
        self.price_tiers
            .range(..=quantity)
            .next_back()
            .or_else(|| self.price_tiers.iter().next())
            .map(|(_, price)| *price)
            .unwrap_or(Money::ZERO)
    }

    /// Certifications from `required` that the vendor does not hold.
    pub fn missing_certifications<'a>(
        &self,
        required: impl IntoIterator<Item = &'a String>,
    ) -> Vec<String> {
        required
            .into_iter()
            .filter(|cert| !self.certifications.contains(*cert))
            .cloned()
            .collect()
    }

    pub fn serves_region(&self, region: &str) -> bool {
        self.regions.is_empty() || self.regions.contains(region)
    }
}
