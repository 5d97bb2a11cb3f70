use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    domain::{
        Money,
        offer::{OfferComponents, OfferScore},
        request::Request,
        vendor::VendorProfile,
    },
    error::ConfigError,
    pricing::TcoCalculator,
};

/// Buyer-side composite utility weights. Must be non-negative and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub tco_fit: f64,
    pub spec_match: f64,
    pub compliance: f64,
    pub risk: f64,
    pub time: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            tco_fit: 0.4,
            spec_match: 0.2,
            compliance: 0.2,
            risk: 0.1,
            time: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = [
            self.tco_fit,
            self.spec_match,
            self.compliance,
            self.risk,
            self.time,
        ];
        if entries.iter().any(|w| *w < 0.0) {
            return Err(ConfigError::InvalidWeights(
                "weights must be non-negative".to_string(),
            ));
        }
        let sum: f64 = entries.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights(format!(
                "weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// One score dimension, for sensitivity reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ScoreDimension {
    TcoFit,
    SpecMatch,
    Compliance,
    Risk,
    Time,
}

/// Linear utility change for a ±10% perturbation of one dimension.
///
/// Exported to the explainability collaborator; never consulted during
/// negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub dimension: ScoreDimension,
    pub delta_up: f64,
    pub delta_down: f64,
}

/// Computes multi-criterion offer scores and composite utilities.
#[derive(Debug, Clone)]
pub struct ScoringService {
    weights: ScoreWeights,
    tco: TcoCalculator,
    /// In strict mode a single missing must-have zeroes the spec match.
    strict_spec_match: bool,
}

impl Default for ScoringService {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            tco: TcoCalculator::default(),
            strict_spec_match: false,
        }
    }
}

impl ScoringService {
    pub fn new(weights: ScoreWeights, tco: TcoCalculator) -> Result<Self, ConfigError> {
        weights.validate()?;
        Ok(Self {
            weights,
            tco,
            strict_spec_match: false,
        })
    }

    pub fn with_strict_spec_match(self, strict: bool) -> Self {
        Self {
            strict_spec_match: strict,
            ..self
        }
    }

    pub fn tco_calculator(&self) -> &TcoCalculator {
        &self.tco
    }

    /// Present-valued TCO of an offer, using the request's billing cadence.
    pub fn compute_tco(&self, offer: &OfferComponents, request: &Request) -> Money {
        self.tco.tco(offer, request.billing_cadence)
    }

    /// Score one (vendor, offer, request) triple from the buyer's seat.
    ///
    /// Pure: inputs are never mutated and two calls return identical scores.
    pub fn score_offer(
        &self,
        vendor: &VendorProfile,
        offer: &OfferComponents,
        request: &Request,
    ) -> OfferScore {
        let spec_match = self.spec_match(vendor, request);
        let compliance = if vendor
            .missing_certifications(&request.compliance_requirements)
            .is_empty()
        {
            1.0
        } else {
            0.0
        };

        let tco = self.compute_tco(offer, request);
        let budget = request.budget_for_term(offer.term_months);
        let tco_fit = if tco.is_positive() {
            (budget.0 / tco.0).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let risk = 1.0 - vendor.risk_level.normalized();
        let lead_days = offer.delivery_days.unwrap_or(vendor.lead_time_days);
        let time = 1.0 - (lead_days as f64 / 90.0).clamp(0.0, 1.0);

        let w = &self.weights;
        let utility = w.tco_fit * tco_fit
            + w.spec_match * spec_match
            + w.compliance * compliance
            + w.risk * risk
            + w.time * time;

        let score = OfferScore {
            spec_match,
            compliance,
            tco,
            tco_fit,
            risk,
            time,
            utility,
        };
        score.assert_bounded();
        score
    }

    /// Composite seller utility: margin fit blended with term-length and
    /// payment-speed preferences (weights 0.7 / 0.2 / 0.1).
    pub fn seller_utility(&self, offer: &OfferComponents, vendor: &VendorProfile) -> f64 {
        let list = vendor.list_price_for(offer.quantity);
        let margin = margin_fit(offer.unit_price, vendor.guardrails.price_floor, list);
        let term_preference = (offer.term_months as f64 / 36.0).min(1.0);
        let payment_preference = offer.payment_terms.seller_speed_preference();

        0.7 * margin + 0.2 * term_preference + 0.1 * payment_preference
    }

    /// Per-dimension linear utility deltas for a ±10% perturbation.
    pub fn sensitivity(&self, score: &OfferScore) -> Vec<SensitivityEntry> {
        ScoreDimension::iter()
            .map(|dimension| {
                let (weight, value) = match dimension {
                    ScoreDimension::TcoFit => (self.weights.tco_fit, score.tco_fit),
                    ScoreDimension::SpecMatch => (self.weights.spec_match, score.spec_match),
                    ScoreDimension::Compliance => (self.weights.compliance, score.compliance),
                    ScoreDimension::Risk => (self.weights.risk, score.risk),
                    ScoreDimension::Time => (self.weights.time, score.time),
                };
                SensitivityEntry {
                    dimension,
                    delta_up: weight * value * 0.1,
                    delta_down: -(weight * value * 0.1),
                }
            })
            .collect()
    }

    fn spec_match(&self, vendor: &VendorProfile, request: &Request) -> f64 {
        if request.must_haves.is_empty() {
            return 1.0;
        }
        let covered = request
            .must_haves
            .iter()
            .filter(|tag| vendor.capability_tags.contains(*tag))
            .count();
        if self.strict_spec_match && covered < request.must_haves.len() {
            return 0.0;
        }
        covered as f64 / request.must_haves.len() as f64
    }
}

/// Seller margin fit: 0 at the price floor, 1 at list price.
pub fn margin_fit(unit_price: Money, floor: Money, list: Money) -> f64 {
    let span = list.0 - floor.0;
    if span <= 0.0 {
        return if unit_price >= list { 1.0 } else { 0.0 };
    }
    ((unit_price.0 - floor.0) / span).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Currency, PaymentTerms, RequestId, RiskLevel, VendorId,
        request::PolicyContext,
        vendor::{ExchangePolicy, ReliabilityStats, VendorGuardrails},
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn request(budget_per_unit: f64, quantity: u32) -> Request {
        Request {
            request_id: RequestId::new("req-test"),
            category: "crm".to_string(),
            description: "CRM software".to_string(),
            quantity,
            budget_max: Money(budget_per_unit * quantity as f64),
            currency: Currency::Usd,
            billing_cadence: None,
            must_haves: ["crm".to_string()].into(),
            nice_to_haves: BTreeSet::new(),
            compliance_requirements: ["soc2".to_string()].into(),
            policy: PolicyContext::default(),
            region: None,
            timeline_days: None,
        }
    }

    fn vendor(list_price: f64, floor_price: f64) -> VendorProfile {
        VendorProfile {
            vendor_id: VendorId::new("vendor-test"),
            name: "TestVendor".to_string(),
            capability_tags: ["crm".to_string(), "pipeline_tracking".to_string()].into(),
            certifications: ["soc2".to_string()].into(),
            regions: BTreeSet::new(),
            price_tiers: BTreeMap::from([(1, Money(list_price))]),
            billing_cadence: None,
            guardrails: VendorGuardrails {
                price_floor: Money(floor_price),
                payment_terms_allowed: vec![PaymentTerms::Net30],
                term_months_offered: BTreeSet::new(),
            },
            reliability: ReliabilityStats::default(),
            risk_level: RiskLevel::Low,
            exchange_policy: ExchangePolicy::default(),
            lead_time_days: 30,
        }
    }

    fn offer(price: f64, quantity: u32) -> OfferComponents {
        OfferComponents::new(Money(price), Currency::Usd, quantity, 12, PaymentTerms::Net30)
    }

    #[test]
    fn default_weights_are_valid() {
        ScoreWeights::default().validate().unwrap();
    }

    #[test]
    fn lopsided_weights_are_rejected() {
        let weights = ScoreWeights {
            tco_fit: 0.9,
            ..ScoreWeights::default()
        };
        assert!(weights.validate().is_err());

        let negative = ScoreWeights {
            tco_fit: -0.1,
            spec_match: 0.5,
            compliance: 0.2,
            risk: 0.2,
            time: 0.2,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn buyer_utility_matches_the_weighted_blend() {
        let scoring = ScoringService::default();
        let request = request(900.0, 200);
        let vendor = vendor(1200.0, 980.0);
        let score = scoring.score_offer(&vendor, &offer(1200.0, 200), &request);

        // Annual cadence: TCO over 12 months equals price * quantity
        // (with NET_30 multiplier 1.0), so tco_fit = 900/1200 (discounted
        // slightly upward by present-valuing).
        let expected_fit = (request.budget_max.0 / score.tco.0).clamp(0.0, 1.0);
        let expected = 0.4 * expected_fit + 0.2 * 1.0 + 0.2 * 1.0 + 0.1 * 0.9 + 0.1 * score.time;
        assert!((score.utility - expected).abs() < 1e-9);
        assert_eq!(score.compliance, 1.0);
        assert_eq!(score.spec_match, 1.0);
    }

    #[test]
    fn utility_is_monotone_non_increasing_in_price() {
        let scoring = ScoringService::default();
        let request = request(900.0, 200);
        let vendor = vendor(1200.0, 980.0);

        let mut previous = f64::INFINITY;
        for price in [800.0, 900.0, 1000.0, 1100.0, 1200.0, 1400.0] {
            let score = scoring.score_offer(&vendor, &offer(price, 200), &request);
            assert!(score.utility <= previous + 1e-12);
            previous = score.utility;
        }
    }

    #[test]
    fn margin_fit_endpoints() {
        assert_eq!(margin_fit(Money(980.0), Money(980.0), Money(1200.0)), 0.0);
        assert_eq!(margin_fit(Money(1200.0), Money(980.0), Money(1200.0)), 1.0);
        let mid = margin_fit(Money(1090.0), Money(980.0), Money(1200.0));
        assert!(mid > 0.49 && mid < 0.51);
    }

    #[test]
    fn missing_certification_zeroes_compliance() {
        let scoring = ScoringService::default();
        let mut request = request(900.0, 200);
        request.compliance_requirements.insert("gdpr".to_string());
        let vendor = vendor(1200.0, 980.0);
        let score = scoring.score_offer(&vendor, &offer(1000.0, 200), &request);
        assert_eq!(score.compliance, 0.0);
    }

    #[test]
    fn strict_mode_zeroes_partial_spec_match() {
        let scoring = ScoringService::default().with_strict_spec_match(true);
        let mut request = request(900.0, 200);
        request.must_haves.insert("telephony".to_string());
        let vendor = vendor(1200.0, 980.0);
        let score = scoring.score_offer(&vendor, &offer(1000.0, 200), &request);
        assert_eq!(score.spec_match, 0.0);
    }

    #[test]
    fn seller_utility_prefers_fast_payment_and_long_terms() {
        let scoring = ScoringService::default();
        let vendor = vendor(1200.0, 980.0);

        let base = offer(1100.0, 200);
        let mut long_term = base.clone();
        long_term.term_months = 36;
        let mut fast_pay = base.clone();
        fast_pay.payment_terms = PaymentTerms::Net15;

        let u_base = scoring.seller_utility(&base, &vendor);
        assert!(scoring.seller_utility(&long_term, &vendor) > u_base);
        assert!(scoring.seller_utility(&fast_pay, &vendor) > u_base);
    }

    #[test]
    fn sensitivity_deltas_are_symmetric_and_ordered_by_weight() {
        let scoring = ScoringService::default();
        let request = request(900.0, 200);
        let vendor = vendor(1200.0, 980.0);
        let score = scoring.score_offer(&vendor, &offer(1000.0, 200), &request);

        let entries = scoring.sensitivity(&score);
        assert_eq!(entries.len(), 5);
        for entry in &entries {
            assert!((entry.delta_up + entry.delta_down).abs() < 1e-12);
        }
    }

    #[test]
    fn score_offer_does_not_mutate_inputs() {
        let scoring = ScoringService::default();
        let request = request(900.0, 200);
        let vendor = vendor(1200.0, 980.0);
        let offer = offer(1000.0, 200);

        let first = scoring.score_offer(&vendor, &offer, &request);
        let second = scoring.score_offer(&vendor, &offer, &request);
        assert_eq!(first, second);
    }
}
