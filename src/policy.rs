use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    domain::{
        Actor,
        offer::OfferComponents,
        request::Request,
        vendor::VendorProfile,
    },
    pricing::TcoCalculator,
};

/// How violations affect a running session.
///
/// In `Simulation` mode violations are recorded and the session continues;
/// in `Enforce` mode any hard violation terminates the session as rejected.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Simulation,
    Enforce,
}

/// Violation severity. Hard violations make an offer ineligible to be the
/// session's accepted final offer; soft violations only warn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Hard,
    Soft,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    // Request-side (policy)
    BudgetExceeded,
    MissingCertification,
    RegionUnsupported,
    TimelineUnmet,
    CurrencyMismatch,
    ExcessiveRisk,

    // Vendor-side (guardrail)
    BelowPriceFloor,
    PaymentTermsDisallowed,
    TermNotOffered,
    AboveListCeiling,
}

/// One structured violation. `Display` renders `<kind>: <detail>`, which is
/// also the format used for terminal outcome reasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub detail: String,
}

impl Violation {
    pub fn hard(kind: ViolationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Hard,
            detail: detail.into(),
        }
    }

    pub fn soft(kind: ViolationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Soft,
            detail: detail.into(),
        }
    }

    pub fn is_hard(&self) -> bool {
        self.severity == Severity::Hard
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

pub fn has_hard(violations: &[Violation]) -> bool {
    violations.iter().any(Violation::is_hard)
}

/// Request-side policy checker: budget cap, compliance, region, timeline,
/// currency coherence.
#[derive(Debug, Clone, Default)]
pub struct PolicyChecker {
    tco: TcoCalculator,
}

impl PolicyChecker {
    pub fn new(tco: TcoCalculator) -> Self {
        Self { tco }
    }

    /// Validate an offer against the request's policy envelope.
    ///
    /// Pure and idempotent: two calls with identical inputs return
    /// identical violation lists.
    pub fn validate(
        &self,
        request: &Request,
        offer: &OfferComponents,
        vendor: &VendorProfile,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();

        if offer.currency != request.currency {
            violations.push(Violation::hard(
                ViolationKind::CurrencyMismatch,
                format!("{} offered, {} requested", offer.currency, request.currency),
            ));
        }

        let tco = self.tco.tco(offer, request.billing_cadence);
        let budget = request.budget_for_term(offer.term_months);
        if tco > budget {
            violations.push(Violation::hard(
                ViolationKind::BudgetExceeded,
                format!("tco {:.2} exceeds budget {:.2}", tco.0, budget.0),
            ));
        }

        for cert in vendor.missing_certifications(&request.compliance_requirements) {
            violations.push(Violation::hard(ViolationKind::MissingCertification, cert));
        }

        if let Some(region) = &request.region {
            if !vendor.serves_region(region) {
                violations.push(Violation::hard(
                    ViolationKind::RegionUnsupported,
                    region.clone(),
                ));
            }
        }

        if let Some(timeline) = request.timeline_days {
            let lead = offer.delivery_days.unwrap_or(vendor.lead_time_days);
            if lead > timeline {
                violations.push(Violation::soft(
                    ViolationKind::TimelineUnmet,
                    format!("lead time {lead}d exceeds timeline {timeline}d"),
                ));
            }
        }

        if vendor.risk_level.normalized() > request.policy.max_risk.normalized() {
            violations.push(Violation::soft(
                ViolationKind::ExcessiveRisk,
                format!("vendor risk {} above threshold", vendor.risk_level),
            ));
        }

        violations
    }
}

/// Vendor-side guardrail checker: price floor, allowed payment terms,
/// offered contract lengths, and the list-price ceiling.
///
/// A proposal that breaches the *counterparty's* guardrails is a legal
/// anchor: a buyer may bid below the seller's floor. The same breach on the
/// proposer's own side is hard.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardrailChecker;

impl GuardrailChecker {
    pub fn vet(
        &self,
        vendor: &VendorProfile,
        offer: &OfferComponents,
        proposed_by: Actor,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let floor = vendor.guardrails.price_floor;
        let list = vendor.list_price_for(offer.quantity);

        if offer.unit_price < floor {
            let violation = match proposed_by {
                // The seller never undercuts its own floor.
                Actor::Seller => Violation::hard(
                    ViolationKind::BelowPriceFloor,
                    format!("{:.2} below floor {:.2}", offer.unit_price.0, floor.0),
                ),
                // A buyer anchor below the floor is aggressive but legal.
                Actor::Buyer => Violation::soft(
                    ViolationKind::BelowPriceFloor,
                    format!("{:.2} below floor {:.2}", offer.unit_price.0, floor.0),
                ),
            };
            violations.push(violation);
        }

        if list.is_positive() && offer.unit_price.0 > list.0 * 1.1 {
            violations.push(Violation::hard(
                ViolationKind::AboveListCeiling,
                format!("{:.2} above 110% of list {:.2}", offer.unit_price.0, list.0),
            ));
        }

        if !vendor.guardrails.allows_payment(offer.payment_terms) {
            violations.push(Violation::hard(
                ViolationKind::PaymentTermsDisallowed,
                offer.payment_terms.to_string(),
            ));
        }

        if !vendor.guardrails.offers_term(offer.term_months) {
            violations.push(Violation::hard(
                ViolationKind::TermNotOffered,
                format!("{} months", offer.term_months),
            ));
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Currency, Money, PaymentTerms, RequestId, RiskLevel, VendorId,
        request::PolicyContext,
        vendor::{ExchangePolicy, ReliabilityStats, VendorGuardrails},
    };
    use std::collections::{BTreeMap, BTreeSet};

    fn request() -> Request {
        Request {
            request_id: RequestId::new("req-test"),
            category: "crm".to_string(),
            description: "CRM software".to_string(),
            quantity: 100,
            budget_max: Money(110_000.0),
            currency: Currency::Usd,
            billing_cadence: None,
            must_haves: BTreeSet::new(),
            nice_to_haves: BTreeSet::new(),
            compliance_requirements: ["soc2".to_string()].into(),
            policy: PolicyContext {
                budget_cap: Money(200_000.0),
                max_risk: RiskLevel::Medium,
            },
            region: Some("eu-west".to_string()),
            timeline_days: Some(45),
        }
    }

    fn vendor() -> VendorProfile {
        VendorProfile {
            vendor_id: VendorId::new("vendor-test"),
            name: "TestVendor".to_string(),
            capability_tags: BTreeSet::new(),
            certifications: ["soc2".to_string()].into(),
            regions: ["eu-west".to_string()].into(),
            price_tiers: BTreeMap::from([(1, Money(1200.0))]),
            billing_cadence: None,
            guardrails: VendorGuardrails {
                price_floor: Money(1000.0),
                payment_terms_allowed: vec![PaymentTerms::Net15, PaymentTerms::Net30],
                term_months_offered: [12, 24, 36].into(),
            },
            reliability: ReliabilityStats::default(),
            risk_level: RiskLevel::Low,
            exchange_policy: ExchangePolicy::default(),
            lead_time_days: 30,
        }
    }

    fn offer(price: f64) -> OfferComponents {
        OfferComponents::new(Money(price), Currency::Usd, 100, 12, PaymentTerms::Net30)
    }

    #[test]
    fn clean_offer_passes_both_checks() {
        let checker = PolicyChecker::default();
        let violations = checker.validate(&request(), &offer(1050.0), &vendor());
        assert!(violations.is_empty(), "{violations:?}");

        let guardrails = GuardrailChecker;
        assert!(guardrails
            .vet(&vendor(), &offer(1050.0), Actor::Seller)
            .is_empty());
    }

    #[test]
    fn budget_breach_is_hard() {
        let checker = PolicyChecker::default();
        let violations = checker.validate(&request(), &offer(1200.0), &vendor());
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::BudgetExceeded && v.is_hard()));
    }

    #[test]
    fn missing_certification_renders_with_detail() {
        let mut request = request();
        request
            .compliance_requirements
            .insert("gdpr".to_string());
        let checker = PolicyChecker::default();
        let violations = checker.validate(&request, &offer(1050.0), &vendor());
        let cert = violations
            .iter()
            .find(|v| v.kind == ViolationKind::MissingCertification)
            .unwrap();
        assert_eq!(cert.to_string(), "missing_certification: gdpr");
    }

    #[test]
    fn currency_mismatch_is_hard() {
        let checker = PolicyChecker::default();
        let mut foreign = offer(1050.0);
        foreign.currency = Currency::Eur;
        let violations = checker.validate(&request(), &foreign, &vendor());
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::CurrencyMismatch && v.is_hard()));
    }

    #[test]
    fn buyer_may_anchor_below_floor_but_seller_may_not() {
        let guardrails = GuardrailChecker;
        let low = offer(900.0);

        let as_buyer = guardrails.vet(&vendor(), &low, Actor::Buyer);
        assert!(!has_hard(&as_buyer));
        assert_eq!(as_buyer.len(), 1);

        let as_seller = guardrails.vet(&vendor(), &low, Actor::Seller);
        assert!(has_hard(&as_seller));
    }

    #[test]
    fn list_ceiling_and_payment_and_term_guardrails() {
        let guardrails = GuardrailChecker;

        let too_high = offer(1400.0);
        assert!(has_hard(&guardrails.vet(&vendor(), &too_high, Actor::Seller)));

        let mut net45 = offer(1100.0);
        net45.payment_terms = PaymentTerms::Net45;
        assert!(has_hard(&guardrails.vet(&vendor(), &net45, Actor::Seller)));

        let mut odd_term = offer(1100.0);
        odd_term.term_months = 7;
        assert!(has_hard(&guardrails.vet(&vendor(), &odd_term, Actor::Seller)));
    }

    #[test]
    fn validation_is_idempotent() {
        let checker = PolicyChecker::default();
        let request = request();
        let vendor = vendor();
        let offer = offer(1300.0);

        let first = checker.validate(&request, &offer, &vendor);
        let second = checker.validate(&request, &offer, &vendor);
        assert_eq!(first, second);
    }
}
