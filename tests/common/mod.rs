#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use dealbook::domain::request::PolicyContext;
use dealbook::domain::vendor::{ExchangePolicy, ReliabilityStats, VendorGuardrails};
use dealbook::{
    Currency, Money, PaymentTerms, Request, RequestId, RiskLevel, VendorId, VendorProfile,
};

/// A CRM request with an annual budget ceiling and a soc2 requirement.
pub fn make_request(budget_total: f64, quantity: u32) -> Request {
    Request {
        request_id: RequestId::new("req-crm-001"),
        category: "crm".to_string(),
        description: "CRM software for the sales organization".to_string(),
        quantity,
        budget_max: Money(budget_total),
        currency: Currency::Usd,
        billing_cadence: None,
        must_haves: ["crm".to_string()].into(),
        nice_to_haves: ["email_integration".to_string()].into(),
        compliance_requirements: ["soc2".to_string()].into(),
        policy: PolicyContext::default(),
        region: None,
        timeline_days: None,
    }
}

/// A vendor quoting one list price for all quantities.
pub fn make_vendor(name: &str, list_price: f64, floor_price: f64) -> VendorProfile {
    VendorProfile {
        vendor_id: VendorId::new(name),
        name: name.to_string(),
        capability_tags: [
            "crm".to_string(),
            "lead_management".to_string(),
            "pipeline_tracking".to_string(),
            "email_integration".to_string(),
        ]
        .into(),
        certifications: ["soc2".to_string()].into(),
        regions: BTreeSet::new(),
        price_tiers: BTreeMap::from([(1, Money(list_price))]),
        billing_cadence: None,
        guardrails: VendorGuardrails {
            price_floor: Money(floor_price),
            payment_terms_allowed: vec![
                PaymentTerms::Net15,
                PaymentTerms::Net30,
                PaymentTerms::Net45,
            ],
            term_months_offered: BTreeSet::new(),
        },
        reliability: ReliabilityStats::default(),
        risk_level: RiskLevel::Low,
        exchange_policy: ExchangePolicy::default(),
        lead_time_days: 30,
    }
}

/// Vendor variant with explicit reliability, for ranking tie-breaks.
pub fn make_vendor_with_sla(name: &str, list: f64, floor: f64, sla: f64) -> VendorProfile {
    let mut vendor = make_vendor(name, list, floor);
    vendor.reliability = ReliabilityStats { sla, uptime: sla };
    vendor
}
