use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use anyhow::Result;
use dealbook::domain::request::PolicyContext;
use dealbook::domain::vendor::{ExchangePolicy, ReliabilityStats, VendorGuardrails};
use dealbook::{
    Coordinator, Currency, EngineConfig, Money, NegotiationPlan, PaymentTerms,
    PersonalityPreset, Request, RequestId, RiskLevel, VendorId, VendorProfile,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    println!("Negotiating one CRM request against three vendors...");

    let start = Instant::now();
    let coordinator = Coordinator::new(EngineConfig::default().with_random_seed(42))?;
    let plan = NegotiationPlan::default()
        .with_max_rounds(6)
        .with_personality(PersonalityPreset::Cooperative);

    let reports = coordinator
        .negotiate(crm_request(), vendor_shortlist(), plan)
        .await?;
    let elapsed = start.elapsed();

    println!("\n--- Ranked outcomes ({elapsed:?}) ---");
    for (position, report) in reports.iter().enumerate() {
        let price = report
            .final_offer
            .as_ref()
            .map(|offer| format!("{:.2}", offer.components.unit_price.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}. {:<12} outcome={:<10} rounds={} final_price={} savings={:.1}%",
            position + 1,
            report.vendor_name,
            report.outcome.to_string(),
            report.rounds,
            price,
            report.savings_pct * 100.0,
        );
    }

    Ok(())
}

// ================================================================================================
// Fixtures
// ================================================================================================

fn crm_request() -> Request {
    Request {
        request_id: RequestId::new("req-crm-demo"),
        category: "crm".to_string(),
        description: "CRM seats for a 150-person sales org".to_string(),
        quantity: 150,
        budget_max: Money(172_500.0),
        currency: Currency::Usd,
        billing_cadence: None,
        must_haves: ["crm".to_string()].into(),
        nice_to_haves: ["email_integration".to_string()].into(),
        compliance_requirements: ["soc2".to_string()].into(),
        policy: PolicyContext::default(),
        region: None,
        timeline_days: Some(60),
    }
}

fn vendor_shortlist() -> Vec<VendorProfile> {
    vec![
        vendor("crm-pro", "CRM Pro", 1200.0, 1060.0, 0.999),
        vendor("pipeline-hq", "Pipeline HQ", 1150.0, 1000.0, 0.995),
        vendor("dealsmith", "Dealsmith", 1300.0, 1100.0, 0.990),
    ]
}

fn vendor(id: &str, name: &str, list: f64, floor: f64, sla: f64) -> VendorProfile {
    VendorProfile {
        vendor_id: VendorId::new(id),
        name: name.to_string(),
        capability_tags: [
            "crm".to_string(),
            "lead_management".to_string(),
            "email_integration".to_string(),
        ]
        .into(),
        certifications: ["soc2".to_string()].into(),
        regions: BTreeSet::new(),
        price_tiers: BTreeMap::from([(1, Money(list))]),
        billing_cadence: None,
        guardrails: VendorGuardrails {
            price_floor: Money(floor),
            payment_terms_allowed: vec![
                PaymentTerms::Net15,
                PaymentTerms::Net30,
                PaymentTerms::Net45,
            ],
            term_months_offered: BTreeSet::new(),
        },
        reliability: ReliabilityStats { sla, uptime: sla },
        risk_level: RiskLevel::Low,
        exchange_policy: ExchangePolicy {
            term_trade_rate: 0.04,
            payment_trade_rate: 0.02,
            value_add_offsets: BTreeMap::from([(
                "training_credits".to_string(),
                Money(5_000.0),
            )]),
        },
        lead_time_days: 30,
    }
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
