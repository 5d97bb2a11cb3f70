use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{BillingCadence, Currency, Money, RequestId, RiskLevel},
    error::PolicyError,
};

/// Buyer-side policy envelope attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Hard annual spending cap. The budget ceiling on the request must not
    /// exceed this value.
    pub budget_cap: Money,

    /// Maximum tolerated counterparty risk classification.
    pub max_risk: RiskLevel,
}

impl Default for PolicyContext {
    fn default() -> Self {
        Self {
            budget_cap: Money(f64::MAX),
            max_risk: RiskLevel::High,
        }
    }
}

/// A procurement intent. Immutable once negotiation begins.
///
/// The budget ceiling is stored normalized to an **annual** figure; use
/// [`crate::pricing::normalize_budget`] when ingesting monthly budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: RequestId,

    /// Item category, e.g. "crm" or "security".
    pub category: String,

    pub description: String,

    /// Number of seats or units to procure.
    pub quantity: u32,

    /// Annualized budget ceiling for the whole request.
    pub budget_max: Money,

    pub currency: Currency,

    /// Cadence the unit prices are quoted in. `None` means annual.
    pub billing_cadence: Option<BillingCadence>,

    /// Capability tags the vendor must cover.
    pub must_haves: BTreeSet<String>,

    /// Capability tags that are welcome but not required.
    pub nice_to_haves: BTreeSet<String>,

    /// Certification tags the vendor must hold (e.g. "soc2", "gdpr").
    pub compliance_requirements: BTreeSet<String>,

    pub policy: PolicyContext,

    /// Delivery region the vendor must serve, if constrained.
    pub region: Option<String>,

    /// Days until the solution must be live, if constrained.
    pub timeline_days: Option<u32>,
}

impl Request {
    /// Annual budget available per unit.
    pub fn budget_unit_annual(&self) -> Money {
        if self.quantity == 0 {
            return Money::ZERO;
        }
        Money(self.budget_max.0 / self.quantity as f64)
    }

    /// Budget available for a contract of the given length.
    ///
    /// The request's ceiling is annual; a 24-month engagement may spend two
    /// annual budgets over its lifetime.
    pub fn budget_for_term(&self, term_months: u32) -> Money {
        Money(self.budget_max.0 * term_months as f64 / 12.0)
    }

    /// Static policy gate, checked before any session is created.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.budget_max.is_positive() {
            return Err(PolicyError::InvalidRequest {
                request: self.request_id.to_string(),
                reason: format!("budget_max must be positive, got {}", self.budget_max.0),
            });
        }
        if self.quantity == 0 {
            return Err(PolicyError::InvalidRequest {
                request: self.request_id.to_string(),
                reason: "quantity must be positive".to_string(),
            });
        }
        if self.budget_max > self.policy.budget_cap {
            return Err(PolicyError::InvalidRequest {
                request: self.request_id.to_string(),
                reason: format!(
                    "budget ceiling {} exceeds policy cap {}",
                    self.budget_max.0, self.policy.budget_cap.0
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(budget: f64, quantity: u32) -> Request {
        Request {
            request_id: RequestId::new("req-test"),
            category: "crm".to_string(),
            description: "CRM software".to_string(),
            quantity,
            budget_max: Money(budget),
            currency: Currency::Usd,
            billing_cadence: None,
            must_haves: BTreeSet::new(),
            nice_to_haves: BTreeSet::new(),
            compliance_requirements: BTreeSet::new(),
            policy: PolicyContext::default(),
            region: None,
            timeline_days: None,
        }
    }

    #[test]
    fn per_unit_budget() {
        let req = request(172_500.0, 150);
        assert!((req.budget_unit_annual().0 - 1150.0).abs() < 1e-9);
    }

    #[test]
    fn budget_scales_with_term() {
        let req = request(120_000.0, 100);
        assert!((req.budget_for_term(24).0 - 240_000.0).abs() < 1e-9);
        assert!((req.budget_for_term(12).0 - 120_000.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_budget_is_refused() {
        assert!(request(0.0, 10).validate().is_err());
        assert!(request(-5.0, 10).validate().is_err());
        assert!(request(100.0, 10).validate().is_ok());
    }
}
