// === Public Modules (The Canonical Paths) ===
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod events;
pub mod policy;
pub mod pricing;
pub mod rationale;
pub mod scoring;
pub mod session;

// === Private Implementation Details ===
mod macros;

// === Facades (Re-exporting the common surface) ===
pub use crate::config::EngineConfig;
pub use crate::coordinator::{Coordinator, SessionReport};
pub use crate::domain::{
    Actor, BillingCadence, Currency, Money, PaymentTerms, RequestId, RiskLevel, SessionId,
    VendorId,
};
pub use crate::domain::{offer::OfferComponents, request::Request, vendor::VendorProfile};
pub use crate::error::{DealbookError, DealbookResult};
pub use crate::policy::RunMode;
pub use crate::session::{NegotiationPlan, SessionOutcome, machine::Collaborators};
pub use crate::session::personality::PersonalityPreset;
