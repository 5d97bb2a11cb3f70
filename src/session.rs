use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    domain::{Actor, Money, RequestId, SessionId, VendorId, offer::Offer, offer::OfferComponents},
    error::{ConfigError, SessionError},
    policy::Violation,
    session::{personality::PersonalityPreset, strategy::StrategyKind},
};

pub mod generator;
pub mod machine;
pub mod opponent;
pub mod personality;
pub mod strategy;

/// One step of the buyer's planned concession walk.
///
/// The schedule is the buyer's strategic spine: each negotiation round
/// consumes the next step, and the step biases which concession axis the
/// buyer trades on before the round-phase decision table refines the move.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConcessionStep {
    PriceAnchor,
    TermTrade,
    PaymentTrade,
    ValueAdd,
    FinalOffer,
}

/// Parameters chosen once per request, before any session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationPlan {
    /// Absolute cap on full negotiation rounds.
    pub max_rounds: u32,

    /// Buyer acceptance threshold on composite utility.
    pub min_acceptable_utility: f64,

    /// Ordered buyer concession schedule.
    pub concession_schedule: Vec<ConcessionStep>,

    /// Personality preset applied to both agents (the seller's copy is
    /// additionally adjusted for vendor context).
    pub personality: PersonalityPreset,
}

impl Default for NegotiationPlan {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            min_acceptable_utility: 0.7,
            concession_schedule: vec![
                ConcessionStep::PriceAnchor,
                ConcessionStep::TermTrade,
                ConcessionStep::PaymentTrade,
                ConcessionStep::ValueAdd,
                ConcessionStep::FinalOffer,
            ],
            personality: PersonalityPreset::Cooperative,
        }
    }
}

impl NegotiationPlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::OutOfRange {
                knob: "max_rounds",
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.min_acceptable_utility) {
            return Err(ConfigError::OutOfRange {
                knob: "min_acceptable_utility",
                value: self.min_acceptable_utility,
            });
        }
        if self.concession_schedule.is_empty() {
            return Err(ConfigError::EmptySchedule);
        }
        Ok(())
    }

    pub fn with_max_rounds(self, max_rounds: u32) -> Self {
        Self { max_rounds, ..self }
    }

    pub fn with_personality(self, personality: PersonalityPreset) -> Self {
        Self {
            personality,
            ..self
        }
    }

    pub fn with_min_acceptable_utility(self, min_acceptable_utility: f64) -> Self {
        Self {
            min_acceptable_utility,
            ..self
        }
    }
}

/// What the acting side decided to do with the counterparty's standing offer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecisionHint {
    Counter,
    Accept,
    Reject,
    Drop,
}

/// Terminal and non-terminal session outcomes.
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
pub enum SessionOutcome {
    #[default]
    InProgress,
    Accepted,
    Rejected,
    Dropped,
    Stalemate,
    MaxRounds,
}

impl SessionOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Immutable record appended once per turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMemory {
    /// Round number; 0 is the seller's opening anchor.
    pub round: u32,

    pub actor: Actor,

    pub offer: OfferComponents,

    pub strategy: StrategyKind,

    /// Buyer-side composite utility of the offer on the table.
    pub buyer_utility: f64,

    /// Seller-side composite utility of the offer on the table.
    pub seller_utility: f64,

    pub tco: Money,

    pub violations: Vec<Violation>,

    pub decision: DecisionHint,

    /// Set when the generated offer had to be clamped back inside the
    /// proposer's own guardrails.
    pub clamped: bool,

    pub rationale: String,

    /// Set when the rationale collaborator failed and the deterministic
    /// fallback text was used instead.
    pub rationale_degraded: bool,
}

/// One buyer-vendor negotiation. Mutated only by the round state machine;
/// frozen permanently once a terminal outcome is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub request_id: RequestId,
    pub vendor_id: VendorId,

    /// Highest round number seen so far.
    pub round: u32,

    pub memories: Vec<RoundMemory>,

    pub outcome: SessionOutcome,

    pub outcome_reason: Option<String>,

    pub final_offer: Option<Offer>,

    /// `(list - final) * quantity * term_months` on acceptance, else zero.
    pub savings: Money,
}

impl SessionState {
    pub fn new(session_id: SessionId, request_id: RequestId, vendor_id: VendorId) -> Self {
        Self {
            session_id,
            request_id,
            vendor_id,
            round: 0,
            memories: Vec::new(),
            outcome: SessionOutcome::InProgress,
            outcome_reason: None,
            final_offer: None,
            savings: Money::ZERO,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }

    /// Append a turn record. Rounds must be monotone and the session open.
    pub fn record(&mut self, memory: RoundMemory) -> Result<(), SessionError> {
        self.guard_open()?;
        if memory.round < self.round {
            return Err(SessionError::RoundOrder {
                session: self.session_id,
                round: memory.round,
            });
        }
        self.round = memory.round;
        self.memories.push(memory);
        Ok(())
    }

    /// Freeze the session with a terminal outcome. May be called once.
    pub fn finalize(
        &mut self,
        outcome: SessionOutcome,
        reason: impl Into<String>,
        final_offer: Option<Offer>,
        savings: Money,
    ) -> Result<(), SessionError> {
        self.guard_open()?;
        debug_assert!(outcome.is_terminal(), "finalize called with {outcome}");
        self.outcome = outcome;
        self.outcome_reason = Some(reason.into());
        self.final_offer = final_offer;
        self.savings = if outcome.is_accepted() {
            savings
        } else {
            Money::ZERO
        };
        Ok(())
    }

    /// Last offer made by the given side, if any.
    pub fn last_offer_by(&self, actor: Actor) -> Option<&RoundMemory> {
        self.memories.iter().rev().find(|m| m.actor == actor)
    }

    fn guard_open(&self) -> Result<(), SessionError> {
        if self.is_terminal() {
            return Err(SessionError::SessionClosed {
                session: self.session_id,
                outcome: self.outcome,
            });
        }
        Ok(())
    }
}
