use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    config::EngineConfig,
    domain::{
        Actor, Money, SessionId,
        offer::{Offer, OfferComponents},
        request::Request,
        vendor::VendorProfile,
    },
    error::{CollaboratorError, DealbookResult},
    events::{EventKind, EventSink, NullSink, SessionEvent, emit_with_retry},
    policy::{GuardrailChecker, PolicyChecker, RunMode, Violation, has_hard},
    pricing::annualize,
    rationale::{RationaleRequest, RationaleSource, TemplateRationale, resolve_rationale},
    scoring::ScoringService,
    session::{
        ConcessionStep, DecisionHint, NegotiationPlan, RoundMemory, SessionOutcome, SessionState,
        generator::{CounterOffer, GeneratedMove, GeneratorContext, generate},
        opponent::OpponentModel,
        personality::{PersonalityTraits, VendorContext, adjust_for_context},
        strategy::{
            StrategyContext, StrategyKind, select_buyer_strategy, select_seller_strategy,
        },
    },
};

/// Buyer acceptance also requires the counterparty's price to sit within
/// this fraction of list price from the acceptor's own standing number.
const ACCEPT_PRICE_PROXIMITY: f64 = 0.01;

/// Minimum seller-side utility for the seller to accept a buyer offer. The
/// floor guardrail protects the margin itself; this keeps the seller from
/// closing on term/payment combinations it has no appetite for.
const SELLER_ACCEPT_MIN_UTILITY: f64 = 0.25;

/// Price movements under ten currency units count as stagnant for
/// stalemate detection.
const STALEMATE_PRICE_EPSILON: f64 = 10.0;

/// External collaborator handles injected into sessions. No process-global
/// state: everything the engine talks to arrives through this bundle.
#[derive(Clone)]
pub struct Collaborators {
    pub events: Arc<dyn EventSink>,
    pub rationale: Arc<dyn RationaleSource>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            events: Arc::new(NullSink),
            rationale: Arc::new(TemplateRationale),
        }
    }
}

/// Single-session driver: alternates buyer and seller turns, detects
/// acceptance, rejection, stalemate and the round limit, and records one
/// [`RoundMemory`] per turn.
///
/// The machine is deterministic given its inputs: all randomness is drawn
/// from a [`StdRng`] seeded by hashing the engine seed with the request and
/// vendor ids. Suspension points exist only around collaborator calls; the
/// bargaining math itself never yields.
pub struct SessionMachine {
    request: Arc<Request>,
    vendor: Arc<VendorProfile>,
    plan: NegotiationPlan,
    config: EngineConfig,

    scoring: Arc<ScoringService>,
    policy: PolicyChecker,
    guardrails: GuardrailChecker,
    context: VendorContext,

    state: SessionState,

    /// The buyer's beliefs about the seller.
    buyer_model: OpponentModel,

    /// The seller's beliefs about the buyer.
    seller_model: OpponentModel,

    buyer_traits: PersonalityTraits,
    seller_traits: PersonalityTraits,

    /// Index into the plan's concession schedule, advanced on buyer turns.
    schedule_position: usize,

    buyer_finaled: bool,
    seller_finaled: bool,

    list_price: Money,
    rng: StdRng,
}

enum TurnOutcome {
    Continue,
    Terminal,
}

enum RecordResult {
    Recorded,
    /// The round deadline was blown while resolving collaborators; the
    /// session has already been finalized on the refusal path.
    DeadlineExceeded,
}

impl SessionMachine {
    pub fn new(
        request: Arc<Request>,
        vendor: Arc<VendorProfile>,
        plan: NegotiationPlan,
        config: EngineConfig,
        scoring: Arc<ScoringService>,
        context: VendorContext,
    ) -> DealbookResult<Self> {
        config.validate()?;
        plan.validate()?;
        request.validate()?;

        let seed = session_seed(config.random_seed, &request, &vendor);
        let session_id = SessionId(seed);
        let list_price = vendor.list_price_for(request.quantity);

        let base_traits = plan.personality.traits();
        let seller_traits = adjust_for_context(&base_traits, &context);

        let state = SessionState::new(
            session_id,
            request.request_id.clone(),
            vendor.vendor_id.clone(),
        );

        let policy = PolicyChecker::new(*scoring.tco_calculator());

        Ok(Self {
            buyer_model: OpponentModel::from_reference(list_price),
            seller_model: OpponentModel::from_reference(request.budget_unit_annual()),
            buyer_traits: base_traits,
            seller_traits,
            schedule_position: 0,
            buyer_finaled: false,
            seller_finaled: false,
            list_price,
            rng: StdRng::seed_from_u64(seed),
            state,
            request,
            vendor,
            plan,
            config,
            scoring,
            policy,
            guardrails: GuardrailChecker,
            context,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.state.session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the session to a terminal outcome and return the frozen state.
    #[tracing::instrument(skip_all, fields(session_id = %self.state.session_id, vendor = %self.vendor.vendor_id))]
    pub async fn run(
        mut self,
        collab: &Collaborators,
        cancel: &CancellationToken,
    ) -> DealbookResult<SessionState> {
        self.emit_started(collab).await;

        if let Some(()) = self.preflight_gates(collab).await? {
            return Ok(self.state);
        }

        if let TurnOutcome::Terminal = self.opening_anchor(collab).await? {
            return Ok(self.state);
        }

        for round in 1..=self.plan.max_rounds {
            if cancel.is_cancelled() {
                self.finalize(collab, SessionOutcome::Dropped, "cancelled", None)
                    .await?;
                return Ok(self.state);
            }

            if let TurnOutcome::Terminal = self.turn(collab, Actor::Buyer, round).await? {
                return Ok(self.state);
            }

            if cancel.is_cancelled() {
                self.finalize(collab, SessionOutcome::Dropped, "cancelled", None)
                    .await?;
                return Ok(self.state);
            }

            if let TurnOutcome::Terminal = self.turn(collab, Actor::Seller, round).await? {
                return Ok(self.state);
            }

            if self.stalemate_detected() {
                self.finalize(
                    collab,
                    SessionOutcome::Stalemate,
                    "no_meaningful_movement",
                    None,
                )
                .await?;
                return Ok(self.state);
            }
        }

        self.finalize(collab, SessionOutcome::MaxRounds, "round_limit_reached", None)
            .await?;
        Ok(self.state)
    }

    // ============================================================================================
    // Opening
    // ============================================================================================

    /// Compliance, region and ZOPA gates. Returns `Some(())` when the
    /// session terminated before the first round.
    async fn preflight_gates(&mut self, collab: &Collaborators) -> DealbookResult<Option<()>> {
        let missing = self
            .vendor
            .missing_certifications(&self.request.compliance_requirements);
        if let Some(cert) = missing.first() {
            let reason = format!("missing_certification: {cert}");
            self.finalize(collab, SessionOutcome::Rejected, reason, None)
                .await?;
            return Ok(Some(()));
        }

        if let Some(region) = &self.request.region {
            if !self.vendor.serves_region(region) {
                let reason = format!("region_unsupported: {region}");
                self.finalize(collab, SessionOutcome::Rejected, reason, None)
                    .await?;
                return Ok(Some(()));
            }
        }

        if !self.zopa_feasible() {
            self.finalize(collab, SessionOutcome::Dropped, "no_zopa", None)
                .await?;
            return Ok(Some(()));
        }

        Ok(None)
    }

    /// Zone-of-possible-agreement gate, with exchange-policy trades taken
    /// into account: a floor above budget can still be feasible when term
    /// and payment trades plausibly close the gap.
    fn zopa_feasible(&self) -> bool {
        let budget_unit = self.request.budget_unit_annual();
        let floor_annual = annualize(
            self.vendor.guardrails.price_floor,
            self.vendor.billing_cadence,
        );
        let relief = self.vendor.exchange_policy.max_price_relief();
        budget_unit.0 >= floor_annual.0 * (1.0 - relief)
    }

    /// The seller opens every session anchored at list price, NET_30,
    /// 12 months.
    async fn opening_anchor(&mut self, collab: &Collaborators) -> DealbookResult<TurnOutcome> {
        let components = OfferComponents::new(
            self.list_price,
            self.request.currency,
            self.request.quantity,
            12,
            crate::domain::PaymentTerms::Net30,
        )
        .with_delivery_days(self.vendor.lead_time_days);

        let counter = CounterOffer {
            components,
            rationale: "Opening list-price quote for the requested volume.".to_string(),
            clamped: false,
        };

        match self
            .record_turn(
                collab,
                Actor::Seller,
                0,
                StrategyKind::AnchorHigh,
                counter,
                DecisionHint::Counter,
            )
            .await?
        {
            RecordResult::Recorded => Ok(TurnOutcome::Continue),
            RecordResult::DeadlineExceeded => Ok(TurnOutcome::Terminal),
        }
    }

    // ============================================================================================
    // Turns
    // ============================================================================================

    async fn turn(
        &mut self,
        collab: &Collaborators,
        actor: Actor,
        round: u32,
    ) -> DealbookResult<TurnOutcome> {
        let own = self.standing_offer(actor);
        let counter = self
            .state
            .last_offer_by(actor.counterparty())
            .map(|m| m.offer.clone())
            .expect("counterparty has offered; the seller anchors at round 0");

        // Fold the counterparty's latest move into this side's beliefs.
        match actor {
            Actor::Buyer => self.buyer_model.observe(&counter),
            Actor::Seller => self.seller_model.observe(&counter),
        }

        let strategy = self.select_strategy(actor, round, &own, &counter);
        debug!(%actor, round, %strategy, "strategy selected");

        let jitter = if strategy == StrategyKind::GradualConcession {
            self.rng.random_range(0.95..=1.05)
        } else {
            1.0
        };

        let traits = match actor {
            Actor::Buyer => self.buyer_traits,
            Actor::Seller => self.seller_traits,
        };
        let opponent = match actor {
            Actor::Buyer => &self.buyer_model,
            Actor::Seller => &self.seller_model,
        };

        let generated = generate(&GeneratorContext {
            actor,
            strategy,
            own: &own,
            counter: &counter,
            vendor: &self.vendor,
            request: &self.request,
            traits: &traits,
            opponent,
            jitter,
        });

        let candidate = match generated {
            GeneratedMove::WalkAway => {
                let hold = CounterOffer {
                    components: own,
                    rationale: "The remaining gap cannot be closed on acceptable terms."
                        .to_string(),
                    clamped: false,
                };
                if let RecordResult::Recorded = self
                    .record_turn(collab, actor, round, strategy, hold, DecisionHint::Drop)
                    .await?
                {
                    self.finalize(collab, SessionOutcome::Dropped, "no_zopa", None)
                        .await?;
                }
                return Ok(TurnOutcome::Terminal);
            }
            GeneratedMove::Counter(counter_offer) => counter_offer,
        };

        if strategy == StrategyKind::FinalOffer {
            match actor {
                Actor::Buyer => self.buyer_finaled = true,
                Actor::Seller => self.seller_finaled = true,
            }
        }

        // Acceptance test: would this side rather take the standing offer
        // than send its own counter?
        if self.accepts(actor, &counter, &candidate.components) {
            let accepted = CounterOffer {
                components: counter.clone(),
                rationale: "The standing offer clears our bar; accepting.".to_string(),
                clamped: false,
            };
            if let RecordResult::DeadlineExceeded = self
                .record_turn(collab, actor, round, strategy, accepted, DecisionHint::Accept)
                .await?
            {
                return Ok(TurnOutcome::Terminal);
            }

            let score = self.scoring.score_offer(&self.vendor, &counter, &self.request);
            let final_offer = Offer {
                offer_id: Offer::make_id(
                    &self.request.request_id,
                    &self.vendor.vendor_id,
                    actor.counterparty(),
                    round,
                ),
                request_id: self.request.request_id.clone(),
                vendor_id: self.vendor.vendor_id.clone(),
                components: counter,
                score,
            };
            let reason = format!("accepted_by_{}", actor.to_string().to_lowercase());
            self.finalize(collab, SessionOutcome::Accepted, reason, Some(final_offer))
                .await?;
            return Ok(TurnOutcome::Terminal);
        }

        let violations = self.vet_candidate(actor, &candidate.components);
        let hard_violation = violations.iter().find(|v| v.is_hard()).cloned();

        let decision = if self.config.run_mode == RunMode::Enforce && hard_violation.is_some() {
            DecisionHint::Reject
        } else {
            DecisionHint::Counter
        };

        if let RecordResult::DeadlineExceeded = self
            .record_turn(collab, actor, round, strategy, candidate, decision)
            .await?
        {
            return Ok(TurnOutcome::Terminal);
        }

        if decision == DecisionHint::Reject {
            let reason = hard_violation
                .map(|v| v.to_string())
                .unwrap_or_else(|| "hard_violation".to_string());
            self.finalize(collab, SessionOutcome::Rejected, reason, None)
                .await?;
            return Ok(TurnOutcome::Terminal);
        }

        Ok(TurnOutcome::Continue)
    }

    /// This side's offer currently on the table. The buyer's first turn
    /// negotiates from a synthetic baseline at its per-unit budget.
    fn standing_offer(&self, actor: Actor) -> OfferComponents {
        if let Some(memory) = self.state.last_offer_by(actor) {
            return memory.offer.clone();
        }
        OfferComponents::new(
            self.request.budget_unit_annual(),
            self.request.currency,
            self.request.quantity,
            12,
            crate::domain::PaymentTerms::Net30,
        )
    }

    fn select_strategy(
        &mut self,
        actor: Actor,
        round: u32,
        own: &OfferComponents,
        counter: &OfferComponents,
    ) -> StrategyKind {
        let finaled = match actor {
            Actor::Buyer => self.buyer_finaled,
            Actor::Seller => self.seller_finaled,
        };
        if finaled {
            // One-shot semantics: a side that declared final only holds.
            return StrategyKind::HoldFirm;
        }

        let traits = match actor {
            Actor::Buyer => self.buyer_traits,
            Actor::Seller => self.seller_traits,
        };
        let opponent = match actor {
            Actor::Buyer => &self.buyer_model,
            Actor::Seller => &self.seller_model,
        };

        let gap_pct = if own.unit_price.is_positive() {
            (own.unit_price.0 - counter.unit_price.0).abs() / own.unit_price.0 * 100.0
        } else {
            100.0
        };

        let ctx = StrategyContext {
            round,
            total_rounds: self.plan.max_rounds,
            counterparty_aggressiveness: opponent.aggressiveness(),
            price_gap_pct: gap_pct,
            competitive_pressure: self.context.competitive_pressure,
            deal_importance: deal_importance(&traits, &self.context),
            traits,
        };

        match actor {
            Actor::Seller => select_seller_strategy(&ctx),
            Actor::Buyer => {
                let step = self.next_schedule_step(round, &ctx);
                select_buyer_strategy(&ctx, step)
            }
        }
    }

    /// Advance the buyer's concession schedule. Early rounds pin the anchor
    /// step; mid-game rounds consume the remaining steps in order and stick
    /// at the last one.
    fn next_schedule_step(
        &mut self,
        _round: u32,
        ctx: &StrategyContext,
    ) -> Option<ConcessionStep> {
        use crate::session::strategy::RoundPhase;

        match ctx.phase() {
            RoundPhase::Early => {
                self.schedule_position = 1;
                self.plan.concession_schedule.first().copied()
            }
            RoundPhase::Mid => {
                let step = self
                    .plan
                    .concession_schedule
                    .get(self.schedule_position)
                    .or_else(|| self.plan.concession_schedule.last())
                    .copied();
                self.schedule_position =
                    (self.schedule_position + 1).min(self.plan.concession_schedule.len());
                step
            }
            RoundPhase::Late => None,
        }
    }

    // ============================================================================================
    // Acceptance & Violations
    // ============================================================================================

    fn accepts(
        &self,
        actor: Actor,
        standing: &OfferComponents,
        own_candidate: &OfferComponents,
    ) -> bool {
        // Prices must have converged to within 1% of list before either side
        // considers closing.
        let proximity = (standing.unit_price.0 - own_candidate.unit_price.0).abs()
            < ACCEPT_PRICE_PROXIMITY * self.list_price.0;
        if !proximity {
            return false;
        }

        match actor {
            Actor::Buyer => {
                let score = self
                    .scoring
                    .score_offer(&self.vendor, standing, &self.request);
                let budget = self.request.budget_for_term(standing.term_months);
                let policy_violations =
                    self.policy.validate(&self.request, standing, &self.vendor);

                score.utility >= self.plan.min_acceptable_utility
                    && score.tco <= budget
                    && !has_hard(&policy_violations)
            }
            Actor::Seller => {
                let floor = self.vendor.guardrails.price_floor;
                let eligible = standing.unit_price >= floor
                    && self.vendor.guardrails.allows_payment(standing.payment_terms)
                    && self.vendor.guardrails.offers_term(standing.term_months);
                let utility = self.scoring.seller_utility(standing, &self.vendor);

                eligible && utility >= SELLER_ACCEPT_MIN_UTILITY
            }
        }
    }

    fn vet_candidate(&self, actor: Actor, components: &OfferComponents) -> Vec<Violation> {
        let mut violations = self
            .policy
            .validate(&self.request, components, &self.vendor);
        violations.extend(self.guardrails.vet(&self.vendor, components, actor));
        violations
    }

    // ============================================================================================
    // Recording, Events & Termination
    // ============================================================================================

    async fn record_turn(
        &mut self,
        collab: &Collaborators,
        actor: Actor,
        round: u32,
        strategy: StrategyKind,
        candidate: CounterOffer,
        decision: DecisionHint,
    ) -> DealbookResult<RecordResult> {
        let CounterOffer {
            components,
            rationale: fallback,
            clamped,
        } = candidate;

        let counter_memory = self.state.last_offer_by(actor.counterparty());
        let rationale_request = RationaleRequest {
            actor,
            strategy,
            offer: &components,
            counter: counter_memory.map(|m| &m.offer),
            fallback: &fallback,
        };

        let (rationale, rationale_degraded) = match resolve_rationale(
            collab.rationale.as_ref(),
            rationale_request,
            self.config.round_timeout,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(CollaboratorError::Timeout(_)) => {
                // Round deadline blown: counterparty refusal, round-limit path.
                info!(round, %actor, "round deadline exceeded; terminating session");
                self.finalize(collab, SessionOutcome::MaxRounds, "round_timeout", None)
                    .await?;
                return Ok(RecordResult::DeadlineExceeded);
            }
            Err(other) => return Err(other.into()),
        };

        let violations = self.vet_candidate(actor, &components);
        let score = self
            .scoring
            .score_offer(&self.vendor, &components, &self.request);
        let seller_utility = self.scoring.seller_utility(&components, &self.vendor);

        let memory = RoundMemory {
            round,
            actor,
            offer: components,
            strategy,
            buyer_utility: score.utility,
            seller_utility,
            tco: score.tco,
            violations,
            decision,
            clamped,
            rationale,
            rationale_degraded,
        };

        self.emit_round_completed(collab, &memory).await;
        self.state.record(memory)?;
        Ok(RecordResult::Recorded)
    }

    async fn finalize(
        &mut self,
        collab: &Collaborators,
        outcome: SessionOutcome,
        reason: impl Into<String>,
        final_offer: Option<Offer>,
    ) -> DealbookResult<()> {
        let reason = reason.into();
        let savings = final_offer
            .as_ref()
            .map(|offer| {
                let delta = self.list_price.0 - offer.components.unit_price.0;
                Money(delta * offer.components.quantity as f64 * offer.components.term_months as f64)
            })
            .unwrap_or(Money::ZERO);

        info!(%outcome, %reason, rounds = self.state.round, "session terminated");
        self.state
            .finalize(outcome, reason.clone(), final_offer, savings)?;
        self.emit_terminated(collab).await;
        Ok(())
    }

    fn stalemate_detected(&self) -> bool {
        if self.state.round < 4 {
            return false;
        }

        let quiet = |actor: Actor| {
            let offers: Vec<&RoundMemory> = self
                .state
                .memories
                .iter()
                .filter(|m| m.actor == actor)
                .collect();
            let [.., previous, latest] = offers.as_slice() else {
                return false;
            };
            let price_still = (latest.offer.unit_price.0 - previous.offer.unit_price.0).abs()
                < STALEMATE_PRICE_EPSILON;
            let terms_still = latest.offer.term_months == previous.offer.term_months
                && latest.offer.payment_terms == previous.offer.payment_terms;
            price_still && terms_still
        };

        quiet(Actor::Buyer) && quiet(Actor::Seller)
    }

    async fn emit_started(&self, collab: &Collaborators) {
        let event = SessionEvent::new(
            EventKind::SessionStarted,
            self.state.session_id,
            self.request.request_id.clone(),
            self.vendor.vendor_id.clone(),
            None,
            json!({
                "plan": {
                    "max_rounds": self.plan.max_rounds,
                    "min_acceptable_utility": self.plan.min_acceptable_utility,
                    "personality": self.plan.personality,
                },
                "list_price": self.list_price.0,
            }),
        );
        emit_with_retry(collab.events.as_ref(), event).await;
    }

    async fn emit_round_completed(&self, collab: &Collaborators, memory: &RoundMemory) {
        let event = SessionEvent::new(
            EventKind::RoundCompleted,
            self.state.session_id,
            self.request.request_id.clone(),
            self.vendor.vendor_id.clone(),
            Some(memory.round),
            json!({
                "actor": memory.actor,
                "offer": memory.offer,
                "strategy": memory.strategy,
                "utility": {
                    "buyer": memory.buyer_utility,
                    "seller": memory.seller_utility,
                },
                "violations": memory.violations.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
                "decision": memory.decision,
                "clamped": memory.clamped,
            }),
        );
        emit_with_retry(collab.events.as_ref(), event).await;
    }

    async fn emit_terminated(&self, collab: &Collaborators) {
        let event = SessionEvent::new(
            EventKind::SessionTerminated,
            self.state.session_id,
            self.request.request_id.clone(),
            self.vendor.vendor_id.clone(),
            Some(self.state.round),
            json!({
                "outcome": self.state.outcome,
                "outcome_reason": self.state.outcome_reason,
                "final_offer": self.state.final_offer.as_ref().map(|o| &o.components),
                "savings_achieved": self.state.savings.0,
                "rounds": self.state.round,
            }),
        );
        emit_with_retry(collab.events.as_ref(), event).await;
    }
}

/// How badly a side wants this deal closed: relationship-driven agents and
/// urgent quarters push toward closing moves in the endgame.
fn deal_importance(traits: &PersonalityTraits, context: &VendorContext) -> f64 {
    (0.3 + 0.4 * traits.relationship_focus + 0.3 * context.urgency_multiplier()).clamp(0.0, 1.0)
}

/// Deterministic per-session seed: engine seed hashed with both party ids.
fn session_seed(global_seed: u64, request: &Request, vendor: &VendorProfile) -> u64 {
    let mut hasher = DefaultHasher::new();
    global_seed.hash(&mut hasher);
    request.request_id.hash(&mut hasher);
    vendor.vendor_id.hash(&mut hasher);
    hasher.finish()
}
