use std::sync::Arc;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::EngineConfig,
    domain::{
        Money, SessionId, VendorId,
        offer::{Offer, OfferComponents, OfferScore},
        request::Request,
        vendor::VendorProfile,
    },
    error::{DealbookResult, PolicyError, SessionError},
    events::{EventKind, SessionEvent, emit_with_retry},
    policy::{GuardrailChecker, PolicyChecker, Violation},
    pricing::TcoCalculator,
    scoring::{ScoreWeights, ScoringService},
    session::{
        NegotiationPlan, SessionOutcome, SessionState,
        machine::{Collaborators, SessionMachine},
        personality::VendorContext,
    },
};

/// Aggregated result of one session, ready for ranking and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub outcome: SessionOutcome,
    pub outcome_reason: Option<String>,
    pub rounds: u32,
    pub final_offer: Option<Offer>,

    /// Buyer utility of the final offer, when one exists.
    pub buyer_utility: Option<f64>,

    pub tco: Option<Money>,
    pub savings: Money,

    /// Savings as a fraction of list price (0.1 = 10%).
    pub savings_pct: f64,

    /// The frozen session state, including the full round transcript.
    pub state: SessionState,
}

impl SessionReport {
    fn from_state(state: SessionState, vendor: &VendorProfile, request: &Request) -> Self {
        let final_offer = state.final_offer.clone();
        let buyer_utility = final_offer.as_ref().map(|offer| offer.score.utility);
        let tco = final_offer.as_ref().map(|offer| offer.score.tco);
        let savings_pct = final_offer
            .as_ref()
            .map(|offer| {
                let list = vendor.list_price_for(request.quantity);
                if list.is_positive() {
                    (list.0 - offer.components.unit_price.0) / list.0
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0);

        Self {
            session_id: state.session_id,
            vendor_id: state.vendor_id.clone(),
            vendor_name: vendor.name.clone(),
            outcome: state.outcome,
            outcome_reason: state.outcome_reason.clone(),
            rounds: state.round,
            final_offer,
            buyer_utility,
            tco,
            savings: state.savings,
            savings_pct,
            state,
        }
    }
}

/// Runs all per-vendor sessions for one request concurrently, then ranks the
/// surviving offers.
///
/// Sessions are independent tokio tasks behind a FIFO semaphore
/// (`max_concurrent_sessions`); cancellation fans out through a child
/// [`CancellationToken`] per session, and every session produces exactly one
/// terminal event regardless of how it ends.
pub struct Coordinator {
    config: EngineConfig,
    scoring: Arc<ScoringService>,
    collab: Collaborators,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> DealbookResult<Self> {
        config.validate()?;
        let tco = TcoCalculator::new(config.discount_rate_annual)?;
        let scoring = Arc::new(ScoringService::new(ScoreWeights::default(), tco)?);
        Ok(Self {
            config,
            scoring,
            collab: Collaborators::default(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_collaborators(self, collab: Collaborators) -> Self {
        Self { collab, ..self }
    }

    pub fn with_scoring(self, scoring: Arc<ScoringService>) -> Self {
        Self { scoring, ..self }
    }

    /// Token callers can use to cancel all in-flight sessions. Each session
    /// finishes its current turn, terminates as dropped, and emits its
    /// terminal event.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pure scoring entry point, exposed for callers that want an offer
    /// scored outside any negotiation.
    pub fn score_offer(
        &self,
        offer: &OfferComponents,
        vendor: &VendorProfile,
        request: &Request,
    ) -> OfferScore {
        self.scoring.score_offer(vendor, offer, request)
    }

    /// Pure validation entry point: policy and guardrail checks combined,
    /// from the buyer's seat.
    pub fn validate_offer(
        &self,
        offer: &OfferComponents,
        vendor: &VendorProfile,
        request: &Request,
    ) -> Vec<Violation> {
        let policy = PolicyChecker::new(*self.scoring.tco_calculator());
        let mut violations = policy.validate(request, offer, vendor);
        violations.extend(GuardrailChecker.vet(vendor, offer, crate::domain::Actor::Buyer));
        violations
    }

    /// Negotiate one request against a shortlisted vendor set.
    ///
    /// Returns one report per vendor: accepted offers first, ranked by buyer
    /// utility descending, then TCO ascending, then vendor reliability
    /// descending; non-accepted sessions follow in input order.
    #[tracing::instrument(skip_all, fields(request_id = %request.request_id, vendors = vendors.len()))]
    pub async fn negotiate(
        &self,
        request: Request,
        vendors: Vec<VendorProfile>,
        plan: NegotiationPlan,
    ) -> DealbookResult<Vec<SessionReport>> {
        request.validate()?;
        plan.validate()?;
        if vendors.is_empty() {
            return Err(PolicyError::EmptyShortlist.into());
        }

        let request = Arc::new(request);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_sessions));
        let mut sessions: JoinSet<DealbookResult<(usize, SessionState)>> = JoinSet::new();

        for (index, vendor) in vendors.iter().cloned().enumerate() {
            let request = Arc::clone(&request);
            let vendor = Arc::new(vendor);
            let plan = plan.clone();
            let config = self.config.clone();
            let scoring = Arc::clone(&self.scoring);
            let collab = self.collab.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.child_token();

            sessions.spawn(async move {
                // FIFO backpressure: excess sessions queue on the semaphore.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| SessionError::Join(e.to_string()))?;

                let machine = SessionMachine::new(
                    request,
                    vendor,
                    plan,
                    config,
                    scoring,
                    VendorContext::default(),
                )?;
                let state = machine.run(&collab, &cancel).await?;
                Ok((index, state))
            });
        }

        let mut states: Vec<(usize, SessionState)> = Vec::with_capacity(vendors.len());
        while let Some(joined) = sessions.join_next().await {
            match joined {
                Ok(Ok(entry)) => states.push(entry),
                Ok(Err(error)) => {
                    // One failed session poisons the whole request: cancel
                    // the rest and surface the root cause.
                    error!(?error, "session failed; cancelling remaining sessions");
                    self.cancel.cancel();
                    while sessions.join_next().await.is_some() {}
                    return Err(error);
                }
                Err(join_error) => {
                    error!(?join_error, "session task panicked");
                    self.cancel.cancel();
                    while sessions.join_next().await.is_some() {}
                    return Err(SessionError::Join(join_error.to_string()).into());
                }
            }
        }

        // Restore input order before ranking so ties stay deterministic.
        states.sort_by_key(|(index, _)| *index);

        let reports = states
            .into_iter()
            .map(|(index, state)| {
                let vendor = &vendors[index];
                SessionReport::from_state(state, vendor, &request)
            })
            .collect::<Vec<_>>();

        let ranked = rank_reports(reports, &vendors);
        self.emit_shortlist(&request, &ranked).await;
        info!(
            accepted = ranked.iter().filter(|r| r.outcome.is_accepted()).count(),
            total = ranked.len(),
            "negotiation complete"
        );
        Ok(ranked)
    }

    async fn emit_shortlist(&self, request: &Request, ranked: &[SessionReport]) {
        let event = SessionEvent::request_level(
            EventKind::ShortlistProduced,
            request.request_id.clone(),
            json!({
                "ranking": ranked
                    .iter()
                    .map(|report| json!({
                        "vendor_id": report.vendor_id,
                        "session_id": report.session_id,
                        "outcome": report.outcome,
                        "buyer_utility": report.buyer_utility,
                        "savings_pct": report.savings_pct,
                    }))
                    .collect::<Vec<_>>(),
            }),
        );
        emit_with_retry(self.collab.events.as_ref(), event).await;
    }
}

/// Accepted offers first, by buyer utility descending, TCO ascending, then
/// vendor reliability (SLA) descending. Everything else keeps input order
/// behind them.
fn rank_reports(reports: Vec<SessionReport>, vendors: &[VendorProfile]) -> Vec<SessionReport> {
    let reliability = |report: &SessionReport| {
        vendors
            .iter()
            .find(|v| v.vendor_id == report.vendor_id)
            .map(|v| v.reliability.sla)
            .unwrap_or(0.0)
    };

    let (accepted, rest): (Vec<_>, Vec<_>) = reports
        .into_iter()
        .partition(|report| report.outcome.is_accepted());

    let mut ranked: Vec<SessionReport> = accepted
        .into_iter()
        .sorted_by_key(|report| {
            (
                std::cmp::Reverse(OrderedFloat(report.buyer_utility.unwrap_or(0.0))),
                OrderedFloat(report.tco.map(|t| t.0).unwrap_or(f64::MAX)),
                std::cmp::Reverse(OrderedFloat(reliability(report))),
            )
        })
        .collect();

    ranked.extend(rest);
    ranked
}
