mod common;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dealbook::events::{EventKind, MemorySink};
use dealbook::rationale::TemplateRationale;
use dealbook::{
    Collaborators, Coordinator, EngineConfig, NegotiationPlan, SessionOutcome,
};

use common::{make_request, make_vendor, make_vendor_with_sla};

fn coordinator_with_sink(config: EngineConfig) -> (Coordinator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let collab = Collaborators {
        events: sink.clone(),
        rationale: Arc::new(TemplateRationale),
    };
    let coordinator = Coordinator::new(config)
        .unwrap()
        .with_collaborators(collab);
    (coordinator, sink)
}

fn five_vendors() -> Vec<dealbook::VendorProfile> {
    vec![
        make_vendor("alpha", 1200.0, 1060.0),
        make_vendor("bravo", 1150.0, 1000.0),
        make_vendor("charlie", 1300.0, 1100.0),
        make_vendor("delta", 1180.0, 1020.0),
        make_vendor("echo", 1250.0, 1080.0),
    ]
}

#[tokio::test]
async fn five_sessions_run_and_each_terminates_exactly_once() {
    let (coordinator, sink) = coordinator_with_sink(EngineConfig::default());
    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            five_vendors(),
            NegotiationPlan::default().with_max_rounds(6),
        )
        .await
        .unwrap();

    assert_eq!(reports.len(), 5);

    // Five distinct session ids.
    let ids: HashSet<_> = reports.iter().map(|r| r.session_id).collect();
    assert_eq!(ids.len(), 5);

    // Exactly one terminal event per session.
    let events = sink.events();
    for report in &reports {
        let terminals = events
            .iter()
            .filter(|e| {
                e.kind == EventKind::SessionTerminated && e.session_id == Some(report.session_id)
            })
            .count();
        assert_eq!(terminals, 1, "vendor {}", report.vendor_id);
    }

    // Per-session causal order: started before any round, terminated last.
    for report in &reports {
        let session: Vec<_> = events
            .iter()
            .filter(|e| e.session_id == Some(report.session_id))
            .collect();
        assert_eq!(session.first().unwrap().kind, EventKind::SessionStarted);
        assert_eq!(
            session.last().unwrap().kind,
            EventKind::SessionTerminated
        );
    }
}

#[tokio::test]
async fn accepted_offers_rank_by_utility_then_tco_then_reliability() {
    let (coordinator, _sink) = coordinator_with_sink(EngineConfig::default());
    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            five_vendors(),
            NegotiationPlan::default().with_max_rounds(6),
        )
        .await
        .unwrap();

    let accepted: Vec<_> = reports
        .iter()
        .take_while(|r| r.outcome.is_accepted())
        .collect();
    assert!(!accepted.is_empty(), "at least one vendor should close");

    for pair in accepted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert!(
            a.buyer_utility.unwrap() >= b.buyer_utility.unwrap() - 1e-12,
            "ranking not descending by utility"
        );
    }

    // Anything not accepted sits behind every accepted report.
    let tail = &reports[accepted.len()..];
    assert!(tail.iter().all(|r| !r.outcome.is_accepted()));
}

#[tokio::test]
async fn reliability_breaks_exact_ties() {
    // Two identical vendors, one with a better SLA.
    let (coordinator, _sink) = coordinator_with_sink(EngineConfig::default());
    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            vec![
                make_vendor_with_sla("shaky", 1200.0, 1060.0, 0.95),
                make_vendor_with_sla("solid", 1200.0, 1060.0, 0.999),
            ],
            NegotiationPlan::default().with_max_rounds(6),
        )
        .await
        .unwrap();

    if reports.iter().all(|r| r.outcome.is_accepted()) {
        assert_eq!(reports[0].vendor_id.as_str(), "solid");
    }
}

#[tokio::test]
async fn same_seed_produces_identical_transcripts() {
    let request = make_request(172_500.0, 150);
    let vendors = five_vendors();
    let plan = NegotiationPlan::default().with_max_rounds(6);

    let (first_coordinator, _) =
        coordinator_with_sink(EngineConfig::default().with_random_seed(42));
    let first = first_coordinator
        .negotiate(request.clone(), vendors.clone(), plan.clone())
        .await
        .unwrap();

    let (second_coordinator, _) =
        coordinator_with_sink(EngineConfig::default().with_random_seed(42));
    let second = second_coordinator
        .negotiate(request, vendors, plan)
        .await
        .unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.session_id, b.session_id);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.state.memories, b.state.memories, "vendor {}", a.vendor_id);
    }
}

#[tokio::test]
async fn different_seeds_still_share_deterministic_structure() {
    // Seeds only drive concession jitter; outcomes for this setup are robust.
    let (coordinator, _sink) =
        coordinator_with_sink(EngineConfig::default().with_random_seed(7));
    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            vec![make_vendor("crm-pro", 1200.0, 1060.0)],
            NegotiationPlan::default().with_max_rounds(6),
        )
        .await
        .unwrap();
    assert_eq!(reports[0].outcome, SessionOutcome::Accepted);
}

#[tokio::test]
async fn cancellation_terminates_every_session_as_dropped() {
    let (coordinator, sink) = coordinator_with_sink(EngineConfig::default());
    coordinator.cancellation_token().cancel();

    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            five_vendors(),
            NegotiationPlan::default(),
        )
        .await
        .unwrap();

    for report in &reports {
        assert_eq!(report.outcome, SessionOutcome::Dropped);
        assert_eq!(report.outcome_reason.as_deref(), Some("cancelled"));
    }

    // Cancellation still yields exactly one terminal event per session.
    let terminal_sessions: BTreeSet<_> = sink
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::SessionTerminated)
        .map(|e| e.session_id)
        .collect();
    assert_eq!(terminal_sessions.len(), 5);
}

#[tokio::test]
async fn backpressure_cap_of_one_still_completes_all_sessions() {
    let config = EngineConfig::default().with_max_concurrent_sessions(1);
    let (coordinator, _sink) = coordinator_with_sink(config);

    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            five_vendors(),
            NegotiationPlan::default().with_max_rounds(4),
        )
        .await
        .unwrap();

    assert_eq!(reports.len(), 5);
    assert!(reports.iter().all(|r| r.outcome.is_terminal()));
}

#[tokio::test]
async fn empty_shortlist_is_refused() {
    let (coordinator, _sink) = coordinator_with_sink(EngineConfig::default());
    let result = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            vec![],
            NegotiationPlan::default(),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn round_timeout_follows_the_refusal_path() {
    use dealbook::error::CollaboratorError;
    use dealbook::rationale::{RationaleRequest, RationaleSource};
    use futures::future::BoxFuture;

    struct GlacialRationale;

    impl RationaleSource for GlacialRationale {
        fn compose(
            &self,
            _request: RationaleRequest<'_>,
        ) -> BoxFuture<'_, Result<String, CollaboratorError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok("far too slow".to_string())
            })
        }
    }

    let sink = Arc::new(MemorySink::new());
    let collab = Collaborators {
        events: sink.clone(),
        rationale: Arc::new(GlacialRationale),
    };
    let config = EngineConfig::default().with_round_timeout(Duration::from_millis(200));
    let coordinator = Coordinator::new(config)
        .unwrap()
        .with_collaborators(collab);

    let reports = coordinator
        .negotiate(
            make_request(172_500.0, 150),
            vec![make_vendor("crm-pro", 1200.0, 1060.0)],
            NegotiationPlan::default(),
        )
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.outcome, SessionOutcome::MaxRounds);
    assert_eq!(report.outcome_reason.as_deref(), Some("round_timeout"));
}
