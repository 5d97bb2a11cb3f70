use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use crate::{
    domain::{Actor, offer::OfferComponents},
    error::CollaboratorError,
    events::{COLLABORATOR_BACKOFF, COLLABORATOR_RETRIES},
    session::strategy::StrategyKind,
};

/// Context handed to the rationale collaborator for one turn.
#[derive(Debug, Clone)]
pub struct RationaleRequest<'a> {
    pub actor: Actor,
    pub strategy: StrategyKind,
    pub offer: &'a OfferComponents,
    pub counter: Option<&'a OfferComponents>,

    /// The generator's deterministic fallback text for this move.
    pub fallback: &'a str,
}

/// Collaborator seam for synthesizing human-readable justifications
/// (typically an LLM client on the other side).
///
/// Calls must be abortable: the engine wraps them in the per-round deadline
/// and drops the future on expiry.
pub trait RationaleSource: Send + Sync {
    fn compose(&self, request: RationaleRequest<'_>)
    -> BoxFuture<'_, Result<String, CollaboratorError>>;
}

/// Deterministic rationale source: echoes the generator's template text.
///
/// This is both the default wiring and the degradation target when a real
/// collaborator keeps failing.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRationale;

impl RationaleSource for TemplateRationale {
    fn compose(
        &self,
        request: RationaleRequest<'_>,
    ) -> BoxFuture<'_, Result<String, CollaboratorError>> {
        let text = request.fallback.to_string();
        Box::pin(async move { Ok(text) })
    }
}

/// Resolve the rationale for one turn.
///
/// Retries the collaborator with exponential backoff. A collaborator that
/// keeps failing degrades to the deterministic template (`degraded = true`);
/// a collaborator that blows the round deadline is a different animal and
/// surfaces as [`CollaboratorError::Timeout`] so the state machine can apply
/// the refusal path.
pub async fn resolve_rationale(
    source: &dyn RationaleSource,
    request: RationaleRequest<'_>,
    deadline: Duration,
) -> Result<(String, bool), CollaboratorError> {
    let fallback = request.fallback.to_string();

    let attempt_all = async {
        let mut delay = COLLABORATOR_BACKOFF;
        for attempt in 0..=COLLABORATOR_RETRIES {
            match source.compose(request.clone()).await {
                Ok(text) => return Some(text),
                Err(error) if attempt < COLLABORATOR_RETRIES => {
                    tracing::debug!(?error, attempt, "rationale synthesis failed; retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(error) => {
                    warn!(?error, "rationale synthesis failed; using fallback");
                    return None;
                }
            }
        }
        None
    };

    match tokio::time::timeout(deadline, attempt_all).await {
        Ok(Some(text)) => Ok((text, false)),
        Ok(None) => Ok((fallback, true)),
        Err(_elapsed) => Err(CollaboratorError::Timeout(deadline)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, Money, PaymentTerms};

    fn offer() -> OfferComponents {
        OfferComponents::new(Money(100.0), Currency::Usd, 10, 12, PaymentTerms::Net30)
    }

    struct FailingSource;

    impl RationaleSource for FailingSource {
        fn compose(
            &self,
            _request: RationaleRequest<'_>,
        ) -> BoxFuture<'_, Result<String, CollaboratorError>> {
            Box::pin(async { Err(CollaboratorError::Rationale("model offline".to_string())) })
        }
    }

    struct SlowSource;

    impl RationaleSource for SlowSource {
        fn compose(
            &self,
            _request: RationaleRequest<'_>,
        ) -> BoxFuture<'_, Result<String, CollaboratorError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            })
        }
    }

    fn request(offer: &OfferComponents) -> RationaleRequest<'_> {
        RationaleRequest {
            actor: Actor::Seller,
            strategy: StrategyKind::HoldFirm,
            offer,
            counter: None,
            fallback: "template text",
        }
    }

    #[tokio::test]
    async fn template_source_is_never_degraded() {
        let offer = offer();
        let (text, degraded) = resolve_rationale(
            &TemplateRationale,
            request(&offer),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(text, "template text");
        assert!(!degraded);
    }

    #[tokio::test]
    async fn failing_source_degrades_to_the_fallback() {
        let offer = offer();
        let (text, degraded) = resolve_rationale(
            &FailingSource,
            request(&offer),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(text, "template text");
        assert!(degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_blows_the_deadline() {
        let offer = offer();
        let result = resolve_rationale(
            &SlowSource,
            request(&offer),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(CollaboratorError::Timeout(_))));
    }
}
