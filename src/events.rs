use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::{
    domain::{RequestId, SessionId, VendorId},
    error::CollaboratorError,
};

/// Session lifecycle event names, rendered in dotted form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum EventKind {
    #[strum(to_string = "session.started")]
    #[serde(rename = "session.started")]
    SessionStarted,

    #[strum(to_string = "round.completed")]
    #[serde(rename = "round.completed")]
    RoundCompleted,

    #[strum(to_string = "session.terminated")]
    #[serde(rename = "session.terminated")]
    SessionTerminated,

    #[strum(to_string = "shortlist.produced")]
    #[serde(rename = "shortlist.produced")]
    ShortlistProduced,
}

/// One emitted event. The payload shape is type-specific; the envelope is
/// shared by every event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,

    /// Absent only for request-level events (shortlist).
    pub session_id: Option<SessionId>,

    pub request_id: RequestId,

    /// Absent for request-level events.
    pub vendor_id: Option<VendorId>,

    /// Present on round-scoped events.
    pub round: Option<u32>,

    pub timestamp: DateTime<Utc>,

    pub payload: Value,
}

impl SessionEvent {
    pub fn new(
        kind: EventKind,
        session_id: SessionId,
        request_id: RequestId,
        vendor_id: VendorId,
        round: Option<u32>,
        payload: Value,
    ) -> Self {
        Self {
            kind,
            session_id: Some(session_id),
            request_id,
            vendor_id: Some(vendor_id),
            round,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Request-level event with no single session attached.
    pub fn request_level(kind: EventKind, request_id: RequestId, payload: Value) -> Self {
        Self {
            kind,
            session_id: None,
            request_id,
            vendor_id: None,
            round: None,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// The event-bus collaborator seam.
///
/// Emission is fire-and-forget from the engine's point of view: the session
/// never blocks on downstream consumers beyond the bounded retry window.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Sink that drops every event. The default when no bus is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SessionEvent) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async { Ok(()) })
    }
}

/// In-memory sink capturing every event, in emission order. Test support.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SessionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().expect("event sink poisoned").clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SessionEvent) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            self.events.lock().expect("event sink poisoned").push(event);
            Ok(())
        })
    }
}

/// Retry budget for collaborator calls.
pub const COLLABORATOR_RETRIES: u32 = 3;

/// Base delay for the exponential backoff between retries.
pub const COLLABORATOR_BACKOFF: Duration = Duration::from_millis(50);

/// Emit with up to three retries and exponential backoff. A final failure
/// is logged and swallowed: losing an event never kills a session.
pub async fn emit_with_retry(sink: &dyn EventSink, event: SessionEvent) {
    let mut delay = COLLABORATOR_BACKOFF;
    for attempt in 0..=COLLABORATOR_RETRIES {
        match sink.emit(event.clone()).await {
            Ok(()) => return,
            Err(error) if attempt < COLLABORATOR_RETRIES => {
                tracing::debug!(?error, attempt, kind = %event.kind, "event emission failed; retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(error) => {
                warn!(?error, kind = %event.kind, "event dropped after final retry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySink {
        failures_left: AtomicU32,
        delivered: MemorySink,
    }

    impl EventSink for FlakySink {
        fn emit(&self, event: SessionEvent) -> BoxFuture<'_, Result<(), CollaboratorError>> {
            Box::pin(async move {
                if self
                    .failures_left
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(CollaboratorError::EventSink("transient".to_string()));
                }
                self.delivered.emit(event).await
            })
        }
    }

    fn event(kind: EventKind) -> SessionEvent {
        SessionEvent::new(
            kind,
            SessionId(7),
            RequestId::new("req"),
            VendorId::new("vendor"),
            Some(1),
            Value::Null,
        )
    }

    #[test]
    fn event_kinds_render_dotted() {
        assert_eq!(EventKind::SessionStarted.to_string(), "session.started");
        assert_eq!(
            EventKind::SessionTerminated.to_string(),
            "session.terminated"
        );
    }

    #[tokio::test]
    async fn memory_sink_preserves_order() {
        let sink = MemorySink::new();
        emit_with_retry(&sink, event(EventKind::SessionStarted)).await;
        emit_with_retry(&sink, event(EventKind::RoundCompleted)).await;
        emit_with_retry(&sink, event(EventKind::SessionTerminated)).await;

        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::SessionStarted,
                EventKind::RoundCompleted,
                EventKind::SessionTerminated
            ]
        );
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let sink = FlakySink {
            failures_left: AtomicU32::new(2),
            delivered: MemorySink::new(),
        };
        emit_with_retry(&sink, event(EventKind::RoundCompleted)).await;
        assert_eq!(sink.delivered.events().len(), 1);
    }

    #[tokio::test]
    async fn permanent_failures_are_swallowed() {
        let sink = FlakySink {
            failures_left: AtomicU32::new(u32::MAX),
            delivered: MemorySink::new(),
        };
        // Must not hang or panic.
        emit_with_retry(&sink, event(EventKind::RoundCompleted)).await;
        assert!(sink.delivered.events().is_empty());
    }
}
