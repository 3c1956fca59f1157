//! Structured business events.
//!
//! Each event is one INFO line with a fixed vocabulary (`event`, `service`,
//! `component`, `action`, `entity`, and optionally `reason`, `outcome`).
//! Emitted inside a call, the line also carries the call's identifiers.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Source of business events for one service component
#[derive(Debug, Clone)]
pub struct BusinessEventLogger {
    service: Arc<str>,
    component: Arc<str>,
}

impl BusinessEventLogger {
    pub fn new(service: impl Into<Arc<str>>, component: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
            component: component.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Start building an event
    pub fn event(
        &self,
        event: impl Into<String>,
        action: impl Into<String>,
        entity: impl Into<String>,
    ) -> BusinessEvent {
        BusinessEvent {
            service: self.service.clone(),
            component: self.component.clone(),
            event: event.into(),
            action: action.into(),
            entity: entity.into(),
            reason: None,
            outcome: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone)]
#[must_use = "events are only logged by `emit`"]
pub struct BusinessEvent {
    service: Arc<str>,
    component: Arc<str>,
    event: String,
    action: String,
    entity: String,
    reason: Option<String>,
    outcome: Option<String>,
    extra: Map<String, Value>,
}

impl BusinessEvent {
    /// Empty reasons are not logged.
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        self.reason = (!reason.is_empty()).then_some(reason);
        self
    }

    /// Empty outcomes are not logged.
    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        let outcome: String = outcome.into();
        self.outcome = (!outcome.is_empty()).then_some(outcome);
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// All fields of the event as one JSON object
    pub fn to_json(&self) -> Value {
        let mut fields = self.extra.clone();
        fields.insert("event".into(), self.event.clone().into());
        fields.insert("service".into(), self.service.to_string().into());
        fields.insert("component".into(), self.component.to_string().into());
        fields.insert("action".into(), self.action.clone().into());
        fields.insert("entity".into(), self.entity.clone().into());
        if let Some(reason) = &self.reason {
            fields.insert("reason".into(), reason.clone().into());
        }
        if let Some(outcome) = &self.outcome {
            fields.insert("outcome".into(), outcome.clone().into());
        }
        Value::Object(fields)
    }

    pub fn emit(self) {
        let extra = (!self.extra.is_empty()).then(|| Value::Object(self.extra).to_string());

        tracing::info!(
            event = %self.event,
            service = %self.service,
            component = %self.component,
            action = %self.action,
            entity = %self.entity,
            reason = self.reason.as_deref(),
            outcome = self.outcome.as_deref(),
            extra = extra.as_deref(),
            "business event"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::context::{CallIdentifiers, CallScope};
    use crate::test_support::capture_logs;

    fn logger() -> BusinessEventLogger {
        BusinessEventLogger::new("checkout", "grpc")
    }

    #[test]
    fn event_fields_are_complete() {
        let event = logger()
            .event("order_placed", "place_order", "order")
            .outcome("success")
            .reason("")
            .field("items", 3);

        assert_eq!(
            event.to_json(),
            json!({
                "event": "order_placed",
                "service": "checkout",
                "component": "grpc",
                "action": "place_order",
                "entity": "order",
                "outcome": "success",
                "items": 3,
            })
        );
    }

    #[test]
    fn emitted_inside_a_call_carries_identifiers() {
        let logs = capture_logs(|| {
            let scope = CallScope::bind(&CallIdentifiers::new("evt-1").with_user_id("u42"));
            scope.in_scope(|| {
                logger()
                    .event("payment_charged", "charge", "payment")
                    .outcome("success")
                    .emit();
            });
        });

        assert!(logs.contains("\"event\":\"payment_charged\""));
        assert!(logs.contains("\"request_id\":\"evt-1\""));
        assert!(logs.contains("\"user_id\":\"u42\""));
        assert!(!logs.contains("session_id"));
    }

    #[test]
    fn emitted_outside_a_call_has_no_identifiers() {
        let logs = capture_logs(|| {
            logger().event("cache_warmed", "warm", "cache").emit();
        });

        assert!(logs.contains("cache_warmed"));
        assert!(!logs.contains("request_id"));
    }
}
