use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::capability::CapabilityKind;
use crate::request::{GenerationRequest, RequestState, Ticket};

pub type EventPayload = Map<String, Value>;

/// Rendering side that receives state updates from the core.
///
/// Every event is a flat JSON object carrying at least `type`, `capability`
/// and `ts`.
pub trait Surface: Send {
    fn publish(&self, event: Value);
}

/// Stamps events with the default fields before handing them to a surface.
pub struct SurfaceEmitter {
    surface: Box<dyn Surface>,
}

impl SurfaceEmitter {
    pub fn new(surface: impl Surface + 'static) -> Self {
        Self {
            surface: Box::new(surface),
        }
    }

    /// Default fields are `type`, `capability`, `ticket` and `ts`; the
    /// payload is merged last and may override them.
    pub fn emit(
        &self,
        event_type: &str,
        capability: Option<CapabilityKind>,
        ticket: Option<Ticket>,
        payload: EventPayload,
    ) -> Value {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        if let Some(capability) = capability {
            event.insert(
                "capability".to_string(),
                Value::String(capability.as_str().to_string()),
            );
        }
        if let Some(ticket) = ticket {
            event.insert("ticket".to_string(), Value::from(ticket.value()));
        }
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }
        let event = Value::Object(event);
        self.surface.publish(event.clone());
        event
    }

    /// Publish the current state of `request` as a `request_state` event.
    pub fn emit_request(&self, request: &GenerationRequest) -> Value {
        self.emit(
            "request_state",
            Some(request.kind()),
            request.ticket(),
            request_payload(request),
        )
    }
}

/// Flatten a request record into event fields.
pub fn request_payload(request: &GenerationRequest) -> EventPayload {
    let mut payload = EventPayload::new();
    payload.insert(
        "status".to_string(),
        Value::String(request.status().as_str().to_string()),
    );
    if let Some(id) = request.id() {
        payload.insert("request_id".to_string(), Value::String(id.to_string()));
    }
    if let Some(input) = request.input() {
        payload.insert("input".to_string(), Value::String(input.to_string()));
    }
    match request.state() {
        RequestState::Idle | RequestState::Submitting { .. } => {}
        RequestState::Running { job_id, .. } => {
            payload.insert("job_id".to_string(), Value::String(job_id.clone()));
        }
        RequestState::Completed { completion, .. } => {
            payload.insert("result".to_string(), completion.result.to_json());
            payload.insert(
                "fallback_used".to_string(),
                Value::Bool(completion.recovery == crate::normalize::Recovery::Fallback),
            );
        }
        RequestState::Failed { failure, .. } => {
            payload.insert(
                "error_kind".to_string(),
                Value::String(failure.kind.as_str().to_string()),
            );
            payload.insert("error".to_string(), Value::String(failure.message.clone()));
        }
    }
    payload
}

/// Surface that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn publish(&self, _event: Value) {}
}

/// Surface that keeps events in memory, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    events: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Value> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| event.get("type").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn publish(&self, event: Value) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use serde_json::Value;

    use super::*;
    use crate::errors::{Failure, FailureKind};

    #[test]
    fn emit_stamps_default_fields() -> anyhow::Result<()> {
        let recording = RecordingSurface::new();
        let emitter = SurfaceEmitter::new(recording.clone());

        let mut payload = EventPayload::new();
        payload.insert("card_id".to_string(), Value::String("image-1".to_string()));
        let emitted = emitter.emit("card_added", Some(CapabilityKind::Image), None, payload);

        let events = recording.events();
        assert_eq!(events, vec![emitted.clone()]);
        assert_eq!(emitted["type"], "card_added");
        assert_eq!(emitted["capability"], "image");
        assert_eq!(emitted["card_id"], "image-1");
        assert!(emitted.get("ticket").is_none());
        DateTime::parse_from_rfc3339(emitted["ts"].as_str().unwrap_or(""))?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() {
        let emitter = SurfaceEmitter::new(NullSurface);
        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), Value::String("override".to_string()));
        let emitted = emitter.emit("request_state", None, None, payload);
        assert_eq!(emitted["type"], "override");
    }

    #[test]
    fn request_events_carry_status_and_failure() {
        let recording = RecordingSurface::new();
        let emitter = SurfaceEmitter::new(recording.clone());
        let mut request = GenerationRequest::new(CapabilityKind::Emotion);
        let Some(ticket) = request.begin("rain on the window") else {
            panic!("idle begin");
        };
        emitter.emit_request(&request);
        request.fail(ticket, Failure::new(FailureKind::Declined, "declined"), None);
        emitter.emit_request(&request);

        let events = recording.events();
        assert_eq!(recording.event_types(), vec!["request_state", "request_state"]);
        assert_eq!(events[0]["status"], "submitting");
        assert_eq!(events[0]["ticket"], 1);
        assert_eq!(events[0]["input"], "rain on the window");
        assert_eq!(events[1]["status"], "failed");
        assert_eq!(events[1]["error_kind"], "declined");
    }
}
