//! Event type registry
//!
//! Maps stored event-type tags to payload decoders. Built once per aggregate
//! type from [`DomainEvent::registry`](crate::domain::DomainEvent::registry).

use std::collections::HashMap;
use std::fmt;

use crate::domain::EventPayload;

use super::ReconstructionError;

type Decoder<E> = Box<dyn Fn(serde_json::Value) -> Result<E, ReconstructionError> + Send + Sync>;

/// Decoders keyed by event-type tag
pub struct EventRegistry<E> {
    decoders: HashMap<&'static str, Decoder<E>>,
}

impl<E: 'static> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a payload struct under its tag, wrapped into the event enum by `wrap`.
    /// Decoded payloads must pass [`EventPayload::validate`].
    pub fn register<P: EventPayload>(mut self, wrap: fn(P) -> E) -> Self {
        let previous = self.decoders.insert(
            P::EVENT_TYPE,
            Box::new(move |value| {
                let payload = serde_json::from_value::<P>(value).map_err(|source| {
                    ReconstructionError::MalformedPayload {
                        event_type: P::EVENT_TYPE.to_string(),
                        source,
                    }
                })?;
                payload
                    .validate()
                    .map_err(|source| ReconstructionError::InvalidPayload {
                        event_type: P::EVENT_TYPE.to_string(),
                        source,
                    })?;
                Ok(wrap(payload))
            }),
        );
        debug_assert!(previous.is_none(), "event type {} registered twice", P::EVENT_TYPE);
        self
    }

    /// Decode a stored payload by its tag
    pub fn decode(&self, event_type: &str, payload: serde_json::Value) -> Result<E, ReconstructionError> {
        let decoder = self
            .decoders
            .get(event_type)
            .ok_or_else(|| ReconstructionError::UnknownEventType {
                event_type: event_type.to_string(),
            })?;

        decoder(payload)
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.decoders.contains_key(event_type)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<E: 'static> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.decoders.keys().collect();
        tags.sort();
        f.debug_struct("EventRegistry").field("event_types", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BookingAccepted, BookingEvent, DomainEvent};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let registry = BookingEvent::registry();
        let result = registry.decode("BookingTeleported", serde_json::json!({}));

        assert!(matches!(
            result,
            Err(ReconstructionError::UnknownEventType { ref event_type }) if event_type == "BookingTeleported"
        ));
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let registry = BookingEvent::registry();
        let result = registry.decode("BookingAccepted", serde_json::json!({ "booking_id": 42 }));

        assert!(matches!(result, Err(ReconstructionError::MalformedPayload { .. })));
    }

    #[test]
    fn test_inverted_stored_dates_are_rejected() {
        let payload = serde_json::json!({
            "booking_id": Uuid::new_v4(),
            "start_date": "2024-07-10",
            "end_date": "2024-07-08",
            "changed_at": Utc::now(),
        });
        let result = BookingEvent::registry().decode("BookingDatesChanged", payload);

        assert!(matches!(
            result,
            Err(ReconstructionError::InvalidPayload { ref event_type, .. }) if event_type == "BookingDatesChanged"
        ));
    }

    #[test]
    fn test_decode_wraps_payload_in_variant() {
        let accepted = BookingAccepted {
            booking_id: Uuid::new_v4(),
            accepted_at: Utc::now(),
        };
        let payload = serde_json::to_value(&accepted).unwrap();

        let event = BookingEvent::registry().decode("BookingAccepted", payload).unwrap();
        assert_eq!(event, BookingEvent::Accepted(accepted));
    }

    #[test]
    fn test_debug_lists_sorted_tags() {
        let debug = format!("{:?}", BookingEvent::registry());
        assert!(debug.contains("BookingAccepted"));
        assert!(debug.find("BookingAccepted") < debug.find("BookingCreated"));
    }
}
