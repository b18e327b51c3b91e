use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::ItemId;

use crate::Event;

/// Envelope for a published event, carrying routing + ordering metadata.
///
/// Notes:
/// - `item_id` is the item the event is primarily about (the source item for
///   transfers), so subscribers can partition by item.
/// - `sequence_number` increases monotonically per publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    item_id: ItemId,
    event_type: String,
    occurred_at: DateTime<Utc>,

    /// Monotonically increasing position in the publisher's stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        item_id: ItemId,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            item_id,
            event_type: event_type.into(),
            occurred_at,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, copying its type name and business time.
    pub fn wrap(item_id: ItemId, sequence_number: u64, payload: E) -> Self {
        Self::new(
            Uuid::now_v7(),
            item_id,
            payload.event_type(),
            payload.occurred_at(),
            sequence_number,
            payload,
        )
    }
}
