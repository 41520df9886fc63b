//! Acknowledgements sent back to the monitored node.

use serde::{Deserialize, Serialize};

use crate::action::ActionType;
use crate::error::Result;
use crate::event::Event;

/// Fixed `messageType` tag of every acknowledgement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseTag {
    /// The only tag a response carries.
    #[default]
    #[serde(rename = "RESPONSE")]
    Response,
}

/// Acknowledgement for exactly one [`Event`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Always [`ResponseTag::Response`].
    pub message_type: ResponseTag,

    /// Sequence number of the acknowledged event.
    pub sequence: u64,

    /// Connection epoch of the acknowledged event.
    #[serde(skip)]
    pub generation: u64,

    /// Action performed for the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,

    /// Opaque action-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Response {
    /// Turns this response into the default acknowledgement for `event`.
    pub fn acknowledge(&mut self, event: &Event) {
        *self = Self {
            sequence: event.sequence,
            generation: event.generation,
            ..Self::default()
        };
    }

    /// Returns true if no action populated this response.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.action.is_none() && self.payload.is_none()
    }

    /// Encodes the response as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a response from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a response record.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledge_clears_previous_fields() {
        let mut response = Response {
            action: Some(ActionType::Pause),
            payload: Some(serde_json::json!({"stale": true})),
            sequence: 3,
            ..Response::default()
        };
        let event = Event {
            sequence: 11,
            generation: 2,
            ..Event::default()
        };

        response.acknowledge(&event);

        assert_eq!(response.sequence, 11);
        assert_eq!(response.generation, 2);
        assert!(response.is_default());
    }

    #[test]
    fn test_default_wire_shape() {
        let response = Response {
            sequence: 5,
            ..Response::default()
        };
        let json: serde_json::Value = serde_json::from_slice(&response.encode().unwrap()).unwrap();

        assert_eq!(json, serde_json::json!({"messageType": "RESPONSE", "sequence": 5}));
    }
}
