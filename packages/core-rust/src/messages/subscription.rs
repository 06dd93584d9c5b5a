//! Frames of the WebSocket subscription channel.
//!
//! The protocol follows the message vocabulary of `graphql-transport-ws`:
//! every frame is a JSON object tagged by `type`. There is a single
//! subscribable field, [`OPERATION_FINISHED`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::graphql::ClientError;
use crate::types::ScheduledOperationEvent;

/// Name of the only subscription field exposed by the gateway.
pub const OPERATION_FINISHED: &str = "operationFinished";

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Subscribe {
        id: String,
        payload: SubscribePayload,
    },
    Complete {
        id: String,
    },
    Ping,
    Pong,
}

/// Selects the field a `subscribe` frame listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub subscription: String,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    ConnectionAck,
    Next { id: String, payload: Value },
    Error { id: String, payload: Vec<ClientError> },
    Complete { id: String },
    Ping,
    Pong,
}

impl ServerFrame {
    /// Builds the `next` frame delivering an `operationFinished` event.
    #[must_use]
    pub fn operation_finished(id: &str, event: &ScheduledOperationEvent) -> Self {
        Self::Next {
            id: id.to_string(),
            payload: json!({
                "data": { OPERATION_FINISHED: event },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_parses() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "subscribe",
            "id": "1",
            "payload": { "subscription": "operationFinished" }
        }))
        .unwrap();
        assert_eq!(
            frame,
            ClientFrame::Subscribe {
                id: "1".to_string(),
                payload: SubscribePayload {
                    subscription: OPERATION_FINISHED.to_string(),
                },
            }
        );
    }

    #[test]
    fn connection_init_payload_is_optional() {
        let frame: ClientFrame =
            serde_json::from_value(json!({ "type": "connection_init" })).unwrap();
        assert_eq!(frame, ClientFrame::ConnectionInit { payload: None });
    }

    #[test]
    fn unit_frames_round_trip_by_tag() {
        assert_eq!(
            serde_json::to_value(ServerFrame::ConnectionAck).unwrap(),
            json!({ "type": "connection_ack" })
        );
        let ping: ClientFrame = serde_json::from_value(json!({ "type": "ping" })).unwrap();
        assert_eq!(ping, ClientFrame::Ping);
    }

    #[test]
    fn operation_finished_frame_shape() {
        let event = ScheduledOperationEvent {
            name: "X".to_string(),
            end_date: "2026-10-16T12:00:00.000Z".to_string(),
        };
        let frame = serde_json::to_value(ServerFrame::operation_finished("7", &event)).unwrap();
        assert_eq!(
            frame,
            json!({
                "type": "next",
                "id": "7",
                "payload": {
                    "data": {
                        "operationFinished": {
                            "name": "X",
                            "endDate": "2026-10-16T12:00:00.000Z"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_value(json!({ "type": "start", "id": "1" }));
        assert!(result.is_err());
    }
}
