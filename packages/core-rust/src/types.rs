use std::fmt;

use serde::{Deserialize, Serialize};

/// Arguments of a single operation invocation, as sent by the client.
///
/// Always a JSON object; an absent `variables` field deserializes to an
/// empty map.
pub type Args = serde_json::Map<String, serde_json::Value>;

/// HTTP method used for a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    /// Returns the canonical method name (`"GET"`, `"POST"`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }

    /// Whether calls with this method carry a request body.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion event for a scheduled background operation.
///
/// Published once when the operation's timer fires. Never stored: if no
/// subscriber is connected at that moment, the event is lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledOperationEvent {
    /// Name given to the operation when it was scheduled.
    pub name: String,
    /// RFC 3339 UTC timestamp of the moment the operation finished.
    pub end_date: String,
}
