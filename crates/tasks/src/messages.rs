//! Task-update channel frame types and parser.
//!
//! The service pushes JSON frames shaped `{"type": "<kind>", "taskId": ...}`.
//! [`parse_message`] classifies every text frame into the closed set of
//! [`InboundMessage`] variants, so the router never inspects raw JSON.

use gaia_core::types::{TaskId, TaskType};
use serde::{Deserialize, Serialize};

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Progress update. `percent` is `None` when the payload is not numeric.
    Progress {
        task_id: TaskId,
        percent: Option<f64>,
    },

    /// The task finished; `payload` is the unvalidated result.
    Complete {
        task_id: TaskId,
        payload: serde_json::Value,
    },

    /// The task failed on the server.
    Error { task_id: TaskId, message: String },

    /// Anything else. `task_id` is set only when the frame claimed to be
    /// terminal (`complete`, `task_completed`, `error`) for a known task id
    /// but its payload was unusable.
    Invalid {
        task_id: Option<TaskId>,
        reason: String,
    },
}

impl InboundMessage {
    /// Task id the frame is attributed to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Progress { task_id, .. }
            | Self::Complete { task_id, .. }
            | Self::Error { task_id, .. } => Some(task_id),
            Self::Invalid { task_id, .. } => task_id.as_deref(),
        }
    }
}

/// Wire shape of inbound frames, internally tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireMessage {
    #[serde(rename = "progress")]
    Progress {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        #[serde(default)]
        message: serde_json::Value,
    },

    #[serde(rename = "complete", alias = "task_completed")]
    Complete {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        #[serde(default)]
        message: Option<serde_json::Value>,
        #[serde(default)]
        result: Option<serde_json::Value>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        message: String,
    },
}

const TERMINAL_TYPES: &[&str] = &["complete", "task_completed", "error"];

/// Outbound frame asking the server to stream one task's updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeFrame<'a> {
    pub task_id: &'a str,
    pub task_type: TaskType,
    pub msg_type: &'a str,
}

/// Classify a text frame.
///
/// Never fails: malformed input becomes [`InboundMessage::Invalid`].
pub fn parse_message(text: &str) -> InboundMessage {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return InboundMessage::Invalid {
                task_id: None,
                reason: format!("not JSON: {e}"),
            }
        }
    };

    if !value.is_object() {
        return InboundMessage::Invalid {
            task_id: None,
            reason: "frame is not a JSON object".into(),
        };
    }

    let attributed_task_id = terminal_task_id(&value);

    match serde_json::from_value::<WireMessage>(value) {
        Ok(WireMessage::Progress { task_id, message }) => InboundMessage::Progress {
            task_id,
            percent: coerce_percent(&message),
        },
        Ok(WireMessage::Complete {
            task_id,
            message,
            result,
        }) => match result.or(message) {
            Some(payload) => InboundMessage::Complete { task_id, payload },
            None => InboundMessage::Invalid {
                task_id: Some(task_id),
                reason: "completion frame carries no result".into(),
            },
        },
        Ok(WireMessage::Error { task_id, message }) => InboundMessage::Error { task_id, message },
        Err(e) => InboundMessage::Invalid {
            task_id: attributed_task_id,
            reason: e.to_string(),
        },
    }
}

/// The `taskId` of a frame whose `type` is terminal, if both are strings.
fn terminal_task_id(value: &serde_json::Value) -> Option<TaskId> {
    let kind = value.get("type")?.as_str()?;
    if !TERMINAL_TYPES.contains(&kind) {
        return None;
    }
    value
        .get("taskId")?
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
}

/// Interpret a progress payload as a number. Numeric strings count;
/// anything else (blank, text, objects) does not.
fn coerce_percent(message: &serde_json::Value) -> Option<f64> {
    let n = match message {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}
