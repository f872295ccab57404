use serde::{Deserialize, Serialize};

/// Server-assigned identifier of one generation job. Opaque to the client.
pub type TaskId = String;

/// `msgType` value of the frame that subscribes to a task's updates.
pub const MSG_TYPE_SUBSCRIBE: &str = "subscribe";

/// The kinds of generation job the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Full module (microlessons with LED and SME responses).
    #[serde(rename = "module")]
    Module,
    /// Module outline (microlesson titles, objectives and steps).
    #[serde(rename = "moduleOutline")]
    ModuleOutline,
}

impl TaskType {
    /// Wire name used in the `taskType` field of subscribe frames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::ModuleOutline => "moduleOutline",
        }
    }

    /// Path segment of the `/api/v1/{segment}/generate` endpoint.
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::ModuleOutline => "module-outline",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        for task_type in [TaskType::Module, TaskType::ModuleOutline] {
            let json = serde_json::to_value(task_type).unwrap();
            assert_eq!(json, task_type.as_str());
        }
    }

    #[test]
    fn endpoint_segments() {
        assert_eq!(TaskType::Module.endpoint_segment(), "module");
        assert_eq!(TaskType::ModuleOutline.endpoint_segment(), "module-outline");
    }
}
