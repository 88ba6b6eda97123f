//! Types mirrored from the orchestration backend's REST API
//!
//! Deserialized by the Dioxus run console (WASM); the backend owns the
//! canonical schema, so every struct tolerates unknown fields and fills
//! missing optional ones with defaults.

use serde::{Deserialize, Serialize};

// ============================================================================
// Session / Turn
// ============================================================================

/// A conversation session grouping one or more turns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// One user turn within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub turn_number: u32,
    #[serde(default)]
    pub user_input: Option<String>,
}

// ============================================================================
// Runs
// ============================================================================

/// Lifecycle state of a run as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Backend may grow new states; render them neutrally instead of
    /// failing the whole snapshot decode.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// A run that has not reached a terminal state may still stream output.
    pub fn is_live(self) -> bool {
        matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

/// One execution instance comprising `variations` parallel agent lanes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub variations: u32,
    #[serde(default)]
    pub winning_variation_id: Option<u32>,
    #[serde(default)]
    pub results: serde_json::Value,
    #[serde(default)]
    pub agent_config: serde_json::Value,
}

// ============================================================================
// Outputs
// ============================================================================

/// One unit of persisted agent output, as returned by
/// `GET /runs/{id}/outputs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentOutput {
    /// Server-assigned row id. Absent for rows the backend has not yet
    /// persisted.
    #[serde(default)]
    pub id: Option<i64>,
    pub run_id: String,
    #[serde(default)]
    pub variation_id: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub output_type: String,
}

// ============================================================================
// Diffs
// ============================================================================

/// One side of a file-pair diff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffFile {
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// A before/after file pair produced by one variation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileDiff {
    #[serde(rename = "oldFile")]
    pub old_file: DiffFile,
    #[serde(rename = "newFile")]
    pub new_file: DiffFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_decodes_backend_payload() {
        let json = serde_json::json!({
            "id": "run-1",
            "session_id": "sess-1",
            "turn_id": "turn-1",
            "status": "running",
            "variations": 2,
            "results": {},
            "agent_config": {"models": ["a", "b"]},
            "created_at": "2026-03-01T10:00:00"
        });

        let run: Run = serde_json::from_value(json).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.variations, 2);
        assert_eq!(run.winning_variation_id, None);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let run: Run = serde_json::from_value(serde_json::json!({
            "id": "run-1",
            "status": "paused"
        }))
        .unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_live());
    }

    #[test]
    fn test_live_statuses() {
        assert!(RunStatus::Pending.is_live());
        assert!(RunStatus::Running.is_live());
        assert!(!RunStatus::Completed.is_live());
        assert!(!RunStatus::Failed.is_live());
    }

    #[test]
    fn test_file_diff_uses_camel_case_keys() {
        let diff: FileDiff = serde_json::from_value(serde_json::json!({
            "oldFile": {"name": "src/lib.rs", "content": "old"},
            "newFile": {"name": "src/lib.rs", "content": "new"}
        }))
        .unwrap();
        assert_eq!(diff.old_file.name, "src/lib.rs");
        assert_eq!(diff.new_file.content, "new");
    }

    #[test]
    fn test_agent_output_missing_id() {
        let output: AgentOutput = serde_json::from_value(serde_json::json!({
            "run_id": "run-1",
            "variation_id": 1,
            "content": "hello",
            "output_type": "llm"
        }))
        .unwrap();
        assert_eq!(output.id, None);
        assert_eq!(output.variation_id, 1);
    }
}
