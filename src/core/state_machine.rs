//! Stage tracking for a single workflow invocation
//!
//! Transitions are kept in memory only and discarded with the invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    Initial,
    Preparing,
    CreatingDocument,
    Publishing,
    Unpublishing,
    CleaningUp,
    Completed,
    Failed,
}

/// Stage transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTransition {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// In-memory stage machine for one publish or unpublish call
#[derive(Debug)]
pub struct WorkflowStateMachine {
    current_stage: WorkflowStage,
    transitions: Vec<StageTransition>,
    started_at: DateTime<Utc>,
}

impl Default for WorkflowStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStateMachine {
    pub fn new() -> Self {
        Self {
            current_stage: WorkflowStage::Initial,
            transitions: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Move to `to`, recording an optional note
    pub fn transition(&mut self, to: WorkflowStage, note: Option<&str>) {
        if self.is_terminal() {
            tracing::warn!(from = ?self.current_stage, to = ?to, "transition after a terminal stage");
        }

        let transition = StageTransition {
            from: self.current_stage,
            to,
            timestamp: Utc::now(),
            note: note.map(str::to_string),
        };

        tracing::debug!(from = ?transition.from, to = ?to, "workflow stage transition");

        self.transitions.push(transition);
        self.current_stage = to;
    }

    pub fn stage(&self) -> WorkflowStage {
        self.current_stage
    }

    pub fn transitions(&self) -> &[StageTransition] {
        &self.transitions
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.current_stage,
            WorkflowStage::Completed | WorkflowStage::Failed
        )
    }

    /// Milliseconds between creation and the latest transition
    pub fn elapsed_ms(&self) -> i64 {
        match self.transitions.last() {
            Some(last) => (last.timestamp - self.started_at).num_milliseconds(),
            None => 0,
        }
    }

    /// Transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let note = t
                    .note
                    .as_ref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default();
                format!("{}: {:?} → {:?}{}", t.timestamp.to_rfc3339(), t.from, t.to, note)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let machine = WorkflowStateMachine::new();

        assert_eq!(machine.stage(), WorkflowStage::Initial);
        assert!(!machine.is_terminal());
        assert_eq!(machine.elapsed_ms(), 0);
    }

    #[test]
    fn test_transition() {
        let mut machine = WorkflowStateMachine::new();
        machine.transition(WorkflowStage::Preparing, None);
        machine.transition(WorkflowStage::CreatingDocument, Some("roads.mxd"));

        assert_eq!(machine.stage(), WorkflowStage::CreatingDocument);
        assert_eq!(machine.transitions().len(), 2);
        assert_eq!(machine.transitions()[1].note.as_deref(), Some("roads.mxd"));
    }

    #[test]
    fn test_terminal_stages() {
        let mut machine = WorkflowStateMachine::new();
        machine.transition(WorkflowStage::Completed, None);
        assert!(machine.is_terminal());

        machine.transition(WorkflowStage::Failed, None);
        assert!(machine.is_terminal());
    }

    #[test]
    fn test_elapsed_time() {
        let mut machine = WorkflowStateMachine::new();
        std::thread::sleep(std::time::Duration::from_millis(20));
        machine.transition(WorkflowStage::Completed, None);

        assert!(machine.elapsed_ms() >= 20);
    }

    #[test]
    fn test_history() {
        let mut machine = WorkflowStateMachine::new();
        machine.transition(WorkflowStage::Preparing, None);
        machine.transition(WorkflowStage::Unpublishing, Some("Roads"));

        let history = machine.history();
        assert!(history.contains("Initial → Preparing"));
        assert!(history.contains("Preparing → Unpublishing (Roads)"));
    }
}
