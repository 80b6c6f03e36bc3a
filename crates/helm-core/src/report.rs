//! Per-plan execution audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::LocalOrder;

/// Outcome of executing one plan. Append-only once complete.
///
/// Every order the plan touched is listed, including guardrail-rejected
/// ones: the audit trail must show what was refused, not only what ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// False when any order errored or the plan was kill-switch stopped.
    pub success: bool,
    pub orders: Vec<LocalOrder>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ExecutionReport {
    #[must_use]
    pub fn begin(plan_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            plan_id: plan_id.into(),
            started_at: now,
            completed_at: now,
            success: true,
            orders: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Seal the report: stamp completion time and derive the success flag.
    pub fn complete(&mut self) {
        self.completed_at = Utc::now();
        self.success = self.errors.is_empty();
    }
}
