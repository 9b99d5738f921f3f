//! Read-only view of a completed analysis.
//!
//! This module provides the types the host hands to the delivery phase:
//! - [`TaskStatus`]: How the analysis task itself ended
//! - [`QualityGateStatus`]: The overall gate verdict
//! - [`EvaluationStatus`]: The verdict of a single condition
//! - [`Condition`]: A single metric check
//! - [`QualityGate`]: The gate and its conditions
//! - [`AnalysisOutcome`]: Everything the notifier reads about one analysis

use serde::{Deserialize, Serialize};

/// How the analysis task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The task completed.
    Success,
    /// The task failed.
    Failed,
    /// The task was cancelled.
    Canceled,
}

impl TaskStatus {
    /// Returns the status name as rendered on the card.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall quality gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityGateStatus {
    /// The gate passed.
    Ok,
    /// Legacy warning state.
    Warn,
    /// The gate failed.
    Error,
}

impl QualityGateStatus {
    /// Returns the status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for QualityGateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationStatus {
    /// The metric met its threshold.
    Ok,
    /// Legacy warning threshold crossed.
    Warn,
    /// The metric crossed its error threshold.
    Error,
    /// The metric was not computed for this analysis. Not a failure.
    NoValue,
}

/// A single metric check attached to a quality gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Metric key, e.g. `new_coverage`.
    pub metric_key: String,
    /// Evaluation result.
    pub status: EvaluationStatus,
    /// Measured value, if computed.
    #[serde(default)]
    pub value: Option<String>,
}

impl Condition {
    /// Creates a condition with a measured value.
    #[must_use]
    pub fn new(
        metric_key: impl Into<String>,
        status: EvaluationStatus,
        value: impl Into<String>,
    ) -> Self {
        Self {
            metric_key: metric_key.into(),
            status,
            value: Some(value.into()),
        }
    }

    /// Creates a condition for a metric that was not computed.
    #[must_use]
    pub fn no_value(metric_key: impl Into<String>) -> Self {
        Self {
            metric_key: metric_key.into(),
            status: EvaluationStatus::NoValue,
            value: None,
        }
    }
}

/// A quality gate and its conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGate {
    /// Gate name, e.g. `Sonar way`.
    pub name: String,
    /// Overall verdict.
    pub status: QualityGateStatus,
    /// Conditions in arbitrary order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl QualityGate {
    /// Creates a gate with no conditions.
    #[must_use]
    pub fn new(name: impl Into<String>, status: QualityGateStatus) -> Self {
        Self {
            name: name.into(),
            status,
            conditions: Vec::new(),
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Finds the first condition for a metric key.
    #[must_use]
    pub fn find(&self, metric_key: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.metric_key == metric_key)
    }
}

/// Everything the notifier reads about one completed analysis.
///
/// Every field except the project identity is optional; the card builder
/// supplies a default for each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Host task id, used to key the snapshot store.
    #[serde(default)]
    pub task_id: Option<String>,
    /// Human project name.
    pub project_name: String,
    /// Project key used in dashboard links.
    pub project_key: String,
    /// How the analysis task ended.
    #[serde(default)]
    pub task_status: Option<TaskStatus>,
    /// The attached quality gate, if any.
    #[serde(default)]
    pub quality_gate: Option<QualityGate>,
}

impl AnalysisOutcome {
    /// Creates an outcome for a project with no task status or gate.
    #[must_use]
    pub fn new(project_name: impl Into<String>, project_key: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            project_key: project_key.into(),
            ..Self::default()
        }
    }

    /// Sets the host task id.
    #[must_use]
    pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    /// Sets the task status.
    #[must_use]
    pub const fn with_task_status(mut self, status: TaskStatus) -> Self {
        self.task_status = Some(status);
        self
    }

    /// Attaches a quality gate.
    #[must_use]
    pub fn with_quality_gate(mut self, gate: QualityGate) -> Self {
        self.quality_gate = Some(gate);
        self
    }

    /// Returns the gate status, if a gate is attached.
    #[must_use]
    pub fn quality_gate_status(&self) -> Option<QualityGateStatus> {
        self.quality_gate.as_ref().map(|g| g.status)
    }

    /// Returns the gate name, if a gate is attached.
    #[must_use]
    pub fn quality_gate_name(&self) -> Option<&str> {
        self.quality_gate.as_ref().map(|g| g.name.as_str())
    }

    /// Returns all conditions; empty without a gate.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        self.quality_gate
            .as_ref()
            .map(|g| g.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// Returns true only if a gate is attached and it failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.quality_gate_status() == Some(QualityGateStatus::Error)
    }
}
