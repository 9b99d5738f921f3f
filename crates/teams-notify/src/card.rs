//! Notification card construction.
//!
//! [`CardBuilder::build`] turns an [`AnalysisOutcome`] into a
//! [`NotificationCard`]. It is a pure function: every optional part of the
//! outcome has a fallback, and facts always follow the tracked-metric order
//! rather than the order conditions arrive in.
//!
//! [`NotificationCard::to_message`] renders the card as a Teams message
//! carrying an Adaptive Card attachment.

use serde::Serialize;

use crate::error::{NotifyError, Result};
use crate::types::{AnalysisOutcome, EvaluationStatus};

/// Rendered for any value that is absent or was not computed.
pub const NOT_AVAILABLE: &str = "N/A";

/// Rendered when the outcome carries no task status.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Heading shown at the top of every card.
pub const CARD_HEADING: &str = "SonarQube Analysis Result";

const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const ADAPTIVE_CARD_VERSION: &str = "1.5";
const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// A metric rendered as a fact on the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedMetric {
    /// Condition metric key, e.g. `new_coverage`.
    pub key: String,
    /// Human label, e.g. `New Coverage`.
    pub label: String,
}

impl TrackedMetric {
    /// Creates a tracked metric.
    #[must_use]
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    /// The metrics rendered when no other set is configured.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("new_violations", "New Violations"),
            Self::new("new_coverage", "New Coverage"),
            Self::new("new_duplicated_lines_density", "New Duplicated Lines Density"),
            Self::new("new_security_hotspots_reviewed", "New Security Hotspots Reviewed"),
        ]
    }
}

/// A label/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    /// Label shown in the left column.
    pub title: String,
    /// Rendered value.
    pub value: String,
}

impl Fact {
    fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
        }
    }
}

/// Everything shown on one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCard {
    /// Result line, e.g. `Demo SonarQube Analysis Result`.
    pub title: String,
    /// Label next to the avatar.
    pub team_label: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Task status name or `UNKNOWN`.
    pub status: String,
    /// `"{gate} ({status})"` or `N/A`.
    pub quality_gate_summary: String,
    /// One fact per tracked metric, in tracked order.
    pub facts: Vec<Fact>,
    /// Dashboard deep link.
    pub action_url: String,
}

/// Builds cards for a fixed list of tracked metrics.
#[derive(Debug, Clone)]
pub struct CardBuilder {
    tracked: Vec<TrackedMetric>,
}

impl CardBuilder {
    /// Creates a builder for the given metrics.
    #[must_use]
    pub fn new(tracked: Vec<TrackedMetric>) -> Self {
        Self { tracked }
    }

    /// Returns the tracked metrics.
    #[must_use]
    pub fn tracked(&self) -> &[TrackedMetric] {
        &self.tracked
    }

    /// Builds a card. Never fails.
    #[must_use]
    pub fn build(
        &self,
        outcome: &AnalysisOutcome,
        avatar_url: &str,
        team_label: &str,
        action_url: &str,
    ) -> NotificationCard {
        let status = outcome
            .task_status
            .map_or(UNKNOWN_STATUS, |s| s.as_str())
            .to_string();

        let quality_gate_summary = outcome.quality_gate.as_ref().map_or_else(
            || NOT_AVAILABLE.to_string(),
            |gate| format!("{} ({})", gate.name, gate.status),
        );

        let facts = self
            .tracked
            .iter()
            .map(|metric| Fact::new(&metric.label, metric_value(outcome, &metric.key)))
            .collect();

        NotificationCard {
            title: format!("{} {CARD_HEADING}", outcome.project_name),
            team_label: team_label.to_string(),
            avatar_url: avatar_url.to_string(),
            status,
            quality_gate_summary,
            facts,
            action_url: action_url.to_string(),
        }
    }
}

impl Default for CardBuilder {
    fn default() -> Self {
        Self::new(TrackedMetric::defaults())
    }
}

/// Builds a card for the default tracked metrics.
#[must_use]
pub fn build(
    outcome: &AnalysisOutcome,
    avatar_url: &str,
    team_label: &str,
    action_url: &str,
) -> NotificationCard {
    CardBuilder::default().build(outcome, avatar_url, team_label, action_url)
}

fn metric_value(outcome: &AnalysisOutcome, metric_key: &str) -> String {
    outcome
        .conditions()
        .iter()
        .find(|c| c.metric_key == metric_key)
        .and_then(|c| match c.status {
            EvaluationStatus::NoValue => None,
            _ => c.value.clone(),
        })
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Builds the dashboard link for a project.
#[must_use]
pub fn action_url(base_url: &str, project_key: &str) -> String {
    format!("{}/dashboard?id={project_key}", base_url.trim_end_matches('/'))
}

impl NotificationCard {
    /// Renders the card as a Teams message.
    #[must_use]
    pub fn to_message(&self) -> TeamsMessage {
        let mut facts = Vec::with_capacity(self.facts.len() + 2);
        facts.push(Fact::new("Status", &self.status));
        facts.push(Fact::new("Quality Gate", &self.quality_gate_summary));
        facts.extend(self.facts.iter().cloned());

        let body = vec![
            CardElement::TextBlock(TextBlock {
                text: CARD_HEADING.to_string(),
                size: Some("Medium"),
                weight: Some("Bolder"),
                wrap: None,
                color: None,
            }),
            CardElement::ColumnSet {
                columns: vec![
                    Column {
                        items: vec![CardElement::Image {
                            url: self.avatar_url.clone(),
                            alt_text: self.team_label.clone(),
                            style: "Person",
                            size: "Small",
                        }],
                        width: "auto",
                    },
                    Column {
                        items: vec![CardElement::TextBlock(TextBlock {
                            text: self.team_label.clone(),
                            size: None,
                            weight: Some("Bolder"),
                            wrap: Some(true),
                            color: None,
                        })],
                        width: "stretch",
                    },
                ],
            },
            CardElement::TextBlock(TextBlock {
                text: self.title.clone(),
                size: None,
                weight: Some("Bolder"),
                wrap: Some(true),
                color: Some("Accent"),
            }),
            CardElement::FactSet { facts },
        ];

        TeamsMessage {
            kind: "message",
            attachments: vec![Attachment {
                content_type: ADAPTIVE_CARD_CONTENT_TYPE,
                content: AdaptiveCard {
                    schema: ADAPTIVE_CARD_SCHEMA,
                    version: ADAPTIVE_CARD_VERSION,
                    body,
                    actions: vec![OpenUrlAction {
                        title: "View Analysis",
                        url: self.action_url.clone(),
                    }],
                },
            }],
        }
    }

    /// Serializes the Teams message to JSON.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Serialization` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_message()).map_err(NotifyError::from)
    }
}

/// Top-level Teams incoming-webhook message.
#[derive(Debug, Clone, Serialize)]
pub struct TeamsMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Attachment {
    content_type: &'static str,
    content: AdaptiveCard,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "AdaptiveCard")]
struct AdaptiveCard {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    body: Vec<CardElement>,
    actions: Vec<OpenUrlAction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum CardElement {
    TextBlock(TextBlock),
    ColumnSet {
        columns: Vec<Column>,
    },
    Image {
        url: String,
        #[serde(rename = "altText")]
        alt_text: String,
        style: &'static str,
        size: &'static str,
    },
    FactSet {
        facts: Vec<Fact>,
    },
}

#[derive(Debug, Clone, Serialize)]
struct TextBlock {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wrap: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "Column")]
struct Column {
    items: Vec<CardElement>,
    width: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "Action.OpenUrl")]
struct OpenUrlAction {
    title: &'static str,
    url: String,
}
