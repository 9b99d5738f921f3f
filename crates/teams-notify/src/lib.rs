//! Quality gate notifications for Microsoft Teams webhooks.
//!
//! `teams-notify` watches for completed analyses and posts an Adaptive Card to
//! a Teams incoming webhook, gated by configuration and by the quality gate
//! outcome.
//!
//! # Features
//!
//! - **Layered configuration**: structured settings, process properties,
//!   environment variables and compiled-in defaults, first non-blank wins
//! - **Validation phase**: checks the webhook URL policy and publishes a verdict
//! - **Delivery phase**: send gate, card construction, one HTTP POST
//! - **Graceful cards**: metrics that were not computed render as `N/A`
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use teams_notify::{
//!     AnalysisOutcome, ConfigSourceChain, EnvSource, Notifier, QualityGate,
//!     QualityGateStatus, TaskStatus,
//! };
//!
//! # async fn run() -> teams_notify::Result<()> {
//! let mut settings = HashMap::new();
//! settings.insert("sonar.msteams.enable".to_string(), "true".to_string());
//! settings.insert(
//!     "sonar.msteams.webhook.url".to_string(),
//!     "https://example.webhook.office.com/webhookb2/abc".to_string(),
//! );
//!
//! let chain = ConfigSourceChain::new(settings, HashMap::new(), EnvSource::process());
//! let notifier = Notifier::new(chain)?;
//!
//! let outcome = AnalysisOutcome::new("My Project", "my-project")
//!     .with_task_id("AYx1")
//!     .with_task_status(TaskStatus::Success)
//!     .with_quality_gate(QualityGate::new("Sonar way", QualityGateStatus::Error));
//!
//! let report = notifier.on_analysis_finished(&outcome).await;
//! println!("notification: {report}");
//! # Ok(())
//! # }
//! ```
//!
//! # Running the phases separately
//!
//! Hosts that call validation and delivery from different callbacks pass the
//! verdict along, or let the notifier look it up by task id:
//!
//! ```rust,ignore
//! let verdict = notifier.validate(outcome.task_id.as_deref());
//! // ... later, for the same analysis ...
//! notifier.deliver(&outcome, Some(&verdict)).await;
//! // or
//! notifier.maybe_notify(&outcome).await;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod card;
pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod notifier;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod types;

// Re-export main types at crate root
pub use card::{CardBuilder, Fact, NotificationCard, TrackedMetric};
pub use dispatcher::{DeliveryResult, DispatcherConfig, WebhookDispatcher};
pub use error::{ErrorKind, NotifyError, Result};
pub use keys::{ConfigKey, KeyType};
pub use notifier::{DeliveryReport, Notifier, NotifierSettings};
pub use resolver::{validate, ResolvedConfig, ValidationVerdict};
pub use snapshot::{Snapshot, SnapshotStore};
pub use source::{ConfigSource, ConfigSourceChain, EnvSource, MapSource, Origin};
pub use types::{
    AnalysisOutcome, Condition, EvaluationStatus, QualityGate, QualityGateStatus, TaskStatus,
};
