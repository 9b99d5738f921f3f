//! The two notification phases.
//!
//! This module provides the [`Notifier`], the entry point the host calls on
//! every analysis completion. Validation resolves and checks configuration and
//! publishes the verdict; delivery applies the send gate, builds the card and
//! dispatches it. Neither phase ever returns an error or panics into the host.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::card::{action_url, CardBuilder, TrackedMetric};
use crate::dispatcher::{DeliveryResult, DispatcherConfig, WebhookDispatcher};
use crate::error::{ErrorKind, NotifyError, Result};
use crate::keys::{mask_secret, ConfigKey};
use crate::resolver::{
    self, check_webhook_url, panic_message, ResolvedConfig, ValidationVerdict,
    REASON_WEBHOOK_INVALID,
};
use crate::snapshot::{SnapshotStore, DEFAULT_MAX_TASKS};
use crate::source::ConfigSourceChain;
use crate::types::AnalysisOutcome;

/// Settings for a [`Notifier`] that do not come from the source chain.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// Metrics rendered as facts, in order.
    pub tracked_metrics: Vec<TrackedMetric>,
    /// HTTP settings.
    pub dispatcher: DispatcherConfig,
    /// Maximum per-task snapshots kept.
    pub max_tasks: usize,
}

impl NotifierSettings {
    /// Sets the tracked metrics.
    #[must_use]
    pub fn with_tracked_metrics(mut self, metrics: Vec<TrackedMetric>) -> Self {
        self.tracked_metrics = metrics;
        self
    }

    /// Sets the HTTP settings.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Sets the snapshot bound.
    #[must_use]
    pub const fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            tracked_metrics: TrackedMetric::defaults(),
            dispatcher: DispatcherConfig::default(),
            max_tasks: DEFAULT_MAX_TASKS,
        }
    }
}

/// What the delivery phase did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    /// The notifier is switched off.
    Disabled,
    /// No webhook URL is configured.
    NotConfigured,
    /// The webhook URL fails the scheme policy.
    Invalid,
    /// The gate passed and only failures are reported.
    SkippedPassed,
    /// A request was attempted.
    Sent(DeliveryResult),
    /// The phase faulted before a request was attempted.
    Faulted(String),
}

impl DeliveryReport {
    /// Returns the delivery result, with `attempted = false` for skips.
    #[must_use]
    pub fn result(&self) -> DeliveryResult {
        match self {
            Self::Sent(result) => result.clone(),
            Self::Faulted(message) => DeliveryResult {
                attempted: false,
                http_status: None,
                succeeded: false,
                error_kind: Some(ErrorKind::UnexpectedFault),
                message: Some(message.clone()),
            },
            Self::Invalid => DeliveryResult {
                attempted: false,
                http_status: None,
                succeeded: false,
                error_kind: Some(ErrorKind::ConfigInvalid),
                message: Some(self.to_string()),
            },
            Self::Disabled | Self::NotConfigured | Self::SkippedPassed => DeliveryResult {
                attempted: false,
                http_status: None,
                succeeded: false,
                error_kind: None,
                message: Some(self.to_string()),
            },
        }
    }

    /// Returns true if a card was accepted by the webhook.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Sent(DeliveryResult { succeeded: true, .. }))
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::NotConfigured => write!(f, "not configured"),
            Self::Invalid => f.write_str(REASON_WEBHOOK_INVALID),
            Self::SkippedPassed => write!(f, "skipped: passed and failed-only gate active"),
            Self::Sent(result) if result.succeeded => write!(f, "delivered"),
            Self::Sent(_) => write!(f, "delivery failed"),
            Self::Faulted(message) => write!(f, "faulted: {message}"),
        }
    }
}

/// Entry point for both phases.
#[derive(Debug)]
pub struct Notifier {
    chain: Arc<ConfigSourceChain>,
    snapshots: Arc<SnapshotStore>,
    cards: CardBuilder,
    dispatcher: WebhookDispatcher,
}

impl Notifier {
    /// Creates a notifier with default settings.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built.
    pub fn new(chain: ConfigSourceChain) -> Result<Self> {
        Self::with_settings(chain, NotifierSettings::default())
    }

    /// Creates a notifier with custom settings.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built.
    pub fn with_settings(chain: ConfigSourceChain, settings: NotifierSettings) -> Result<Self> {
        Ok(Self {
            chain: Arc::new(chain),
            snapshots: Arc::new(SnapshotStore::with_max_tasks(settings.max_tasks)),
            cards: CardBuilder::new(settings.tracked_metrics),
            dispatcher: WebhookDispatcher::new(settings.dispatcher)?,
        })
    }

    /// Returns the snapshot store.
    #[must_use]
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Returns the source chain.
    #[must_use]
    pub fn chain(&self) -> &ConfigSourceChain {
        &self.chain
    }

    /// Validation phase: resolves and checks configuration, publishes the
    /// verdict for `task_id`, and returns it so the host can hand it straight
    /// to [`Notifier::deliver`].
    pub fn validate(&self, task_id: Option<&str>) -> ValidationVerdict {
        info!(task_id = ?task_id, "configuration validation started");
        let verdict = resolver::validate(&self.chain);
        debug!(task_id = ?task_id, valid = verdict.valid, "publishing verdict");
        self.snapshots.publish(task_id, verdict.clone());
        verdict
    }

    /// Delivery phase with an explicit verdict from [`Notifier::validate`].
    ///
    /// An absent or invalid verdict triggers a direct, uncached walk of the
    /// source chain.
    pub async fn deliver(
        &self,
        outcome: &AnalysisOutcome,
        verdict: Option<&ValidationVerdict>,
    ) -> DeliveryReport {
        let guarded = AssertUnwindSafe(self.deliver_inner(outcome, verdict)).catch_unwind();
        match guarded.await {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(project = %outcome.project_key, error = %message, "notification delivery faulted");
                DeliveryReport::Faulted(message)
            }
        }
    }

    /// Delivery phase reading the verdict published for the outcome's task.
    ///
    /// Outcomes without a task id read the latest snapshot.
    pub async fn maybe_notify(&self, outcome: &AnalysisOutcome) -> DeliveryReport {
        let snapshot = self.snapshots.for_delivery(outcome.task_id.as_deref());
        if let Some(snapshot) = &snapshot {
            debug!(
                generation = snapshot.generation,
                age_ms = (chrono::Utc::now() - snapshot.verdict.validated_at).num_milliseconds(),
                "using published snapshot"
            );
        }
        self.deliver(outcome, snapshot.as_ref().map(|s| &s.verdict))
            .await
    }

    /// Runs both phases for one completed analysis, passing the verdict
    /// directly from validation to delivery.
    pub async fn on_analysis_finished(&self, outcome: &AnalysisOutcome) -> DeliveryReport {
        info!(project = %outcome.project_key, "analysis finished");
        let task_id = outcome.task_id.as_deref();
        let verdict = self.validate(task_id);
        if let Some(id) = task_id {
            self.snapshots.take(id);
        }
        let report = self.deliver(outcome, Some(&verdict)).await;
        info!(project = %outcome.project_key, report = %report, "analysis notification finished");
        report
    }

    async fn deliver_inner(
        &self,
        outcome: &AnalysisOutcome,
        verdict: Option<&ValidationVerdict>,
    ) -> DeliveryReport {
        let config = match verdict {
            Some(v) if v.valid => v.config.clone(),
            _ => {
                info!(
                    project = %outcome.project_key,
                    "no valid verdict available, resolving configuration directly"
                );
                ResolvedConfig::resolve(&self.chain)
            }
        };

        if !config.enabled {
            info!(
                key = %ConfigKey::Enabled,
                "notifier disabled, set to true to enable"
            );
            return DeliveryReport::Disabled;
        }

        match check_webhook_url(&config.webhook_url) {
            Ok(()) => {}
            Err(NotifyError::ConfigMissing { .. }) => {
                warn!(key = %ConfigKey::WebhookUrl, "webhook url not configured");
                return DeliveryReport::NotConfigured;
            }
            Err(err) => {
                warn!(
                    url = %mask_secret(&config.webhook_url),
                    error = %err,
                    "webhook url rejected, not sending"
                );
                return DeliveryReport::Invalid;
            }
        }

        let failed = outcome.is_failed();
        if config.send_on_failed_only && !failed {
            info!(
                project = %outcome.project_key,
                "quality gate passed and failed-only gate active, skipping notification"
            );
            return DeliveryReport::SkippedPassed;
        }

        let link = action_url(&config.base_url, &outcome.project_key);
        let card = self
            .cards
            .build(outcome, &config.avatar_url, &config.team_name, &link);

        info!(
            project = %outcome.project_name,
            failed,
            "sending notification"
        );
        DeliveryReport::Sent(self.dispatcher.dispatch(&config.webhook_url, &card).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConfigSource, EnvSource};
    use crate::types::{QualityGate, QualityGateStatus, TaskStatus};
    use std::collections::HashMap;

    #[derive(Debug)]
    struct PanickingSource;

    impl ConfigSource for PanickingSource {
        fn name(&self) -> &str {
            "panicking"
        }

        #[allow(clippy::panic)]
        fn lookup(&self, _property: &str) -> Result<Option<String>> {
            panic!("boom")
        }
    }

    fn notifier(pairs: &[(&str, &str)]) -> Notifier {
        let structured = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let chain = ConfigSourceChain::new(
            structured,
            HashMap::new(),
            EnvSource::from_map(HashMap::new()),
        );
        Notifier::new(chain).unwrap()
    }

    fn passing() -> AnalysisOutcome {
        AnalysisOutcome::new("Demo", "demo")
            .with_task_status(TaskStatus::Success)
            .with_quality_gate(QualityGate::new("Sonar way", QualityGateStatus::Ok))
    }

    mod report_tests {
        use super::*;

        #[test]
        fn skip_reports_are_not_attempted() {
            for report in [
                DeliveryReport::Disabled,
                DeliveryReport::NotConfigured,
                DeliveryReport::SkippedPassed,
            ] {
                let result = report.result();
                assert!(!result.attempted);
                assert!(!result.succeeded);
                assert!(result.error_kind.is_none());
                assert!(!report.is_delivered());
            }
        }

        #[test]
        fn report_display() {
            assert_eq!(DeliveryReport::Disabled.to_string(), "disabled");
            assert_eq!(DeliveryReport::NotConfigured.to_string(), "not configured");
            assert_eq!(
                DeliveryReport::SkippedPassed.to_string(),
                "skipped: passed and failed-only gate active"
            );
            assert_eq!(
                DeliveryReport::Sent(DeliveryResult::delivered(200)).to_string(),
                "delivered"
            );
        }

        #[test]
        fn invalid_report_is_not_attempted() {
            let result = DeliveryReport::Invalid.result();
            assert!(!result.attempted);
            assert_eq!(result.error_kind, Some(ErrorKind::ConfigInvalid));
            assert_eq!(DeliveryReport::Invalid.to_string(), "invalid webhook url");
        }

        #[test]
        fn faulted_report_is_unexpected() {
            let result = DeliveryReport::Faulted("boom".to_string()).result();
            assert_eq!(result.error_kind, Some(ErrorKind::UnexpectedFault));
        }
    }

    mod gate_tests {
        use super::*;

        #[tokio::test]
        async fn disabled_by_default() {
            let n = notifier(&[]);
            assert_eq!(n.on_analysis_finished(&passing()).await, DeliveryReport::Disabled);
        }

        #[tokio::test]
        async fn invalid_verdict_falls_back_to_direct_resolution() {
            let n = notifier(&[("sonar.msteams.enable", "true")]);
            let verdict = n.validate(None);
            assert!(!verdict.valid);
            assert_eq!(
                n.deliver(&passing(), Some(&verdict)).await,
                DeliveryReport::NotConfigured
            );
        }

        #[tokio::test]
        async fn rejected_webhook_is_not_sent_without_verdict() {
            let n = notifier(&[
                ("sonar.msteams.enable", "true"),
                ("sonar.msteams.webhook.url", "http://example.com/hook"),
                ("sonar.msteams.send.on.failed", "false"),
            ]);
            assert_eq!(n.deliver(&passing(), None).await, DeliveryReport::Invalid);
        }

        #[tokio::test]
        async fn panicking_source_faults_delivery() {
            let chain = ConfigSourceChain::builder().source(PanickingSource).build();
            let n = Notifier::new(chain).unwrap();
            assert_eq!(
                n.deliver(&passing(), None).await,
                DeliveryReport::Faulted("boom".to_string())
            );
        }

        #[tokio::test]
        async fn failed_only_skips_passing_gate() {
            let n = notifier(&[
                ("sonar.msteams.enable", "true"),
                ("sonar.msteams.webhook.url", "http://127.0.0.1:1/hook"),
                ("sonar.msteams.send.on.failed", "true"),
            ]);
            assert_eq!(
                n.on_analysis_finished(&passing()).await,
                DeliveryReport::SkippedPassed
            );
        }

        #[tokio::test]
        async fn missing_gate_counts_as_not_failed() {
            let n = notifier(&[
                ("sonar.msteams.enable", "true"),
                ("sonar.msteams.webhook.url", "http://127.0.0.1:1/hook"),
            ]);
            let outcome = AnalysisOutcome::new("Demo", "demo");
            assert_eq!(
                n.on_analysis_finished(&outcome).await,
                DeliveryReport::SkippedPassed
            );
        }

        #[tokio::test]
        async fn maybe_notify_without_snapshot_resolves_directly() {
            let n = notifier(&[("sonar.msteams.enable", "false")]);
            assert!(n.snapshots().latest().is_none());
            assert_eq!(n.maybe_notify(&passing()).await, DeliveryReport::Disabled);
        }
    }

    mod phase_tests {
        use super::*;

        #[test]
        fn validate_publishes_snapshot() {
            let n = notifier(&[]);
            let verdict = n.validate(Some("task-1"));
            assert!(verdict.valid);
            let snapshot = n.snapshots().get("task-1").unwrap();
            assert_eq!(snapshot.generation, 1);
            assert_eq!(snapshot.verdict.valid, verdict.valid);
        }

        #[tokio::test]
        async fn on_analysis_finished_consumes_task_snapshot() {
            let n = notifier(&[]);
            let outcome = passing().with_task_id("task-7");
            n.on_analysis_finished(&outcome).await;
            assert!(n.snapshots().get("task-7").is_none());
            assert_eq!(n.snapshots().generation(), 1);
        }

        #[test]
        fn settings_builders() {
            let settings = NotifierSettings::default()
                .with_tracked_metrics(vec![TrackedMetric::new("new_coverage", "Coverage")])
                .with_dispatcher(DispatcherConfig::default().with_timeout_secs(5))
                .with_max_tasks(4);
            assert_eq!(settings.tracked_metrics.len(), 1);
            assert_eq!(settings.dispatcher.timeout_secs, 5);
            assert_eq!(settings.max_tasks, 4);
        }
    }
}
