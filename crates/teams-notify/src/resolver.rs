//! Configuration resolution and validation.
//!
//! [`ResolvedConfig::resolve`] is the single resolution routine: the
//! validation phase runs it and then checks the result, while the delivery
//! phase runs it directly when no valid verdict is available. Both read the
//! same [`ConfigSourceChain`].

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ErrorKind, NotifyError, Result};
use crate::keys::{
    mask_secret, parse_bool, ConfigKey, DEFAULT_BASE_URL, TEST_WEBHOOK_PROPERTY,
};
use crate::source::{ConfigSourceChain, Origin};

/// Failure reason recorded when the webhook URL is absent.
pub const REASON_WEBHOOK_MISSING: &str = "webhook url missing";

/// Failure reason recorded when the webhook URL fails the scheme policy.
pub const REASON_WEBHOOK_INVALID: &str = "invalid webhook url";

const HTTPS_PREFIX: &str = "https://";

const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Typed configuration produced by one walk of the source chain.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Master switch.
    pub enabled: bool,
    /// Webhook URL; empty when not configured.
    pub webhook_url: String,
    /// Avatar image URL.
    pub avatar_url: String,
    /// Only notify on a failed quality gate.
    pub send_on_failed_only: bool,
    /// Base URL for dashboard links, after the fallback chain.
    pub base_url: String,
    /// Team label for the card header.
    pub team_name: String,
}

impl ResolvedConfig {
    /// Walks the chain for every key.
    ///
    /// Never fails: unparseable booleans fall back to the key default and a
    /// missing base URL goes through environment discovery and then
    /// [`DEFAULT_BASE_URL`].
    #[must_use]
    pub fn resolve(chain: &ConfigSourceChain) -> Self {
        Self {
            enabled: resolve_bool(chain, ConfigKey::Enabled),
            webhook_url: resolve_string(chain, ConfigKey::WebhookUrl),
            avatar_url: resolve_string(chain, ConfigKey::AvatarUrl),
            send_on_failed_only: resolve_bool(chain, ConfigKey::SendOnFailedOnly),
            base_url: resolve_base_url(chain),
            team_name: resolve_string(chain, ConfigKey::TeamName),
        }
    }

    /// Configuration with every key at its compiled-in default and the
    /// notifier switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            avatar_url: ConfigKey::AvatarUrl.default_value().to_string(),
            send_on_failed_only: default_bool(ConfigKey::SendOnFailedOnly),
            base_url: DEFAULT_BASE_URL.to_string(),
            team_name: ConfigKey::TeamName.default_value().to_string(),
        }
    }

    /// Returns the configuration as a key/value map.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<ConfigKey, String> {
        BTreeMap::from([
            (ConfigKey::Enabled, self.enabled.to_string()),
            (ConfigKey::WebhookUrl, self.webhook_url.clone()),
            (ConfigKey::AvatarUrl, self.avatar_url.clone()),
            (ConfigKey::SendOnFailedOnly, self.send_on_failed_only.to_string()),
            (ConfigKey::BaseUrl, self.base_url.clone()),
            (ConfigKey::TeamName, self.team_name.clone()),
        ])
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("enabled", &self.enabled)
            .field("webhook_url", &mask_secret(&self.webhook_url))
            .field("avatar_url", &self.avatar_url)
            .field("send_on_failed_only", &self.send_on_failed_only)
            .field("base_url", &self.base_url)
            .field("team_name", &self.team_name)
            .finish()
    }
}

/// Outcome of one validation pass.
#[derive(Debug, Clone)]
pub struct ValidationVerdict {
    /// Keys resolved during this pass. Only `enabled` when disabled.
    pub resolved: BTreeMap<ConfigKey, String>,
    /// Typed view of the resolved configuration.
    pub config: ResolvedConfig,
    /// Whether the configuration may be used for delivery.
    pub valid: bool,
    /// Why validation failed.
    pub failure_reason: Option<String>,
    /// Classification of the failure.
    pub error_kind: Option<ErrorKind>,
    /// When this verdict was produced.
    pub validated_at: DateTime<Utc>,
}

impl ValidationVerdict {
    fn disabled() -> Self {
        Self {
            resolved: BTreeMap::from([(ConfigKey::Enabled, "false".to_string())]),
            config: ResolvedConfig::disabled(),
            valid: true,
            failure_reason: None,
            error_kind: None,
            validated_at: Utc::now(),
        }
    }

    fn success(config: ResolvedConfig) -> Self {
        Self {
            resolved: config.to_map(),
            config,
            valid: true,
            failure_reason: None,
            error_kind: None,
            validated_at: Utc::now(),
        }
    }

    fn failure(config: ResolvedConfig, err: &NotifyError) -> Self {
        let reason = match err {
            NotifyError::ConfigMissing { .. } => REASON_WEBHOOK_MISSING.to_string(),
            NotifyError::ConfigInvalid { .. } => REASON_WEBHOOK_INVALID.to_string(),
            other => other.to_string(),
        };
        Self {
            resolved: config.to_map(),
            config,
            valid: false,
            failure_reason: Some(reason),
            error_kind: Some(err.kind()),
            validated_at: Utc::now(),
        }
    }

    fn fault(message: String) -> Self {
        let err = NotifyError::Unexpected(message);
        Self {
            resolved: BTreeMap::new(),
            config: ResolvedConfig::disabled(),
            valid: false,
            failure_reason: Some(err.to_string()),
            error_kind: Some(err.kind()),
            validated_at: Utc::now(),
        }
    }

    /// Returns the resolved value of a key, if this pass resolved it.
    #[must_use]
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.resolved.get(&key).map(String::as_str)
    }
}

/// Runs one validation pass over the chain.
///
/// Never panics or returns an error: every fault becomes `valid = false`.
#[must_use]
pub fn validate(chain: &ConfigSourceChain) -> ValidationVerdict {
    match panic::catch_unwind(AssertUnwindSafe(|| validate_inner(chain))) {
        Ok(verdict) => verdict,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "configuration validation faulted");
            ValidationVerdict::fault(message)
        }
    }
}

fn validate_inner(chain: &ConfigSourceChain) -> ValidationVerdict {
    let enabled = resolve_bool(chain, ConfigKey::Enabled);
    info!(enabled, "validating notifier configuration");
    if !enabled {
        info!(
            key = %ConfigKey::Enabled,
            "notifier disabled, skipping further validation"
        );
        return ValidationVerdict::disabled();
    }

    let config = ResolvedConfig::resolve(chain);

    if let Err(err) = check_webhook_url(&config.webhook_url) {
        match &err {
            NotifyError::ConfigMissing { key } => {
                warn!(key = %key, "webhook url is required but not configured");
            }
            _ => {
                warn!(
                    url = %mask_secret(&config.webhook_url),
                    error = %err,
                    "webhook url rejected"
                );
            }
        }
        return ValidationVerdict::failure(config, &err);
    }

    if probe_requested(chain) {
        probe_webhook(&config.webhook_url);
    }

    info!(
        webhook = %mask_secret(&config.webhook_url),
        avatar = %config.avatar_url,
        send_on_failed_only = config.send_on_failed_only,
        base_url = %config.base_url,
        team = %config.team_name,
        "configuration validated"
    );
    ValidationVerdict::success(config)
}

/// Checks a webhook URL against the accepted scheme policy.
///
/// Only `https://` URLs and plain-HTTP loopback URLs are accepted. A plain-HTTP
/// URL must start with `http://localhost` or `http://127.0.0.1` and its parsed
/// host must be exactly that loopback name, with no credentials.
///
/// # Errors
///
/// Returns `NotifyError::ConfigMissing` for an empty value and
/// `NotifyError::ConfigInvalid` for any other scheme or host.
pub fn check_webhook_url(url: &str) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(NotifyError::ConfigMissing {
            key: ConfigKey::WebhookUrl.property().to_string(),
        });
    }
    if url.starts_with(HTTPS_PREFIX) || is_loopback_http(url) {
        Ok(())
    } else {
        Err(NotifyError::ConfigInvalid {
            key: ConfigKey::WebhookUrl.property().to_string(),
            reason: "must use https:// or a loopback http:// address".to_string(),
        })
    }
}

fn is_loopback_http(url: &str) -> bool {
    if !LOOPBACK_HOSTS
        .iter()
        .any(|host| url.starts_with(&format!("http://{host}")))
    {
        return false;
    }
    Url::parse(url).is_ok_and(|parsed| {
        parsed.username().is_empty()
            && parsed.password().is_none()
            && parsed
                .host_str()
                .is_some_and(|host| LOOPBACK_HOSTS.contains(&host))
    })
}

fn probe_requested(chain: &ConfigSourceChain) -> bool {
    chain
        .lookup_property(TEST_WEBHOOK_PROPERTY)
        .and_then(|(value, _)| parse_bool(&value))
        .unwrap_or(false)
}

/// Parses the webhook URL and logs where it points. Never affects the verdict.
fn probe_webhook(webhook_url: &str) {
    match Url::parse(webhook_url) {
        Ok(url) => info!(
            host = url.host_str().unwrap_or_default(),
            port = url.port_or_known_default().unwrap_or_default(),
            "webhook url probe passed"
        ),
        Err(err) => warn!(
            url = %mask_secret(webhook_url),
            error = %err,
            "webhook url probe failed"
        ),
    }
}

fn resolve_string(chain: &ConfigSourceChain, key: ConfigKey) -> String {
    chain.resolve(key).unwrap_or_default()
}

fn resolve_bool(chain: &ConfigSourceChain, key: ConfigKey) -> bool {
    let Some(raw) = chain.resolve(key) else {
        return default_bool(key);
    };
    parse_bool(&raw).unwrap_or_else(|| {
        let fallback = default_bool(key);
        warn!(key = %key, value = %raw, default = fallback, "not a boolean, using default");
        fallback
    })
}

fn default_bool(key: ConfigKey) -> bool {
    parse_bool(key.default_value()).unwrap_or(false)
}

fn resolve_base_url(chain: &ConfigSourceChain) -> String {
    match chain.resolve_with_origin(ConfigKey::BaseUrl) {
        Some((url, origin)) => {
            if origin == Origin::Source("environment".to_string()) {
                info!(base_url = %url, "using base url from environment");
            }
            url
        }
        None => {
            warn!(
                key = %ConfigKey::BaseUrl,
                base_url = DEFAULT_BASE_URL,
                "base url not configured, using default"
            );
            DEFAULT_BASE_URL.to_string()
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        debug!("panic payload is not a string");
        "panic".to_string()
    }
}
