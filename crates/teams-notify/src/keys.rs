//! The closed set of configuration keys and their compiled-in defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Avatar shown next to the team label when none is configured.
pub const DEFAULT_AVATAR_URL: &str =
    "https://raw.githubusercontent.com/SonarSource/sonarqube/master/server/sonar-web/public/images/logo.svg";

/// Team label shown on the card when none is configured.
pub const DEFAULT_TEAM_NAME: &str = "DevOps Team";

/// Base URL used for deep links when neither configuration nor environment
/// discovery provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9000";

/// Property that turns on the webhook URL probe during validation.
pub const TEST_WEBHOOK_PROPERTY: &str = "sonar.msteams.test.webhook";

/// The declared type of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// `"true"` / `"false"`, case-insensitive.
    Bool,
    /// Free text.
    String,
}

/// A recognized configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    /// Master switch for the notifier.
    Enabled,
    /// Incoming webhook URL; required when enabled.
    WebhookUrl,
    /// Avatar image shown in the card header.
    AvatarUrl,
    /// Only notify when the quality gate failed.
    SendOnFailedOnly,
    /// Server base URL used to build the dashboard link.
    BaseUrl,
    /// Display label shown next to the avatar.
    TeamName,
}

impl ConfigKey {
    /// Every key, in resolution order.
    pub const ALL: [Self; 6] = [
        Self::Enabled,
        Self::WebhookUrl,
        Self::AvatarUrl,
        Self::SendOnFailedOnly,
        Self::BaseUrl,
        Self::TeamName,
    ];

    /// Returns the dotted property name used by structured config and
    /// process properties.
    #[must_use]
    pub const fn property(&self) -> &'static str {
        match self {
            Self::Enabled => "sonar.msteams.enable",
            Self::WebhookUrl => "sonar.msteams.webhook.url",
            Self::AvatarUrl => "sonar.msteams.avatar.url",
            Self::SendOnFailedOnly => "sonar.msteams.send.on.failed",
            Self::BaseUrl => "sonar.core.serverBaseURL",
            Self::TeamName => "sonar.msteams.team.name",
        }
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::Enabled | Self::SendOnFailedOnly => KeyType::Bool,
            _ => KeyType::String,
        }
    }

    /// Returns the compiled-in default. An empty string means "no default".
    #[must_use]
    pub const fn default_value(&self) -> &'static str {
        match self {
            Self::Enabled => "false",
            Self::WebhookUrl | Self::BaseUrl => "",
            Self::AvatarUrl => DEFAULT_AVATAR_URL,
            Self::SendOnFailedOnly => "true",
            Self::TeamName => DEFAULT_TEAM_NAME,
        }
    }

    /// Returns true if values for this key must be masked in logs.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::WebhookUrl)
    }

    /// Returns the environment variable name for this key.
    #[must_use]
    pub fn env_name(&self) -> String {
        env_name(self.property())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

/// Maps a dotted property name to its environment variable name.
///
/// `sonar.msteams.webhook.url` becomes `SONAR_MSTEAMS_WEBHOOK_URL`.
#[must_use]
pub fn env_name(property: &str) -> String {
    property.replace('.', "_").to_uppercase()
}

/// Parses a boolean config value. Only `true` and `false` are accepted,
/// ignoring case and surrounding whitespace.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Masks a secret for logging: at most the first 20 and last 10 characters,
/// and never more than a third of the value at either end.
/// Anything shorter than 20 characters is fully hidden.
#[must_use]
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 20 {
        return "[MASKED]".to_string();
    }
    let third = chars.len() / 3;
    let head: String = chars[..third.min(20)].iter().collect();
    let tail: String = chars[chars.len() - third.min(10)..].iter().collect();
    format!("{head}...{tail}")
}

/// Formats a value for logging, masking it if the key is sensitive.
#[must_use]
pub fn display_value(key: ConfigKey, value: &str) -> String {
    if key.is_sensitive() {
        mask_secret(value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ConfigKey::Enabled, "SONAR_MSTEAMS_ENABLE" ; "enabled")]
    #[test_case(ConfigKey::WebhookUrl, "SONAR_MSTEAMS_WEBHOOK_URL" ; "webhook")]
    #[test_case(ConfigKey::SendOnFailedOnly, "SONAR_MSTEAMS_SEND_ON_FAILED" ; "failed only")]
    #[test_case(ConfigKey::BaseUrl, "SONAR_CORE_SERVERBASEURL" ; "mixed case base url")]
    fn env_names(key: ConfigKey, expected: &str) {
        assert_eq!(key.env_name(), expected);
    }

    #[test_case("true", Some(true))]
    #[test_case("TRUE", Some(true))]
    #[test_case(" False ", Some(false))]
    #[test_case("yes", None)]
    #[test_case("", None)]
    fn bool_parsing(input: &str, expected: Option<bool>) {
        assert_eq!(parse_bool(input), expected);
    }

    #[test]
    fn key_types() {
        assert_eq!(ConfigKey::Enabled.key_type(), KeyType::Bool);
        assert_eq!(ConfigKey::SendOnFailedOnly.key_type(), KeyType::Bool);
        assert_eq!(ConfigKey::TeamName.key_type(), KeyType::String);
    }

    #[test]
    fn bool_defaults_parse() {
        for key in ConfigKey::ALL {
            if key.key_type() == KeyType::Bool {
                assert!(parse_bool(key.default_value()).is_some(), "{key}");
            }
        }
    }

    #[test]
    fn mask_short_value() {
        assert_eq!(mask_secret("https://x"), "[MASKED]");
        assert_eq!(mask_secret(""), "[MASKED]");
    }

    #[test]
    fn mask_long_value() {
        let url = "https://outlook.office.com/webhook/abcdef/secret-token-1234567890";
        let masked = mask_secret(url);
        assert_eq!(masked, "https://outlook.offi...1234567890");
        assert!(!masked.contains("secret-token"));
    }

    #[test_case(20 ; "twenty")]
    #[test_case(25 ; "twenty five")]
    #[test_case(30 ; "thirty")]
    fn mask_never_reveals_whole_value(len: usize) {
        let value = &"abcdefghijklmnopqrstuvwxyz0123456789"[..len];
        let masked = mask_secret(value);
        let (head, tail) = masked.split_once("...").unwrap();
        assert!(value.starts_with(head));
        assert!(value.ends_with(tail));
        assert!(head.len() + tail.len() <= len * 2 / 3, "{masked}");
    }

    #[test]
    fn display_value_masks_only_sensitive_keys() {
        let url = "https://outlook.office.com/webhook/abcdef/secret-token";
        assert_ne!(display_value(ConfigKey::WebhookUrl, url), url);
        assert_eq!(display_value(ConfigKey::AvatarUrl, url), url);
    }
}
