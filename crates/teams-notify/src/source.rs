//! Ordered configuration lookup.
//!
//! A [`ConfigSourceChain`] walks, in fixed order, the host's structured
//! settings, process-level properties, environment variables and finally the
//! compiled-in defaults. The first trimmed, non-empty value wins. Sources never
//! surface errors to callers: a faulting source is logged at debug level and
//! treated as if it had no value.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::keys::{display_value, env_name, ConfigKey};

/// A single configuration source.
///
/// Implement this trait to plug additional lookups into a chain.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Returns the name of this source, used in logs.
    fn name(&self) -> &str;

    /// Looks up a dotted property name.
    ///
    /// # Errors
    ///
    /// Returns an error if the source itself is unavailable or unreadable.
    fn lookup(&self, property: &str) -> Result<Option<String>>;
}

/// A source backed by an in-memory map of dotted property names.
///
/// Used for both the host's structured settings and process properties.
#[derive(Debug, Clone)]
pub struct MapSource {
    name: String,
    values: Option<HashMap<String, String>>,
}

impl MapSource {
    /// Creates a source over the given values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            values: Some(values),
        }
    }

    /// Creates a source whose backing store could not be reached.
    ///
    /// Every lookup faults; the chain skips it.
    #[must_use]
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: None,
        }
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, property: &str) -> Result<Option<String>> {
        let values = self.values.as_ref().ok_or_else(|| {
            NotifyError::Unexpected(format!("{} is not accessible", self.name))
        })?;
        Ok(values.get(property).cloned())
    }
}

#[derive(Debug, Clone)]
enum EnvBackend {
    Process,
    Fixed(HashMap<String, String>),
}

/// Reads environment variables named after the property
/// (see [`env_name`]).
#[derive(Debug, Clone)]
pub struct EnvSource {
    backend: EnvBackend,
}

impl EnvSource {
    /// Reads the real process environment.
    #[must_use]
    pub const fn process() -> Self {
        Self {
            backend: EnvBackend::Process,
        }
    }

    /// Reads from a fixed map of variable names instead of the process
    /// environment.
    #[must_use]
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self {
            backend: EnvBackend::Fixed(vars),
        }
    }

    /// Looks up a variable by its exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable exists but is not valid unicode.
    pub fn var(&self, name: &str) -> Result<Option<String>> {
        match &self.backend {
            EnvBackend::Process => match std::env::var(name) {
                Ok(value) => Ok(Some(value)),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(std::env::VarError::NotUnicode(_)) => Err(NotifyError::ConfigInvalid {
                    key: name.to_string(),
                    reason: "environment value is not valid unicode".to_string(),
                }),
            },
            EnvBackend::Fixed(vars) => Ok(vars.get(name).cloned()),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::process()
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, property: &str) -> Result<Option<String>> {
        self.var(&env_name(property))
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A named source in the chain.
    Source(String),
    /// The key's compiled-in default.
    Default,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(name) => f.write_str(name),
            Self::Default => f.write_str("default"),
        }
    }
}

/// The fixed-order lookup chain.
///
/// The chain holds no mutable state; resolving the same key twice against the
/// same sources always yields the same answer.
#[derive(Debug)]
pub struct ConfigSourceChain {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigSourceChain {
    /// Creates a chain over structured settings, process properties and the
    /// given environment.
    #[must_use]
    pub fn new(
        structured: HashMap<String, String>,
        properties: HashMap<String, String>,
        env: EnvSource,
    ) -> Self {
        Self::builder()
            .source(MapSource::new("structured", structured))
            .source(MapSource::new("properties", properties))
            .env(env)
            .build()
    }

    /// Starts building a chain with custom sources.
    #[must_use]
    pub fn builder() -> ConfigSourceChainBuilder {
        ConfigSourceChainBuilder::default()
    }

    /// Resolves a key, falling back to its compiled-in default.
    ///
    /// Returns `None` only when no source has a value and the key has no
    /// default.
    #[must_use]
    pub fn resolve(&self, key: ConfigKey) -> Option<String> {
        self.resolve_with_origin(key).map(|(value, _)| value)
    }

    /// Resolves a key and reports which source supplied the value.
    #[must_use]
    pub fn resolve_with_origin(&self, key: ConfigKey) -> Option<(String, Origin)> {
        if let Some((value, origin)) = self.lookup_property(key.property()) {
            debug!(
                key = %key,
                source = %origin,
                value = %display_value(key, &value),
                "config loaded"
            );
            return Some((value, origin));
        }

        let default = key.default_value();
        if default.is_empty() {
            debug!(key = %key, "config not found and has no default");
            None
        } else {
            debug!(key = %key, default = %default, "config not found, using default");
            Some((default.to_string(), Origin::Default))
        }
    }

    /// Looks up an arbitrary dotted property through the configured sources,
    /// without any default.
    #[must_use]
    pub fn lookup_property(&self, property: &str) -> Option<(String, Origin)> {
        for source in &self.sources {
            match source.lookup(property) {
                Ok(Some(value)) => {
                    if let Some(value) = non_blank(&value) {
                        return Some((value, Origin::Source(source.name().to_string())));
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(
                        source = %source.name(),
                        property = %property,
                        error = %err,
                        "config source fault, treating as absent"
                    );
                }
            }
        }
        None
    }
}

impl Default for ConfigSourceChain {
    /// A chain over the process environment only.
    fn default() -> Self {
        Self::builder().env(EnvSource::process()).build()
    }
}

/// Builder for [`ConfigSourceChain`].
///
/// Sources are consulted in the order they are added, then the environment.
#[derive(Debug, Default)]
pub struct ConfigSourceChainBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    env: Option<EnvSource>,
}

impl ConfigSourceChainBuilder {
    /// Appends a source ahead of the environment.
    #[must_use]
    pub fn source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Sets the environment source.
    #[must_use]
    pub fn env(mut self, env: EnvSource) -> Self {
        self.env = Some(env);
        self
    }

    /// Builds the chain. Without an explicit environment an empty one is used.
    #[must_use]
    pub fn build(self) -> ConfigSourceChain {
        let env = self
            .env
            .unwrap_or_else(|| EnvSource::from_map(HashMap::new()));
        let mut sources = self.sources;
        sources.push(Box::new(env));
        ConfigSourceChain { sources }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
