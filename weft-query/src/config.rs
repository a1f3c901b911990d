//! Resolver configuration.
//!
//! A [`ResolverConfig`] can be built in code, parsed from the `[resolver]`
//! table of a `weft.toml` file, or overridden from the environment:
//!
//! ```toml
//! [resolver]
//! max_include_depth = 8
//! concurrent_siblings = true
//! single_match = "error"
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WEFT_MAX_INCLUDE_DEPTH` | `max_include_depth` |
//! | `WEFT_CONCURRENT_SIBLINGS` | `concurrent_siblings` |
//! | `WEFT_SINGLE_MATCH` | `single_match` (`first` / `error`) |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// What to do when a single-valued association matches several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleMatchPolicy {
    /// Keep the first row in storage order and log a warning.
    #[default]
    First,
    /// Fail the resolution with `AmbiguousMatch`.
    Error,
}

impl std::str::FromStr for SingleMatchPolicy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "error" => Ok(Self::Error),
            other => Err(QueryError::invalid_configuration(format!(
                "unknown single_match policy '{}', expected 'first' or 'error'",
                other
            ))),
        }
    }
}

/// Configuration for include resolution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Maximum depth of an include tree.
    #[serde(default = "default_max_include_depth")]
    pub max_include_depth: usize,

    /// Fetch sibling steps of one level concurrently.
    #[serde(default = "default_concurrent_siblings")]
    pub concurrent_siblings: bool,

    /// Policy for duplicate single-valued matches.
    #[serde(default)]
    pub single_match: SingleMatchPolicy,
}

fn default_max_include_depth() -> usize {
    16
}

fn default_concurrent_siblings() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_include_depth: default_max_include_depth(),
            concurrent_siblings: default_concurrent_siblings(),
            single_match: SingleMatchPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    resolver: ResolverConfig,
}

impl ResolverConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum include depth.
    pub fn max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Enable or disable concurrent sibling fetches.
    pub fn concurrent_siblings(mut self, enabled: bool) -> Self {
        self.concurrent_siblings = enabled;
        self
    }

    /// Set the duplicate match policy.
    pub fn single_match(mut self, policy: SingleMatchPolicy) -> Self {
        self.single_match = policy;
        self
    }

    /// Parse the `[resolver]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> QueryResult<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| QueryError::invalid_configuration(e.to_string()).with_source(e))?;
        file.resolver.validate()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            QueryError::invalid_configuration(format!("cannot read {}: {}", path.display(), e))
                .with_source(e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> QueryResult<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup (normally the process environment).
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> QueryResult<Self> {
        if let Some(depth) = lookup("WEFT_MAX_INCLUDE_DEPTH") {
            self.max_include_depth = depth.trim().parse().map_err(|_| {
                QueryError::invalid_configuration(format!(
                    "WEFT_MAX_INCLUDE_DEPTH must be a positive integer, got '{}'",
                    depth
                ))
            })?;
        }
        if let Some(flag) = lookup("WEFT_CONCURRENT_SIBLINGS") {
            self.concurrent_siblings = parse_flag(&flag).ok_or_else(|| {
                QueryError::invalid_configuration(format!(
                    "WEFT_CONCURRENT_SIBLINGS must be a boolean, got '{}'",
                    flag
                ))
            })?;
        }
        if let Some(policy) = lookup("WEFT_SINGLE_MATCH") {
            self.single_match = policy.parse()?;
        }
        self.validate()
    }

    fn validate(self) -> QueryResult<Self> {
        if self.max_include_depth == 0 {
            return Err(QueryError::invalid_configuration(
                "max_include_depth must be at least 1",
            ));
        }
        Ok(self)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
