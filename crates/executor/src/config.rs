use std::collections::HashMap;
use std::env;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::CapacityProbe;

/// Env var holding the concurrency limit.
pub const ENV_CONCURRENCY: &str = "ORDO_CONCURRENCY";
/// Env var holding the executor display name.
pub const ENV_NAME: &str = "ORDO_NAME";
/// Env var toggling lifecycle logging.
pub const ENV_LOGGING: &str = "ORDO_LOGGING";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Executor configuration, typically parsed from TOML/JSON or the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum concurrently running tasks. `None` = host parallelism.
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Display name. `None` = randomly generated.
    #[serde(default)]
    pub name: Option<String>,
    /// Emit Queue/Starting/Done lifecycle events.
    #[serde(default)]
    pub logging: bool,
}

impl From<usize> for ExecutorConfig {
    fn from(limit: usize) -> Self {
        Self {
            concurrency: Some(limit),
            ..Self::default()
        }
    }
}

impl ExecutorConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Build config from an explicit set of key/value pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let concurrency = match vars.get(ENV_CONCURRENCY) {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .map_err(|_| invalid(ENV_CONCURRENCY, raw))?,
            ),
            None => None,
        };

        let logging = match vars.get(ENV_LOGGING) {
            Some(raw) => parse_flag(raw).ok_or_else(|| invalid(ENV_LOGGING, raw))?,
            None => false,
        };

        Ok(Self {
            concurrency,
            name: vars.get(ENV_NAME).cloned(),
            logging,
        })
    }

    /// Resolve the concurrency limit, consulting `probe` only when none is set.
    pub fn resolve_concurrency(
        &self,
        probe: &dyn CapacityProbe,
    ) -> Result<NonZeroUsize, ConfigError> {
        match self.concurrency {
            Some(limit) => NonZeroUsize::new(limit).ok_or(ConfigError::InvalidConcurrency(limit)),
            None => NonZeroUsize::new(probe.available()).ok_or(ConfigError::NoCapacity),
        }
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
