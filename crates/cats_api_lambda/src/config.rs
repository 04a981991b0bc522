use std::time::Duration;

use thiserror::Error;

pub const DDB_ENDPOINT_VAR: &str = "AWS_DDB_ENDPOINT";
pub const DDB_MAX_ATTEMPTS_VAR: &str = "DDB_MAX_ATTEMPTS";
pub const DDB_TIMEOUT_MS_VAR: &str = "DDB_TIMEOUT_MS";
pub const VERBOSE_VAR: &str = "VERBOSE";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Overrides the DynamoDB endpoint, e.g. for a local table.
    pub ddb_endpoint: Option<String>,
    pub max_attempts: u32,
    pub operation_timeout: Duration,
    /// Logs every received event when set.
    pub verbose: bool,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            ddb_endpoint: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            verbose: false,
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let max_attempts = match non_empty(DDB_MAX_ATTEMPTS_VAR) {
            Some(value) => parse_positive(DDB_MAX_ATTEMPTS_VAR, &value)?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        let operation_timeout = match non_empty(DDB_TIMEOUT_MS_VAR) {
            Some(value) => Duration::from_millis(u64::from(parse_positive(
                DDB_TIMEOUT_MS_VAR,
                &value,
            )?)),
            None => DEFAULT_OPERATION_TIMEOUT,
        };

        Ok(Self {
            ddb_endpoint: non_empty(DDB_ENDPOINT_VAR),
            max_attempts,
            operation_timeout,
            verbose: non_empty(VERBOSE_VAR).is_some(),
        })
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    let invalid = |reason: &str| ConfigError {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let parsed = value
        .trim()
        .parse::<u32>()
        .map_err(|error| invalid(&error.to_string()))?;
    if parsed == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(parsed)
}
