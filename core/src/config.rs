//! Configuration data shared by the orchestrator and the bus state.
//!
//! A [`ConfigurationPatch`] is a partial record: every field is optional, and
//! patches are layered with [`ConfigurationPatch::merge`]. The orchestrator's
//! own configuration is the first layer; `@apium/CONFIGURE` actions fold
//! further layers into the bus state at runtime.

use crate::request::{FetchOptions, Headers, Method, duration_ms};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the base URL.
pub const ENV_BASE_URL: &str = "APIUM_BASE_URL";
/// Environment variable holding the default retry count.
pub const ENV_RETRY_TIMES: &str = "APIUM_RETRY_TIMES";
/// Environment variable holding the default retry interval in milliseconds.
pub const ENV_RETRY_INTERVAL_MS: &str = "APIUM_RETRY_INTERVAL_MS";

/// Errors loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable held something other than a non-negative integer.
    #[error("Invalid value for {var}: expected a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// The variable name.
        var: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Partial request defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationPatch {
    /// Prefix for every request URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Method for requests that do not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_method: Option<Method>,

    /// Headers under every request's own headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_headers: Option<Headers>,

    /// Retries for requests that do not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_retry_times: Option<u32>,

    /// Retry delay for requests that do not set their own.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "duration_ms::option"
    )]
    pub base_retry_interval: Option<Duration>,

    /// Transport options for requests that do not set their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fetch_options: Option<FetchOptions>,
}

impl ConfigurationPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a patch from `APIUM_*` environment variables.
    ///
    /// Unset variables leave their field unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] if a numeric variable does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load a patch through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNumber`] if a numeric variable does not
    /// parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |var: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(var)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidNumber { var, value })
                })
                .transpose()
        };

        let base_retry_times = number(ENV_RETRY_TIMES)?
            .map(|times| {
                u32::try_from(times).map_err(|_| ConfigError::InvalidNumber {
                    var: ENV_RETRY_TIMES,
                    value: times.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            base_url: lookup(ENV_BASE_URL),
            base_retry_times,
            base_retry_interval: number(ENV_RETRY_INTERVAL_MS)?.map(Duration::from_millis),
            ..Self::default()
        })
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the base method.
    #[must_use]
    pub const fn with_base_method(mut self, method: Method) -> Self {
        self.base_method = Some(method);
        self
    }

    /// Set the base headers.
    #[must_use]
    pub fn with_base_headers(mut self, headers: impl Into<Headers>) -> Self {
        self.base_headers = Some(headers.into());
        self
    }

    /// Set the base retry count.
    #[must_use]
    pub const fn with_base_retry_times(mut self, retry_times: u32) -> Self {
        self.base_retry_times = Some(retry_times);
        self
    }

    /// Set the base retry interval.
    #[must_use]
    pub const fn with_base_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.base_retry_interval = Some(retry_interval);
        self
    }

    /// Set the base fetch options.
    #[must_use]
    pub fn with_base_fetch_options(mut self, fetch_options: FetchOptions) -> Self {
        self.base_fetch_options = Some(fetch_options);
        self
    }

    /// Layer `later` over `self`, field by field. Set fields in `later` win.
    #[must_use]
    pub fn merge(self, later: Self) -> Self {
        Self {
            base_url: later.base_url.or(self.base_url),
            base_method: later.base_method.or(self.base_method),
            base_headers: later.base_headers.or(self.base_headers),
            base_retry_times: later.base_retry_times.or(self.base_retry_times),
            base_retry_interval: later.base_retry_interval.or(self.base_retry_interval),
            base_fetch_options: later.base_fetch_options.or(self.base_fetch_options),
        }
    }
}
