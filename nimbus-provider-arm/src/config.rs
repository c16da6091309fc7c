//! Provider configuration
//!
//! Settings come from the provider block of a configuration, from `ARM_*`
//! environment variables, or from defaults.

use std::collections::HashMap;
use std::time::Duration;

use nimbus_core::resource::Value;
use thiserror::Error;

use crate::utils::is_uuid;

/// Errors in provider configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was not provided
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// The subscription ID is not UUID-shaped
    #[error("Invalid subscription ID {0:?}: expected a UUID")]
    InvalidSubscription(String),

    /// A setting has an unusable value
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Configuration of the ARM provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Subscription every resource ID is rooted at
    pub subscription_id: String,
    /// Resource manager endpoint
    pub endpoint: String,
    /// Delay between long-running operation polls
    pub poll_interval: Duration,
    /// Polls before an operation is reported as timed out
    pub max_poll_attempts: u32,
}

impl ProviderConfig {
    pub const DEFAULT_ENDPOINT: &'static str = "https://management.azure.com";
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
    pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 360;

    pub const ENV_SUBSCRIPTION_ID: &'static str = "ARM_SUBSCRIPTION_ID";
    pub const ENV_ENDPOINT: &'static str = "ARM_ENDPOINT";
    pub const ENV_POLL_INTERVAL_SECS: &'static str = "ARM_POLL_INTERVAL_SECS";
    pub const ENV_MAX_POLL_ATTEMPTS: &'static str = "ARM_MAX_POLL_ATTEMPTS";

    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            poll_interval: Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: Self::DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_poll_attempts(mut self, max_poll_attempts: u32) -> Self {
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    /// Load configuration from `ARM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let subscription_id = lookup(Self::ENV_SUBSCRIPTION_ID)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(Self::ENV_SUBSCRIPTION_ID))?;
        let mut config = Self::new(subscription_id);

        if let Some(endpoint) = lookup(Self::ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(secs) = lookup(Self::ENV_POLL_INTERVAL_SECS) {
            let secs = secs.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                key: Self::ENV_POLL_INTERVAL_SECS,
                value: secs.clone(),
            })?;
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(attempts) = lookup(Self::ENV_MAX_POLL_ATTEMPTS) {
            config.max_poll_attempts =
                attempts.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                    key: Self::ENV_MAX_POLL_ATTEMPTS,
                    value: attempts.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the attributes of a provider block
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> Result<Self, ConfigError> {
        let subscription_id = match attributes.get("subscription_id") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(ConfigError::Missing("subscription_id")),
        };
        let mut config = Self::new(subscription_id);

        if let Some(Value::String(endpoint)) = attributes.get("endpoint") {
            config.endpoint = endpoint.clone();
        }
        match attributes.get("poll_interval_secs") {
            Some(Value::Int(secs)) if *secs >= 0 => {
                config.poll_interval = Duration::from_secs(*secs as u64);
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "poll_interval_secs",
                    value: format!("{:?}", other),
                });
            }
            None => {}
        }
        match attributes.get("max_poll_attempts") {
            Some(Value::Int(attempts)) if *attempts > 0 && *attempts <= u32::MAX as i64 => {
                config.max_poll_attempts = *attempts as u32;
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "max_poll_attempts",
                    value: format!("{:?}", other),
                });
            }
            None => {}
        }

        config.validate()?;
        Ok(config)
    }

    /// Request URL of a resource on the configured endpoint
    pub fn resource_url(&self, id: &str, api_version: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.endpoint.trim_end_matches('/'),
            id,
            api_version
        )
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_uuid(&self.subscription_id) {
            return Err(ConfigError::InvalidSubscription(
                self.subscription_id.clone(),
            ));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_poll_attempts",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::new(SUB);
        assert_eq!(config.endpoint, ProviderConfig::DEFAULT_ENDPOINT);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.max_poll_attempts, 360);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("ARM_SUBSCRIPTION_ID", SUB),
            ("ARM_ENDPOINT", "https://management.usgovcloudapi.net"),
            ("ARM_POLL_INTERVAL_SECS", "2"),
            ("ARM_MAX_POLL_ATTEMPTS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://management.usgovcloudapi.net");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_poll_attempts, 5);
    }

    #[test]
    fn test_from_lookup_errors() {
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("ARM_SUBSCRIPTION_ID")
        );
        assert_eq!(
            ProviderConfig::from_lookup(lookup(&[("ARM_SUBSCRIPTION_ID", "not-a-uuid")]))
                .unwrap_err(),
            ConfigError::InvalidSubscription("not-a-uuid".to_string())
        );
        assert!(matches!(
            ProviderConfig::from_lookup(lookup(&[
                ("ARM_SUBSCRIPTION_ID", SUB),
                ("ARM_POLL_INTERVAL_SECS", "soon"),
            ]))
            .unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_from_attributes() {
        let attributes: HashMap<String, Value> = [
            ("subscription_id".to_string(), Value::String(SUB.to_string())),
            ("poll_interval_secs".to_string(), Value::Int(1)),
            ("max_poll_attempts".to_string(), Value::Int(3)),
        ]
        .into_iter()
        .collect();
        let config = ProviderConfig::from_attributes(&attributes).unwrap();
        assert_eq!(config.subscription_id, SUB);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_attempts, 3);

        let attributes: HashMap<String, Value> = [
            ("subscription_id".to_string(), Value::String(SUB.to_string())),
            ("max_poll_attempts".to_string(), Value::Int(0)),
        ]
        .into_iter()
        .collect();
        assert!(ProviderConfig::from_attributes(&attributes).is_err());

        assert_eq!(
            ProviderConfig::from_attributes(&HashMap::new()).unwrap_err(),
            ConfigError::Missing("subscription_id")
        );
    }

    #[test]
    fn test_resource_url() {
        let id = "/subscriptions/s/resourceGroups/rg";
        assert_eq!(
            ProviderConfig::new(SUB).resource_url(id, "2022-09-01"),
            "https://management.azure.com/subscriptions/s/resourceGroups/rg?api-version=2022-09-01"
        );
        assert_eq!(
            ProviderConfig::new(SUB)
                .with_endpoint("https://management.chinacloudapi.cn/")
                .resource_url(id, "2022-09-01"),
            "https://management.chinacloudapi.cn/subscriptions/s/resourceGroups/rg?api-version=2022-09-01"
        );
    }
}
