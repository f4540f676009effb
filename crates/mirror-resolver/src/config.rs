use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy::Relay;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(String),
    #[error("invalid outbound proxy url: {0}")]
    InvalidProxyUrl(String),
}

/// Runtime settings for a [`Resolver`](crate::Resolver).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Per-request timeout in seconds, applied to every hop a handler makes
    pub request_timeout: u64,

    /// TCP connect timeout in seconds
    pub connect_timeout: u64,

    /// Maximum number of handler calls in flight for a single request
    pub max_concurrent: usize,

    /// Idle connections kept per host in the per-request pool
    pub pool_max_idle_per_host: usize,

    /// User agent sent by handlers that do not pin their own
    pub user_agent: Option<String>,

    /// Treat every request as privileged
    pub force_privileged: bool,

    /// Relay used to tunnel privileged fetches
    pub relay: Option<Relay>,

    pub providers: ProvidersConfig,

    /// Proxy applied to all outbound requests
    pub outbound_proxy: Option<ProxyConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            request_timeout: 10,
            connect_timeout: 5,
            max_concurrent: 16,
            pool_max_idle_per_host: 4,
            user_agent: None,
            force_privileged: false,
            relay: None,
            providers: ProvidersConfig::default(),
            outbound_proxy: None,
        }
    }
}

impl ResolverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout == 0 {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }
        if self.connect_timeout == 0 {
            return Err(ConfigError::Zero {
                field: "connect_timeout",
            });
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent",
            });
        }
        if let Some(relay) = &self.relay {
            url::Url::parse(&relay.url)
                .map_err(|e| ConfigError::InvalidRelayUrl(format!("{}: {e}", relay.url)))?;
        }
        if let Some(proxy) = &self.outbound_proxy {
            url::Url::parse(&proxy.url)
                .map_err(|e| ConfigError::InvalidProxyUrl(format!("{}: {e}", proxy.url)))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Provider names that are registered but never dispatched to
    pub disabled: Vec<String>,
}

impl ProvidersConfig {
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_concurrent, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ResolverConfig = serde_json::from_str(
            r#"{"max_concurrent": 4, "providers": {"disabled": ["VOE"]}}"#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.request_timeout, 10);
        assert!(config.providers.is_disabled("voe"));
        assert!(!config.providers.is_disabled("cda"));
    }

    #[test]
    fn test_validate_rejects_zero_and_bad_urls() {
        let config = ResolverConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "max_concurrent"
            })
        );

        let config = ResolverConfig {
            relay: Some(Relay::new("not a url", "pw")),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRelayUrl(_))
        ));
    }
}
