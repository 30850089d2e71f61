use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use super::naming::ProxyHash;

#[derive(Debug, Error, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum ProxyError {
    #[error("Invalid proxy uri: '{uri}'. {reason}")]
    InvalidFormat { uri: String, reason: String },
    #[error("Proxy with id: '{0}' doesn't exist.")]
    NotFound(Uuid),
    #[error("Failed to connect through proxy: {0}")]
    ConnectFailed(String),
    #[error("Probe through proxy returned status: {0}")]
    BadStatus(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub username: String,
    pub password: Option<String>,
}

/// A parsed upstream proxy. Only its health changes after creation and health
/// lives in the registry, so the value itself is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    pub id: Uuid,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<ProxyCredentials>,
}

impl Proxy {
    /// Accepts `scheme://[user[:pass]@]host:port`. The scheme is kept as an opaque
    /// string; the port may only be omitted for schemes with a well known default.
    pub fn parse(uri: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidFormat {
            uri: uri.to_string(),
            reason: reason.to_string(),
        };
        let url = Url::parse(uri.trim()).map_err(|err| invalid(&err.to_string()))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid("Missing host."))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("Missing port."))?;
        let credentials = match url.username() {
            "" => None,
            username => Some(ProxyCredentials {
                username: username.to_string(),
                password: url.password().map(str::to_string),
            }),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            protocol: url.scheme().to_string(),
            host: host.to_string(),
            port,
            credentials,
        })
    }

    pub fn format(&self) -> String {
        self.render(false)
    }

    /// Same as [`Proxy::format`] with the password masked.
    pub fn display_uri(&self) -> String {
        self.render(true)
    }

    pub fn hash(&self) -> ProxyHash {
        ProxyHash::of(&self.id)
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .map(|credentials| credentials.username.as_str())
    }

    fn render(&self, mask_password: bool) -> String {
        let user_info = match &self.credentials {
            None => String::new(),
            Some(ProxyCredentials {
                username,
                password: None,
            }) => format!("{username}@"),
            Some(ProxyCredentials {
                username,
                password: Some(_),
            }) if mask_password => format!("{username}:***@"),
            Some(ProxyCredentials {
                username,
                password: Some(password),
            }) => format!("{username}:{password}@"),
        };
        format!("{}://{}{}:{}", self.protocol, user_info, self.host, self.port)
    }
}

impl Display for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.display_uri())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyHealth {
    pub status: HealthStatus,
    pub checked_at: Option<DateTime<Utc>>,
    pub latency: Option<Duration>,
    pub last_error: Option<String>,
}

impl Default for ProxyHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Unknown,
            checked_at: None,
            latency: None,
            last_error: None,
        }
    }
}

impl ProxyHealth {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            status: HealthStatus::Healthy,
            checked_at: Some(Utc::now()),
            latency: Some(latency),
            last_error: None,
        }
    }

    pub fn unhealthy(error: &ProxyError) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            checked_at: Some(Utc::now()),
            latency: None,
            last_error: Some(error.to_string()),
        }
    }
}

/// Proxy as shown to clients: the proxy, its last known health and how many
/// instances route through it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyOverview {
    pub proxy: Proxy,
    pub health: ProxyHealth,
    pub instances_count: usize,
}

/// Outbound connectivity check performed through a proxy.
#[async_trait]
pub trait ProxyProbe {
    /// Returns the round trip latency of the probe request.
    async fn test_connectivity(&self, proxy: &Proxy) -> Result<Duration, ProxyError>;
}
