use std::fmt::Display;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const TUNNEL_CONTAINER_PREFIX: &str = "tun2socks_proxy_";
const TUNNEL_NETWORK_PREFIX: &str = "proxy_network_";
const PORT_OFFSET_MODULO: u8 = 50;

/// First four bytes of the SHA-256 digest of a proxy id, rendered as 8 hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyHash([u8; 4]);

impl ProxyHash {
    pub fn of(proxy_id: &Uuid) -> Self {
        let digest = Sha256::digest(proxy_id.to_string().as_bytes());
        Self([digest[0], digest[1], digest[2], digest[3]])
    }

    pub fn port_offset(&self) -> u16 {
        u16::from(self.0[0] % PORT_OFFSET_MODULO)
    }
}

impl Display for ProxyHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

pub fn app_container_name(device_name: &str, app_id: &str, hash: Option<&ProxyHash>) -> String {
    format!("{}_{}_{}", device_name, app_id, scope(hash))
}

pub fn tunnel_container_name(hash: &ProxyHash) -> String {
    format!("{TUNNEL_CONTAINER_PREFIX}{hash}")
}

pub fn tunnel_network_name(hash: &ProxyHash) -> String {
    format!("{TUNNEL_NETWORK_PREFIX}{hash}")
}

/// Instance ids carry the scope so that a batch creating several instances
/// within one second still yields distinct ids.
pub fn instance_id(
    app_id: &str,
    device_name: &str,
    hash: Option<&ProxyHash>,
    created_at: &DateTime<Utc>,
) -> String {
    format!(
        "{}_{}_{}_{}",
        app_id,
        device_name,
        scope(hash),
        created_at.timestamp()
    )
}

/// Docker accepts `[a-zA-Z0-9][a-zA-Z0-9_.-]*` as container name, and the
/// device name is its leading component.
pub fn is_valid_device_name(device_name: &str) -> bool {
    let mut chars = device_name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        _ => false,
    }
}

fn scope(hash: Option<&ProxyHash>) -> String {
    match hash {
        Some(hash) => format!("proxy{hash}"),
        None => String::from("local"),
    }
}
