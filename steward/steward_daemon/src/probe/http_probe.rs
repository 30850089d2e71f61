use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::redirect::Policy;

use crate::managers::proxy::{Proxy, ProxyError, ProxyProbe};

pub const DEFAULT_PROBE_URL: &str = "http://www.google.com";
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes a proxy with a single GET request sent through it. Redirects are not
/// followed, any status below 400 counts as reachable.
pub struct HttpProbe {
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(url: String, timeout: Duration) -> Self {
        Self {
            url,
            timeout: timeout.min(MAX_PROBE_TIMEOUT),
        }
    }

    fn client(&self, proxy: &Proxy) -> Result<reqwest::Client, ProxyError> {
        let connect_failed = |err: reqwest::Error| ProxyError::ConnectFailed(err.to_string());
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(proxy.format()).map_err(connect_failed)?)
            .redirect(Policy::none())
            .timeout(self.timeout)
            .build()
            .map_err(connect_failed)
    }
}

#[async_trait]
impl ProxyProbe for HttpProbe {
    async fn test_connectivity(&self, proxy: &Proxy) -> Result<Duration, ProxyError> {
        let client = self.client(proxy)?;
        let started = Instant::now();
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| ProxyError::ConnectFailed(err.to_string()))?;
        let latency = started.elapsed();
        let status = response.status();
        debug!("Probe through {proxy} answered {status} in {latency:?}");
        if status.as_u16() < 400 {
            Ok(latency)
        } else {
            Err(ProxyError::BadStatus(status.as_u16()))
        }
    }
}
