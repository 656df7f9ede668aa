//! HTTP/JSON report transport: gzip framing, optional RSA encryption,
//! optional HMAC body tag, linear retry.

use std::io::Write;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use rsa::RsaPublicKey;
use tracing::warn;

use pulse_core::{crypto, Metric, PulseError, Result};

use super::Transport;

const RETRY_COUNT: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Pushes report batches to `POST http://<address>/updates/`.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    key: Option<String>,
    public_key: Option<RsaPublicKey>,
}

impl HttpTransport {
    /// Build the client with a 5 s request timeout and a fixed `X-Real-IP`
    /// header carrying the first non-loopback address of this host.
    pub fn new(address: &str, key: Option<String>, public_key: Option<RsaPublicKey>) -> Result<Self> {
        let ip = resolve_host_ip()?;

        let mut headers = HeaderMap::new();
        let ip_value = HeaderValue::from_str(&ip.to_string())
            .map_err(|e| PulseError::InvalidConfig { reason: format!("bad host ip: {e}") })?;
        headers.insert("X-Real-IP", ip_value);

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(PulseError::transport)?;

        Ok(Self {
            client,
            url: format!("http://{address}/updates/"),
            key,
            public_key,
        })
    }

    fn encode_body(&self, batch: &[Metric]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        serde_json::to_writer(&mut encoder, batch)
            .map_err(|e| PulseError::transport(format!("failed to encode batch: {e}")))?;
        let compressed = encoder.finish()?;

        match &self.public_key {
            Some(key) => crypto::encrypt_blocks(key, &compressed),
            None => Ok(compressed),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &[Metric]) -> Result<()> {
        let body = self.encode_body(batch)?;
        let hash = self.key.as_deref().map(|key| crypto::body_hash(key, &body));

        let mut last_err = String::new();

        for attempt in 1..=RETRY_COUNT {
            let mut req = self
                .client
                .post(&self.url)
                .header(CONTENT_ENCODING, "gzip")
                .body(body.clone());

            if self.public_key.is_some() {
                req = req.header(CONTENT_TYPE, "application/json");
            }

            if let Some(hash) = &hash {
                req = req.header("Hash", hash);
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    last_err = format!("received status code {} for {}", resp.status(), self.url);
                }
                Err(e) => {
                    last_err = format!("failed to send request for {}: {e}", self.url);
                }
            }

            if attempt < RETRY_COUNT {
                warn!(attempt, error = %last_err, "report attempt failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(PulseError::Transport { reason: last_err })
    }
}

/// First non-loopback IPv4 address of this host, for the `X-Real-IP` header.
fn resolve_host_ip() -> Result<IpAddr> {
    match local_ip_address::local_ip() {
        Ok(ip @ IpAddr::V4(v4)) if !v4.is_loopback() => Ok(ip),
        Ok(other) => Err(PulseError::InvalidConfig {
            reason: format!("no non-loopback IPv4 address found (got {other})"),
        }),
        Err(e) => Err(PulseError::InvalidConfig { reason: format!("address not found: {e}") }),
    }
}
