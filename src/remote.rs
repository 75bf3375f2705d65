/*!
 * HTTP client for the shard remote protocol
 *
 * The remote exposes existence probes, uploads, and downloads for blocks
 * and manifests, addressed by identity:
 *
 * ```text
 * HEAD /blocks/{id}        200 | 404
 * PUT  /blocks/{id}        idempotent insert of compressed bytes
 * GET  /blocks/{id}        200 + bytes | 404
 * HEAD /manifests/{id}     200 | 404
 * PUT  /manifests/{id}     idempotent insert of serialized manifest
 * GET  /manifests/{id}     200 + bytes | 404
 * ```
 *
 * Transient failures (connect, timeout, 5xx) are retried with exponential
 * backoff and jitter; permanent failures (404 on GET, other 4xx) surface
 * immediately.
 */

use std::thread;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Result, ShardError};

/// Blocking client for one remote server
pub struct RemoteClient {
    base: String,
    http: Client,
    retry_attempts: u32,
    retry_delay_secs: u64,
    exponential_backoff: bool,
}

impl RemoteClient {
    /// Create a client for `base_url` (e.g. `http://host:8000`)
    pub fn new(base_url: &str, config: &SyncConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            http,
            retry_attempts: config.retry_attempts,
            retry_delay_secs: config.retry_delay_secs,
            exponential_backoff: config.exponential_backoff,
        })
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn block_url(&self, id: &str) -> String {
        format!("{}/blocks/{}", self.base, id)
    }

    fn manifest_url(&self, id: &str) -> String {
        format!("{}/manifests/{}", self.base, id)
    }

    /// Existence probe for a block
    pub fn has_block(&self, id: &str) -> Result<bool> {
        self.head(&self.block_url(id))
    }

    /// Idempotent upload of a compressed block
    pub fn put_block(&self, id: &str, compressed: &[u8]) -> Result<()> {
        self.put(&self.block_url(id), compressed)
    }

    /// Fetch a compressed block; `NotFound` if the remote lacks it
    pub fn get_block(&self, id: &str) -> Result<Vec<u8>> {
        self.get(&self.block_url(id), id)
    }

    /// Existence probe for a manifest
    pub fn has_manifest(&self, id: &str) -> Result<bool> {
        self.head(&self.manifest_url(id))
    }

    /// Idempotent upload of a serialized manifest
    pub fn put_manifest(&self, id: &str, serialized: &[u8]) -> Result<()> {
        self.put(&self.manifest_url(id), serialized)
    }

    /// Fetch a serialized manifest; `NotFound` if the remote lacks it
    pub fn get_manifest(&self, id: &str) -> Result<Vec<u8>> {
        self.get(&self.manifest_url(id), id)
    }

    fn head(&self, url: &str) -> Result<bool> {
        self.with_retry(|| {
            let response = self.http.head(url).send()?;
            match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(ShardError::RemoteStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                }),
            }
        })
    }

    fn put(&self, url: &str, body: &[u8]) -> Result<()> {
        self.with_retry(|| {
            let response = self.http.put(url).body(body.to_vec()).send()?;
            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(ShardError::RemoteStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                })
            }
        })
    }

    fn get(&self, url: &str, id: &str) -> Result<Vec<u8>> {
        self.with_retry(|| {
            let response = self.http.get(url).send()?;
            match response.status() {
                status if status.is_success() => Ok(response.bytes()?.to_vec()),
                StatusCode::NOT_FOUND => Err(ShardError::NotFound { id: id.to_string() }),
                status => Err(ShardError::RemoteStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                }),
            }
        })
    }

    /// Run an operation, retrying transient failures with backoff
    fn with_retry<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry_attempts => {
                    attempt += 1;
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max = self.retry_attempts,
                        error = %e,
                        "transient remote failure, retrying in {:?}",
                        delay
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    if attempt >= self.retry_attempts && e.is_transient() {
                        debug!(attempts = attempt, "retries exhausted");
                        return Err(ShardError::RetriesExhausted {
                            attempts: self.retry_attempts,
                        });
                    }
                    return Err(e);
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_delay_secs.saturating_mul(1000);
        let scaled = if self.exponential_backoff {
            base_ms.saturating_mul(1u64 << (attempt - 1).min(16))
        } else {
            base_ms
        };
        let jitter = rand::rng().random_range(0..=scaled / 4 + 1);
        Duration::from_millis(scaled + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RemoteClient {
        RemoteClient::new("http://localhost:9/", &SyncConfig::default()).unwrap()
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(client().base_url(), "http://localhost:9");
    }

    #[test]
    fn test_url_shapes() {
        let c = client();
        let id = "ab".repeat(32);
        assert_eq!(c.block_url(&id), format!("http://localhost:9/blocks/{}", id));
        assert_eq!(
            c.manifest_url(&id),
            format!("http://localhost:9/manifests/{}", id)
        );
    }

    #[test]
    fn test_backoff_growth() {
        let config = SyncConfig {
            retry_delay_secs: 1,
            exponential_backoff: true,
            ..Default::default()
        };
        let c = RemoteClient::new("http://localhost:9", &config).unwrap();
        assert!(c.backoff_delay(1) >= Duration::from_millis(1000));
        assert!(c.backoff_delay(3) >= Duration::from_millis(4000));
    }

    #[test]
    fn test_flat_backoff() {
        let config = SyncConfig {
            retry_delay_secs: 2,
            exponential_backoff: false,
            ..Default::default()
        };
        let c = RemoteClient::new("http://localhost:9", &config).unwrap();
        let delay = c.backoff_delay(3);
        assert!(delay >= Duration::from_millis(2000));
        assert!(delay < Duration::from_millis(3000));
    }
}
