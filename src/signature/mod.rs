//! Content identity for images and requests.
//!
//! [`PerceptualSigner`] derives a [`ContentSignature`] for an image: fetch
//! (or decode inline data), resize to a small canonical square, reduce to
//! one intensity channel, and hash the flattened pixels. Two encodings of
//! the same picture (different URL, re-compressed JPEG, PNG vs. WebP)
//! usually land on the same signature. This is a cheap similarity proxy,
//! not an adversarially robust perceptual hash.
//!
//! # Fallback
//!
//! Any failure along the pipeline (timeout, HTTP error, oversized body,
//! undecodable bytes) falls back to hashing the raw reference string. The
//! result is still deterministic, just coarser: identical references still
//! share cache entries, re-encodings no longer do. Failures are logged and
//! counted, never returned.
//!
//! The [`keys`] submodule turns requests plus signatures into cache keys.

pub mod keys;

use std::time::Duration;

use base64::Engine;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::{ImageRef, ImageSource};
use crate::{HuginnError, Result};

pub use keys::{request_fingerprint, semantic_key};

/// How a signature was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// Digest over normalised pixel data.
    Pixels,
    /// Digest over the raw reference string (pipeline failed).
    Reference,
}

/// Stable content identity of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSignature {
    /// Truncated lowercase hex digest.
    pub digest: String,
    pub kind: SignatureKind,
}

/// Settings for the signature pipeline.
///
/// ```rust
/// # use huginn::signature::SignatureConfig;
/// let config = SignatureConfig::new().resize_dim(16).fetch_timeout_ms(2_000);
/// assert_eq!(config.resize_dim, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Side of the canonical square, in pixels. Default: 32.
    pub resize_dim: u32,
    /// Ceiling on a remote fetch, in milliseconds. Default: 5,000.
    pub fetch_timeout_ms: u64,
    /// Hex characters kept from the SHA-256 digest. Default: 16.
    pub digest_len: usize,
    /// Largest remote body accepted, in bytes. Default: 20 MiB.
    pub max_fetch_bytes: usize,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            resize_dim: 32,
            fetch_timeout_ms: 5_000,
            digest_len: 16,
            max_fetch_bytes: 20 * 1024 * 1024,
        }
    }
}

impl SignatureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resize_dim(mut self, px: u32) -> Self {
        self.resize_dim = px;
        self
    }

    pub fn fetch_timeout_ms(mut self, ms: u64) -> Self {
        self.fetch_timeout_ms = ms;
        self
    }

    pub fn digest_len(mut self, len: usize) -> Self {
        self.digest_len = len;
        self
    }

    pub fn max_fetch_bytes(mut self, bytes: usize) -> Self {
        self.max_fetch_bytes = bytes;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Computes content signatures.
pub struct PerceptualSigner {
    http: reqwest::Client,
    config: SignatureConfig,
}

impl PerceptualSigner {
    pub fn new(config: SignatureConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Share an existing HTTP client (connection pool) with the signer.
    pub fn with_http_client(config: SignatureConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Signature for `image`, computed at most once per [`ImageRef`].
    ///
    /// Never fails: see the module docs for the fallback.
    pub async fn content_signature(&self, image: &ImageRef) -> ContentSignature {
        image
            .signature_cell()
            .get_or_init(|| self.compute(image))
            .await
            .clone()
    }

    async fn compute(&self, image: &ImageRef) -> ContentSignature {
        match self.pixel_signature(image).await {
            Ok(digest) => {
                debug!(inline = image.is_inline(), digest, "computed pixel signature");
                ContentSignature {
                    digest,
                    kind: SignatureKind::Pixels,
                }
            }
            Err(e) => {
                warn!(
                    inline = image.is_inline(),
                    error = %e,
                    "signature pipeline failed, hashing reference string"
                );
                metrics::counter!(telemetry::SIGNATURE_FALLBACKS_TOTAL).increment(1);
                ContentSignature {
                    digest: self.reference_digest(image.reference()),
                    kind: SignatureKind::Reference,
                }
            }
        }
    }

    async fn pixel_signature(&self, image: &ImageRef) -> Result<String> {
        let bytes = match image.source() {
            ImageSource::Url(url) => self.fetch(url).await?,
            ImageSource::Inline(data) => decode_inline(data)?,
        };
        self.digest_pixels(&bytes)
    }

    /// Decode, normalise and hash encoded image bytes.
    pub fn digest_pixels(&self, bytes: &[u8]) -> Result<String> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| HuginnError::Signature(format!("decode failed: {e}")))?;
        let dim = self.config.resize_dim.max(1);
        let gray = img.resize_exact(dim, dim, FilterType::Triangle).to_luma8();

        let mut hasher = Sha256::new();
        hasher.update(dim.to_le_bytes());
        hasher.update(gray.as_raw());
        Ok(self.truncate(hex::encode(hasher.finalize())))
    }

    /// Deterministic digest of a raw reference string.
    pub fn reference_digest(&self, reference: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"ref:");
        hasher.update(reference.as_bytes());
        self.truncate(hex::encode(hasher.finalize()))
    }

    fn truncate(&self, mut digest: String) -> String {
        digest.truncate(self.config.digest_len.clamp(8, 64));
        digest
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let max = self.config.max_fetch_bytes;
        let request = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| HuginnError::Signature(format!("fetch failed: {e}")))?;
            if let Some(len) = response.content_length()
                && len > max as u64
            {
                return Err(HuginnError::Signature(format!(
                    "image too large: {len} bytes (max {max})"
                )));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| HuginnError::Signature(format!("read failed: {e}")))?;
            if body.len() > max {
                return Err(HuginnError::Signature(format!(
                    "image too large: {} bytes (max {max})",
                    body.len()
                )));
            }
            Ok(body.to_vec())
        };

        let after = self.config.fetch_timeout();
        tokio::time::timeout(after, request)
            .await
            .map_err(|_| HuginnError::Signature(format!("fetch timed out after {after:?}")))?
    }
}

/// Decode a `data:` URL or bare base64 payload.
fn decode_inline(data: &str) -> Result<Vec<u8>> {
    let payload = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| HuginnError::Signature("malformed data URL".into()))?;
            if !header.ends_with(";base64") {
                return Err(HuginnError::Signature(format!(
                    "unsupported data URL encoding: {header}"
                )));
            }
            payload
        }
        None => data,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| HuginnError::Signature(format!("invalid base64: {e}")))
}
