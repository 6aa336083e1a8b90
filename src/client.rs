//! HTTP client for a remote NamiChain service, used by the mining binaries.

use crate::blockchain::{Block, CompareTarget, KeyStatus, MiningTemplate};
use crate::codec::hash_from_hex;
use crate::error::ChainError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Machine-readable class of a failed request, sent by the server next to
/// `err_msg` so the client can rebuild the typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValueTooLong,
    InvalidBlock,
    KeyNotFound,
    BlockNotFound,
    InvalidInput,
    Internal,
}

/// Shape shared by every service response.
#[derive(Debug, Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    err_msg: Option<String>,
    #[serde(default)]
    err_kind: Option<ErrorKind>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    len: Option<usize>,
}

impl Envelope {
    fn into_error(self, status: StatusCode) -> ChainError {
        let msg = self
            .err_msg
            .unwrap_or_else(|| format!("HTTP {}", status));
        match self.err_kind {
            Some(ErrorKind::ValueTooLong) => ChainError::ValueTooLong {
                field: match self.field.as_deref() {
                    Some("key") => "key",
                    _ => "value",
                },
                len: self.len.unwrap_or_default(),
            },
            Some(ErrorKind::InvalidBlock) => ChainError::InvalidBlock(self.detail.unwrap_or(msg)),
            Some(ErrorKind::KeyNotFound) => ChainError::KeyNotFound(self.detail.unwrap_or(msg)),
            Some(ErrorKind::BlockNotFound) => {
                ChainError::BlockNotFound(self.detail.unwrap_or(msg))
            }
            Some(ErrorKind::InvalidInput) | Some(ErrorKind::Internal) | None => {
                ChainError::ApiError(msg)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, key: &str) -> Result<String, ChainError> {
        let resp = self
            .http
            .get(self.url("/get"))
            .query(&[("key", key)])
            .send()
            .await?;
        let body = expect_ok(resp).await?;
        body.value
            .ok_or_else(|| ChainError::ApiError("response is missing `value`".to_string()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), ChainError> {
        let resp = self
            .http
            .post(self.url("/set"))
            .form(&[("key", key), ("value", value)])
            .send()
            .await?;
        expect_ok(resp).await.map(|_| ())
    }

    pub async fn check(&self, key: &str) -> Result<KeyStatus, ChainError> {
        let resp = self
            .http
            .get(self.url("/check"))
            .query(&[("key", key)])
            .send()
            .await?;
        let status = resp.status();
        let body: Envelope = resp.json().await?;
        match body.result.as_str() {
            "included" => Ok(KeyStatus::Included),
            "queued" => Ok(KeyStatus::Queued),
            "404" => Ok(KeyStatus::NotFound),
            "error" => Err(body.into_error(status)),
            other => Err(ChainError::ApiError(format!("unexpected status `{}`", other))),
        }
    }

    pub async fn get_mining_template(&self) -> Result<MiningTemplate, ChainError> {
        let resp = self.http.get(self.url("/get_mining_template")).send().await?;
        let body = expect_ok(resp).await?;

        let template = body
            .template
            .ok_or_else(|| ChainError::ApiError("response is missing `template`".to_string()))?;
        let target = body
            .target
            .ok_or_else(|| ChainError::ApiError("response is missing `target`".to_string()))?;

        Ok(MiningTemplate {
            block: Block::from_hex(&template)?,
            target: CompareTarget::from_be_bytes(hash_from_hex(&target)?),
        })
    }

    pub async fn submit_block(&self, block: &Block) -> Result<(), ChainError> {
        let resp = self
            .http
            .post(self.url("/submit_block"))
            .form(&[("block", block.to_hex())])
            .send()
            .await?;
        expect_ok(resp).await.map(|_| ())
    }
}

async fn expect_ok(resp: reqwest::Response) -> Result<Envelope, ChainError> {
    let status = resp.status();
    let body: Envelope = resp.json().await?;
    if body.result == "ok" {
        return Ok(body);
    }
    Err(body.into_error(status))
}
