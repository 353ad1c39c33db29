use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::json;
use tracing::warn;

use crate::config::TronNodeConfig;
use crate::error::AppError;

use super::types::{Block, Contract, TransactionInfo};

/// Thin synchronous-feeling RPC surface over a Tron full node's HTTP API.
/// Every call either succeeds, returns a clean "not found", or fails
/// with a retriable transport error; callers treat the latter as a warning
/// and skip rather than abort.
#[derive(Clone)]
pub struct TronClient {
    http: HttpClient,
    base_url: String,
    max_retries: u32,
    backoff_interval: Duration,
    abi_timeout: Duration,
}

impl TronClient {
    pub fn new(cfg: &TronNodeConfig) -> Self {
        let scheme = if cfg.use_tls { "https" } else { "http" };
        let base_url = format!("{scheme}://{}:{}", cfg.host, cfg.port);
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(cfg.connection.timeout_secs))
            .tcp_keepalive(Duration::from_secs(cfg.connection.keep_alive_secs))
            .build()
            .expect("http client config is valid");
        Self {
            http,
            base_url,
            max_retries: cfg.connection.max_retries,
            backoff_interval: Duration::from_millis(cfg.connection.backoff_interval_ms),
            abi_timeout: Duration::from_secs(5),
        }
    }

    async fn post_with_retry(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.http.post(&url).json(&body).send().await {
                Ok(resp) => {
                    return resp
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| AppError::Protocol(format!("malformed response from {path}: {e}")));
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(path, attempt, error = %e, "tron node request failed, retrying");
                    tokio::time::sleep(self.backoff_interval * attempt).await;
                }
                Err(e) => return Err(AppError::Transport(format!("{path}: {e}"))),
            }
        }
    }

    /// Returns the latest block header at the time of the call.
    pub async fn get_now_block(&self) -> Result<Block, AppError> {
        let value = self.post_with_retry("/wallet/getnowblock", json!({})).await?;
        serde_json::from_value(value).map_err(|e| AppError::Protocol(format!("getnowblock: {e}")))
    }

    /// Returns `None` if `num` has not been produced yet.
    pub async fn get_block_by_num(&self, num: i64) -> Result<Option<Block>, AppError> {
        let value = self
            .post_with_retry("/wallet/getblockbynum", json!({ "num": num }))
            .await?;
        if value.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AppError::Protocol(format!("getblockbynum({num}): {e}")))
    }

    /// Execution result, resource usage and withdrawn-reward amount for a
    /// confirmed transaction. Transient failures are non-fatal to callers —
    /// the event is still emitted, marked unsuccessful/unknown.
    pub async fn get_transaction_info(&self, tx_id: &str) -> Result<TransactionInfo, AppError> {
        let value = self
            .post_with_retry("/wallet/gettransactioninfobyid", json!({ "value": tx_id }))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Protocol(format!("gettransactioninfobyid({tx_id}): {e}")))
    }

    /// Fetches a contract's ABI for on-demand smart-contract decoding.
    /// Bounded by a 5s deadline independent of the client's general
    /// transport timeout; callers fall back to the built-in selector table
    /// on timeout.
    pub async fn get_contract(&self, address_hex: &str) -> Result<Contract, AppError> {
        let url = format!("{}/wallet/getcontract", self.base_url);
        let fut = self
            .http
            .post(&url)
            .json(&json!({ "value": address_hex }))
            .send();
        let resp = tokio::time::timeout(self.abi_timeout, fut)
            .await
            .map_err(|_| AppError::Transport(format!("getcontract({address_hex}): timed out")))?
            .map_err(|e| AppError::Transport(format!("getcontract({address_hex}): {e}")))?;
        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::Protocol(format!("getcontract({address_hex}): {e}")))?;
        serde_json::from_value(value)
            .map_err(|e| AppError::Protocol(format!("getcontract({address_hex}): {e}")))
    }
}
