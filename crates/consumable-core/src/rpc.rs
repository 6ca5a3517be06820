//! JSON-RPC access to the selected endpoint
//!
//! [`ChainTransport`] is the seam between protocol logic (redemption,
//! funding) and the network. [`HttpProvider`] is the production
//! implementation speaking `eth_*` JSON-RPC over HTTP; tests substitute
//! scripted transports.

use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::tx::{FeeEstimate, SignedTx};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Fee estimation failed: {0}")]
    FeeEstimation(String),

    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Malformed RPC response: {0}")]
    InvalidResponse(String),

    #[error("Transaction {0} not included within {1:?}")]
    ConfirmationTimeout(B256, Duration),
}

/// Outcome of a confirmed transaction.
#[derive(Clone, Debug)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// Receipt status field: `true` for success, `false` for a revert.
    pub success: bool,
    /// Failure detail if the node supplies one.
    pub reason: Option<String>,
}

/// The network operations the protocol needs, and nothing more.
///
/// Every call blocks from the caller's perspective; at most one request is
/// in flight per logical operation.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Confirmed transaction count (= next nonce) for `address`.
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError>;

    /// Current fee quote, already including the doubling headroom.
    async fn estimate_fees(&self) -> Result<FeeEstimate, RpcError>;

    /// Broadcast a signed transaction; returns the hash the node accepted.
    async fn send_transaction(&self, tx: &SignedTx) -> Result<B256, RpcError>;

    /// Block until the transaction is included and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, RpcError>;
}

/// Bound on how long [`ChainTransport::wait_for_receipt`] polls before
/// giving up. The wire protocol places no bound; an unbounded wait is
/// useless operationally.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// HTTP JSON-RPC provider.
#[derive(Debug)]
pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            poll_interval: POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if let Some(error) = body.get("error") {
            return Err(RpcError::Transport(format!("{method}: {error}")));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: no result")))
    }
}

#[async_trait]
impl ChainTransport for HttpProvider {
    async fn transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([format!("{address:?}"), "latest"]),
            )
            .await?;
        parse_u64(&result)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, RpcError> {
        let as_fee_error = |e: RpcError| RpcError::FeeEstimation(e.to_string());

        let block = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await
            .map_err(as_fee_error)?;
        let base_fee = block
            .get("baseFeePerGas")
            .ok_or_else(|| {
                RpcError::FeeEstimation("latest block reports no baseFeePerGas".into())
            })
            .and_then(parse_quantity)
            .map_err(as_fee_error)?;

        let hint = self
            .call("eth_maxPriorityFeePerGas", json!([]))
            .await
            .and_then(|v| parse_quantity(&v))
            .map_err(as_fee_error)?;

        Ok(FeeEstimate::with_headroom(base_fee, hint))
    }

    async fn send_transaction(&self, tx: &SignedTx) -> Result<B256, RpcError> {
        let raw = format!("0x{}", hex::encode(&tx.raw));
        let result = self
            .call("eth_sendRawTransaction", json!([raw]))
            .await
            .map_err(|e| RpcError::Submission(e.to_string()))?;

        let hash = result
            .as_str()
            .and_then(|s| s.parse::<B256>().ok())
            .ok_or_else(|| RpcError::InvalidResponse(format!("bad tx hash: {result}")))?;
        tracing::debug!(tx_hash = %hash, "transaction broadcast");
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, RpcError> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;
        loop {
            let result = self
                .call("eth_getTransactionReceipt", json!([format!("{tx_hash:?}")]))
                .await?;

            if !result.is_null() {
                let success = match result.get("status") {
                    Some(status) => parse_quantity(status)? == 1,
                    None => true,
                };
                let block_number = result
                    .get("blockNumber")
                    .map(parse_u64)
                    .transpose()?
                    .unwrap_or(0);
                return Ok(TxReceipt {
                    tx_hash,
                    block_number,
                    success,
                    reason: None,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(RpcError::ConfirmationTimeout(
                    tx_hash,
                    self.confirmation_timeout,
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Parse a JSON-RPC hex quantity ("0x1a4" style).
fn parse_quantity(value: &Value) -> Result<u128, RpcError> {
    let text = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex quantity, got {value}")))?;
    u128::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::InvalidResponse(format!("bad quantity {text}: {e}")))
}

/// As [`parse_quantity`], for fields that must fit a `u64` (nonces, block
/// numbers). Out-of-range values are a malformed response, not a wrap.
fn parse_u64(value: &Value) -> Result<u64, RpcError> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity)
        .map_err(|_| RpcError::InvalidResponse(format!("quantity {quantity} exceeds u64")))
}
