//! Batched funding of ephemeral wallets
//!
//! One funder account, strictly sequential transfers, one locally tracked
//! nonce. The nonce is fetched once at the start of the batch and advanced
//! only after a confirmed transaction. It is never re-queried mid-batch,
//! since a re-query could race with a not-yet-confirmed send and produce
//! reuse or gaps. A failed transfer retries the *same* nonce; exhausting
//! the retry bound aborts the whole remaining batch, because skipping a
//! recipient would leave a nonce gap that stalls everything after it.

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

use crate::retry::{with_retries, RetryExhausted};
use crate::rpc::{ChainTransport, RpcError};
use crate::tx::Eip1559Tx;
use crate::wallet::Wallet;

#[derive(Debug, Error)]
pub enum FundError {
    #[error("Invalid funder key")]
    InvalidFunderKey,

    #[error("Funding {recipient} gave up after {attempts} attempts, aborting batch: {last_error}")]
    RetryExhausted {
        recipient: Address,
        attempts: u32,
        #[source]
        last_error: RpcError,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Retry policy and amount for one funding batch.
#[derive(Clone, Copy, Debug)]
pub struct FundingPlan {
    /// Wei transferred to each recipient.
    pub amount_per_recipient: U256,
    /// Attempts per recipient before the batch aborts.
    pub attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl FundingPlan {
    pub fn new(amount_per_recipient: U256) -> Self {
        Self {
            amount_per_recipient,
            attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Confirmed transfers of a completed batch, in send order.
#[derive(Clone, Debug, Default)]
pub struct FundingReport {
    pub funded: Vec<(Address, B256)>,
}

/// Drives a funding batch over a [`ChainTransport`].
pub struct FundingOrchestrator<'a, T: ChainTransport> {
    transport: &'a T,
    chain_id: u64,
}

impl<'a, T: ChainTransport> FundingOrchestrator<'a, T> {
    pub fn new(transport: &'a T, chain_id: u64) -> Self {
        Self { transport, chain_id }
    }

    /// Transfer `plan.amount_per_recipient` to every recipient in order.
    ///
    /// Fees are re-quoted (with the doubling headroom) on every attempt, so
    /// a retry after a congestion spike carries a fresh estimate on the
    /// original nonce.
    pub async fn fund(
        &self,
        funder_key: B256,
        recipients: &[Address],
        plan: FundingPlan,
    ) -> Result<FundingReport, FundError> {
        let funder =
            Wallet::from_secret(funder_key).map_err(|_| FundError::InvalidFunderKey)?;
        tracing::info!(
            funder = %funder.address(),
            recipients = recipients.len(),
            amount = %plan.amount_per_recipient,
            "starting funding batch"
        );

        // Single nonce fetch per batch; see module docs.
        let mut nonce = self.transport.transaction_count(funder.address()).await?;
        let mut report = FundingReport::default();

        for (index, recipient) in recipients.iter().copied().enumerate() {
            let transport = self.transport;
            let chain_id = self.chain_id;
            let amount = plan.amount_per_recipient;
            let current_nonce = nonce;

            let outcome = with_retries(plan.attempts, plan.retry_delay, move || async move {
                let fees = transport.estimate_fees().await?;
                let tx = Eip1559Tx::transfer(chain_id, current_nonce, recipient, amount, fees);
                let signed = tx
                    .sign(&funder_key)
                    .map_err(|e| RpcError::Submission(e.to_string()))?;
                let tx_hash = transport.send_transaction(&signed).await?;
                let receipt = transport.wait_for_receipt(tx_hash).await?;
                if !receipt.success {
                    return Err(RpcError::Submission(format!(
                        "transfer {tx_hash} included but failed"
                    )));
                }
                Ok(tx_hash)
            })
            .await;

            match outcome {
                Ok(tx_hash) => {
                    tracing::info!(
                        %recipient,
                        %tx_hash,
                        nonce = current_nonce,
                        "funded wallet {}/{}",
                        index + 1,
                        recipients.len()
                    );
                    report.funded.push((recipient, tx_hash));
                    nonce += 1;
                }
                Err(RetryExhausted {
                    attempts,
                    last_error,
                }) => {
                    return Err(FundError::RetryExhausted {
                        recipient,
                        attempts,
                        last_error,
                    });
                }
            }
        }

        tracing::info!("funding batch complete: {} wallets", report.funded.len());
        Ok(report)
    }
}
