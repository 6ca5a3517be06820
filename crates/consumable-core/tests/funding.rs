//! Funding batch behavior against a scripted transport.
//!
//! Checks the nonce accounting rules: a retried transfer reuses its nonce,
//! confirmed transfers advance it by exactly one, and an exhausted retry
//! aborts the batch before the next recipient is touched.

use std::sync::Mutex;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use consumable_core::{
    ChainTransport, FeeEstimate, FundError, FundingOrchestrator, FundingPlan, RpcError, SignedTx,
    TxReceipt,
};

const CHAIN_ID: u64 = 534351;
const START_NONCE: u64 = 9;

/// Confirms every accepted transfer; rejects sends according to a script of
/// per-call verdicts (`true` = accept). Records the nonce of every attempt.
struct ScriptedTransport {
    script: Mutex<Vec<bool>>,
    attempted_nonces: Mutex<Vec<u64>>,
}

impl ScriptedTransport {
    fn new(script: Vec<bool>) -> Self {
        Self {
            script: Mutex::new(script),
            attempted_nonces: Mutex::new(Vec::new()),
        }
    }

    fn attempted_nonces(&self) -> Vec<u64> {
        self.attempted_nonces.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainTransport for ScriptedTransport {
    async fn transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        Ok(START_NONCE)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, RpcError> {
        Ok(FeeEstimate::with_headroom(1_000_000_000, 1_000_000_000))
    }

    async fn send_transaction(&self, tx: &SignedTx) -> Result<B256, RpcError> {
        self.attempted_nonces.lock().unwrap().push(tx.nonce);
        let mut script = self.script.lock().unwrap();
        let accept = if script.is_empty() {
            true
        } else {
            script.remove(0)
        };
        if accept {
            Ok(tx.hash)
        } else {
            Err(RpcError::Submission("scripted rejection".into()))
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, RpcError> {
        Ok(TxReceipt {
            tx_hash,
            block_number: 1,
            success: true,
            reason: None,
        })
    }
}

fn recipients(count: usize) -> Vec<Address> {
    (1..=count as u8).map(Address::repeat_byte).collect()
}

fn funder_key() -> B256 {
    B256::repeat_byte(0x2a)
}

#[tokio::test(start_paused = true)]
async fn funds_sequentially_with_contiguous_nonces() {
    let transport = ScriptedTransport::new(vec![]);
    let orchestrator = FundingOrchestrator::new(&transport, CHAIN_ID);

    let report = orchestrator
        .fund(
            funder_key(),
            &recipients(3),
            FundingPlan::new(U256::from(10u64.pow(16))),
        )
        .await
        .unwrap();

    assert_eq!(report.funded.len(), 3);
    assert_eq!(
        transport.attempted_nonces(),
        vec![START_NONCE, START_NONCE + 1, START_NONCE + 2]
    );
}

#[tokio::test(start_paused = true)]
async fn retry_reuses_the_same_nonce() {
    // Second transfer fails once, then succeeds on retry.
    let transport = ScriptedTransport::new(vec![true, false, true, true]);
    let orchestrator = FundingOrchestrator::new(&transport, CHAIN_ID);

    let report = orchestrator
        .fund(
            funder_key(),
            &recipients(3),
            FundingPlan::new(U256::from(10u64.pow(16))),
        )
        .await
        .unwrap();

    assert_eq!(report.funded.len(), 3);
    // The retried send reused nonce n+1; the batch used n, n+1, n+2 with no gap.
    assert_eq!(
        transport.attempted_nonces(),
        vec![
            START_NONCE,
            START_NONCE + 1,
            START_NONCE + 1,
            START_NONCE + 2
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_abort_the_batch() {
    // Second transfer fails on all three attempts.
    let transport = ScriptedTransport::new(vec![true, false, false, false]);
    let orchestrator = FundingOrchestrator::new(&transport, CHAIN_ID);

    let targets = recipients(3);
    let err = orchestrator
        .fund(
            funder_key(),
            &targets,
            FundingPlan::new(U256::from(10u64.pow(16))),
        )
        .await
        .unwrap_err();

    match err {
        FundError::RetryExhausted {
            recipient,
            attempts,
            ..
        } => {
            assert_eq!(recipient, targets[1]);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }

    // The third recipient never saw an attempt: nonce n+2 was never used.
    assert_eq!(
        transport.attempted_nonces(),
        vec![
            START_NONCE,
            START_NONCE + 1,
            START_NONCE + 1,
            START_NONCE + 1
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_funder_key_fails_before_any_network_call() {
    let transport = ScriptedTransport::new(vec![]);
    let orchestrator = FundingOrchestrator::new(&transport, CHAIN_ID);

    let err = orchestrator
        .fund(B256::ZERO, &recipients(2), FundingPlan::new(U256::from(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, FundError::InvalidFunderKey));
    assert!(transport.attempted_nonces().is_empty());
}
