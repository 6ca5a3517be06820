//! Consumable: voucher secret protocol
//!
//! Distributes one-time-redeemable value vouchers bound to ephemeral
//! Ethereum addresses. Eligibility is proven by Merkle membership of the
//! address in a committed set rather than an on-chain allow-list; each
//! voucher ships as an opaque "secret" token holding the ephemeral private
//! key, its inclusion proof and the call metadata needed to redeem.
//!
//! # Pipeline
//!
//! ```text
//! generate_wallets ──► CommitmentTree ──► BatchDump   (operator-held)
//!                                            │
//!                                            ▼
//!                                      issue_secrets ──► tokens (distributed)
//!                                                            │
//!                                                            ▼
//!                                       decode ──► RedemptionClient::consume
//!
//! BatchDump ──► FundingOrchestrator::fund   (gas for the ephemeral wallets)
//! ```
//!
//! # Key Components
//!
//! - [`wallet`] - ephemeral key pairs, one per voucher
//! - [`tree`] - commitment tree matching the on-chain sorted-pair verifier
//! - [`dump`] - durable batch record (tree + keys)
//! - [`secret`] - opaque token codec and issuance
//! - [`redeem`] - redemption call building and submission
//! - [`fund`] - nonce-safe batched gas funding with bounded retry
//! - [`rpc`] - `ChainTransport` seam and the HTTP JSON-RPC provider

pub mod chains;
pub mod dump;
pub mod fund;
pub mod redeem;
pub mod retry;
pub mod rpc;
pub mod secret;
pub mod tree;
pub mod tx;
pub mod wallet;

pub use chains::ChainNetwork;
pub use dump::{BatchDump, DumpError};
pub use fund::{FundError, FundingOrchestrator, FundingPlan, FundingReport};
pub use redeem::{RedeemError, Redemption, RedemptionClient};
pub use retry::{with_retries, RetryExhausted};
pub use rpc::{ChainTransport, HttpProvider, RpcError, TxReceipt, DEFAULT_CONFIRMATION_TIMEOUT};
pub use secret::{
    decode, encode, issue_secrets, parse_method_signature, MethodArg, RedemptionPayload,
    SecretError,
};
pub use tree::{CommitmentTree, TreeDump, TreeError};
pub use tx::{Eip1559Tx, FeeEstimate, SignedTx, TxError};
pub use wallet::{generate_wallets, Wallet, WalletError};
