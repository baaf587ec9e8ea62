//! Layer-2 ledger abstraction.
//!
//! `LedgerSession` is the contract the bootstrapper and the dispatcher consume. The
//! production implementation lives in [`crate::rpc`]; tests substitute scripted
//! in-memory ledgers.

use std::fmt;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::amount::{PackedAmount, PackedFee};
use crate::errors::Result;

/// Layer-2 account identifier, assigned once the account has received funds.
pub type AccountId = u32;

/// Per-account transaction counter.
pub type Nonce = u32;

/// Hash of a layer-2 transaction, as returned by the node (`sync-tx:<hex>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TxHash {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A token known to the layer-2 network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub symbol: &'static str,
}

impl Token {
    /// The native asset. Transfers and fees are always paid in it.
    pub const ETH: Token = Token { id: 0, symbol: "ETH" };
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol)
    }
}

/// Balance finality. Committed state is accepted but not final; verified is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finality {
    Committed,
    Verified,
}

/// How the signing key registration is authorized on layer 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EthAuthType {
    #[serde(rename = "ECDSA")]
    Ecdsa,
    #[serde(rename = "Onchain")]
    Onchain,
}

impl EthAuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EthAuthType::Ecdsa => "ECDSA",
            EthAuthType::Onchain => "Onchain",
        }
    }
}

/// A submitted transaction whose receipt has not been awaited yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: TxHash,
}

/// Execution receipt of a layer-2 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub executed: bool,
    pub success: bool,
    pub fail_reason: Option<String>,
    pub block_number: Option<u64>,
    pub committed: bool,
}

/// One transfer from the funding account. Built fresh per destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub to: Address,
    pub token: Token,
    pub amount: PackedAmount,
    pub fee: PackedFee,
}

impl TransferRequest {
    pub fn native(to: Address, amount: PackedAmount, fee: PackedFee) -> Self {
        Self {
            to,
            token: Token::ETH,
            amount,
            fee,
        }
    }
}

/// What the node reports back for a submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    pub tx_hash: TxHash,
    pub nonce: Nonce,
    pub receipt: Option<Receipt>,
}

/// A funding account's view of the layer-2 network.
///
/// Every method is a single network round trip. Nothing here retries; callers decide.
#[async_trait]
pub trait LedgerSession: Send + Sync {
    /// Layer-1 address of the account this session signs for.
    fn address(&self) -> Address;

    /// `None` while the account is unknown to layer 2.
    async fn account_id(&self) -> Result<Option<AccountId>>;

    async fn is_signing_key_set(&self) -> Result<bool>;

    /// Submit a key registration transaction. Does not wait for it.
    async fn set_signing_key(&self, auth: EthAuthType, fee_token: Token) -> Result<PendingTx>;

    /// Block until `tx` is executed and committed, or the session's timeout expires.
    async fn await_receipt(&self, tx: &PendingTx) -> Result<Receipt>;

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResult>;

    /// Balance in whole token units.
    async fn balance(&self, token: Token, finality: Finality) -> Result<Decimal>;
}

/// Convert a wei amount into whole ETH as a decimal.
pub fn wei_to_eth(wei: U256) -> Result<Decimal> {
    let raw = u128::try_from(wei)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| crate::errors::Error::invalid_amount(wei.to_string(), "too large"))?;
    Decimal::try_from_i128_with_scale(raw, crate::amount::ETH_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|e| crate::errors::Error::invalid_amount(wei.to_string(), e.to_string()))
}
