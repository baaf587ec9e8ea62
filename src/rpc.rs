//! JSON-RPC ledger session.
//!
//! Talks to a zkSync (v1) node over its `jsrpc` endpoint. Every layer-2 transaction needs two
//! signatures: one from the account's layer-2 key (through a [`ZkSigner`]) and one from the
//! funding account's Ethereum key (EIP-191 over the human readable message, or ECDSA
//! `ethAuthData` for signing key registration).
//!
//! Without a [`ZkSigner`] the ledger is read-only: it answers account queries and polls
//! receipts, but refuses to submit anything.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::hex;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::amount::PackedFee;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::ledger::{
    wei_to_eth, AccountId, EthAuthType, Finality, LedgerSession, Nonce, PendingTx, Receipt,
    Token, TransferRequest, TransferResult, TxHash,
};

/// Pub key hash of an account that never registered a signing key.
pub const ZERO_PUB_KEY_HASH: &str = "sync:0000000000000000000000000000000000000000";
const VALID_UNTIL: u64 = u32::MAX as u64;

/// Layer-2 key of the funding account.
///
/// zkSync derives it from the Ethereum key's signature over a fixed seed message and signs
/// every layer-2 transaction with it. Implementations own the binary transaction encoding
/// and the zk-friendly signature scheme.
#[async_trait]
pub trait ZkSigner: Send + Sync {
    /// `sync:`-prefixed hash of the layer-2 public key.
    fn pub_key_hash(&self) -> String;

    async fn sign_transfer(&self, tx: &TransferTx) -> Result<TxSignature>;

    async fn sign_change_pub_key(&self, tx: &ChangePubKeyTx) -> Result<TxSignature>;
}

/// Layer-2 signature attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSignature {
    pub pub_key: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: Option<AccountId>,
    pub committed: AccountState,
    pub verified: AccountState,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    #[serde(default)]
    pub balances: HashMap<String, String>,
    pub nonce: Nonce,
    pub pub_key_hash: String,
}

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxInfo {
    executed: bool,
    success: Option<bool>,
    fail_reason: Option<String>,
    block: Option<TxBlock>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxBlock {
    block_number: u64,
    committed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxFee {
    total_fee: String,
}

/// Unsigned layer-2 transfer. Amount and fee are packable wei values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTx {
    #[serde(rename = "type")]
    kind: &'static str,
    pub account_id: AccountId,
    pub from: String,
    pub to: String,
    pub token: u32,
    pub amount: String,
    pub fee: String,
    pub nonce: Nonce,
    pub valid_from: u64,
    pub valid_until: u64,
}

/// Unsigned signing key registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePubKeyTx {
    #[serde(rename = "type")]
    kind: &'static str,
    pub account_id: AccountId,
    pub account: String,
    pub new_pk_hash: String,
    pub fee_token: u32,
    pub fee: String,
    pub nonce: Nonce,
    eth_auth_data: EthAuthData,
    pub valid_from: u64,
    pub valid_until: u64,
}

#[derive(Serialize)]
struct Signed<'a, T> {
    #[serde(flatten)]
    tx: &'a T,
    signature: TxSignature,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct EthAuthData {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    eth_signature: Option<String>,
}

#[derive(Serialize)]
struct EthSignature {
    #[serde(rename = "type")]
    kind: &'static str,
    signature: String,
}

pub struct JsonRpcLedger {
    client: reqwest::Client,
    url: Url,
    signer: PrivateKeySigner,
    poll_interval: Duration,
    receipt_timeout: Duration,
    next_id: AtomicU64,
    zk_signer: Option<Arc<dyn ZkSigner>>,
}

impl JsonRpcLedger {
    pub fn new(url: Url, signer: PrivateKeySigner) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            signer,
            poll_interval: Duration::from_secs(1),
            receipt_timeout: Duration::from_secs(300),
            next_id: AtomicU64::new(1),
            zk_signer: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.rpc_url.clone(), config.signer()?)
            .with_receipt_polling(config.receipt_poll_interval, config.receipt_timeout))
    }

    pub fn with_receipt_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_zk_signer(mut self, signer: Arc<dyn ZkSigner>) -> Self {
        self.zk_signer = Some(signer);
        self
    }

    /// Whether this ledger can submit transactions.
    pub fn can_submit(&self) -> bool {
        self.zk_signer.is_some()
    }

    pub async fn account_info(&self) -> Result<AccountInfo> {
        self.call("account_info", [self.address_hex()]).await
    }

    fn zk_signer(&self, operation: &'static str) -> Result<&dyn ZkSigner> {
        self.zk_signer
            .as_deref()
            .ok_or(Error::MissingZkSigner(operation))
    }

    fn address_hex(&self) -> String {
        self.signer.address().to_string().to_lowercase()
    }

    async fn eth_signature(&self, message: &[u8]) -> Result<String> {
        let signature = self.signer.sign_message(message).await?;
        Ok(hex::encode_prefixed(signature.as_bytes()))
    }

    async fn change_pub_key_fee(&self, auth: EthAuthType, token: Token) -> Result<PackedFee> {
        let fee: TxFee = self
            .call(
                "get_tx_fee",
                (
                    json!({ "ChangePubKey": auth.as_str() }),
                    self.address_hex(),
                    token.symbol,
                ),
            )
            .await?;
        PackedFee::closest(U256::from_str(&fee.total_fee)?)
    }

    #[tracing::instrument(skip(self, params), fields(url = %self.url))]
    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: RpcResponse<R> = response.json().await?;

        match (body.result, body.error) {
            (_, Some(error)) => {
                tracing::warn!(code = error.code, message = %error.message, "RPC call rejected");
                Err(Error::Rpc {
                    method: method.to_owned(),
                    code: error.code,
                    message: error.message,
                })
            }
            (Some(result), None) => Ok(result),
            (None, None) => Err(Error::Rpc {
                method: method.to_owned(),
                code: 0,
                message: "response carried neither result nor error".to_owned(),
            }),
        }
    }
}

#[async_trait]
impl LedgerSession for JsonRpcLedger {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn account_id(&self) -> Result<Option<AccountId>> {
        Ok(self.account_info().await?.id)
    }

    async fn is_signing_key_set(&self) -> Result<bool> {
        let info = self.account_info().await?;
        let committed = info.committed.pub_key_hash;
        Ok(match &self.zk_signer {
            Some(signer) => committed == signer.pub_key_hash(),
            // A key we cannot sign for must never be replaced.
            None => committed != ZERO_PUB_KEY_HASH,
        })
    }

    async fn set_signing_key(&self, auth: EthAuthType, fee_token: Token) -> Result<PendingTx> {
        let zk_signer = self.zk_signer("ChangePubKey")?;
        let new_pk_hash = zk_signer.pub_key_hash();
        let pk_hash = parse_pub_key_hash(&new_pk_hash)?;

        let info = self.account_info().await?;
        let account_id = info.id.ok_or(Error::UnknownAccountId)?;
        let nonce = info.committed.nonce;
        let fee = self.change_pub_key_fee(auth, fee_token).await?;

        let eth_signature = match auth {
            EthAuthType::Ecdsa => {
                let mut message = Vec::with_capacity(60);
                message.extend_from_slice(&pk_hash);
                message.extend_from_slice(&nonce.to_be_bytes());
                message.extend_from_slice(&account_id.to_be_bytes());
                message.extend_from_slice(&[0u8; 32]);
                Some(self.eth_signature(&message).await?)
            }
            EthAuthType::Onchain => None,
        };

        let tx = ChangePubKeyTx {
            kind: "ChangePubKey",
            account_id,
            account: self.address_hex(),
            new_pk_hash,
            fee_token: fee_token.id,
            fee: fee.to_string(),
            nonce,
            eth_auth_data: EthAuthData {
                kind: auth.as_str(),
                eth_signature,
            },
            valid_from: 0,
            valid_until: VALID_UNTIL,
        };

        let signed = Signed {
            signature: zk_signer.sign_change_pub_key(&tx).await?,
            tx: &tx,
        };
        let tx_hash: TxHash = self
            .call("tx_submit", (signed, Option::<EthSignature>::None, false))
            .await?;
        tracing::info!(%tx_hash, account_id, nonce, fee = %fee, "Submitted ChangePubKey");
        Ok(PendingTx { tx_hash })
    }

    async fn await_receipt(&self, tx: &PendingTx) -> Result<Receipt> {
        let deadline = tokio::time::Instant::now() + self.receipt_timeout;
        loop {
            let info: TxInfo = self.call("tx_info", [tx.tx_hash.0.as_str()]).await?;
            if info.executed {
                let success = info.success.unwrap_or(false);
                let committed = info.block.as_ref().is_some_and(|b| b.committed);
                if !success || committed {
                    return Ok(Receipt {
                        executed: true,
                        success,
                        fail_reason: info.fail_reason,
                        block_number: info.block.map(|b| b.block_number),
                        committed,
                    });
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::ReceiptTimeout(tx.tx_hash.clone()));
            }
            tracing::debug!(tx_hash = %tx.tx_hash, executed = info.executed, "Waiting for receipt");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResult> {
        let zk_signer = self.zk_signer("Transfer")?;
        let info = self.account_info().await?;
        let account_id = info.id.ok_or(Error::UnknownAccountId)?;
        let nonce = info.committed.nonce;
        let to = request.to.to_string().to_lowercase();

        let message = transfer_message(request, &to, nonce)?;
        let eth_signature = EthSignature {
            kind: "EthereumSignature",
            signature: self.eth_signature(message.as_bytes()).await?,
        };

        let tx = TransferTx {
            kind: "Transfer",
            account_id,
            from: self.address_hex(),
            to,
            token: request.token.id,
            amount: request.amount.to_string(),
            fee: request.fee.to_string(),
            nonce,
            valid_from: 0,
            valid_until: VALID_UNTIL,
        };
        let signed = Signed {
            signature: zk_signer.sign_transfer(&tx).await?,
            tx: &tx,
        };

        let tx_hash: TxHash = self
            .call("tx_submit", (signed, Some(eth_signature), false))
            .await?;
        Ok(TransferResult {
            tx_hash,
            nonce,
            receipt: None,
        })
    }

    async fn balance(&self, token: Token, finality: Finality) -> Result<Decimal> {
        let info = self.account_info().await?;
        let state = match finality {
            Finality::Committed => &info.committed,
            Finality::Verified => &info.verified,
        };
        let wei = match state.balances.get(token.symbol) {
            Some(raw) => U256::from_str(raw)?,
            None => U256::ZERO,
        };
        wei_to_eth(wei)
    }
}

/// Message the Ethereum key signs to authorize a transfer.
fn transfer_message(request: &TransferRequest, to: &str, nonce: Nonce) -> Result<String> {
    Ok(format!(
        "Transfer {amount} {token} to: {to}\nFee: {fee} {token}\nNonce: {nonce}",
        amount = format_units(request.amount.wei())?,
        fee = format_units(request.fee.wei())?,
        token = request.token,
    ))
}

/// Decimal ETH with at least one fractional digit (`1.0`, `0.01`).
fn format_units(wei: U256) -> Result<String> {
    let formatted = wei_to_eth(wei)?.to_string();
    Ok(if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    })
}

fn parse_pub_key_hash(value: &str) -> Result<[u8; 20]> {
    let raw = value
        .strip_prefix("sync:")
        .ok_or_else(|| Error::Validation(format!("pub key hash {value:?} lacks the sync: prefix")))?;
    let mut hash = [0u8; 20];
    hex::decode_to_slice(raw, &mut hash)
        .map_err(|e| Error::Validation(format!("pub key hash {value:?}: {e}")))?;
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::quantize;

    #[test]
    fn transfer_message_lists_amount_fee_and_nonce() {
        let (amount, fee) = quantize("1", "0.0013").unwrap();
        let to = Address::repeat_byte(0xab).to_string().to_lowercase();
        let request = TransferRequest::native(Address::repeat_byte(0xab), amount, fee);

        let message = transfer_message(&request, &to, 7).unwrap();

        assert_eq!(
            message,
            format!("Transfer 1.0 ETH to: {to}\nFee: 0.0013 ETH\nNonce: 7")
        );
    }

    #[test]
    fn pub_key_hash_must_be_prefixed_hex() {
        let hash = parse_pub_key_hash(ZERO_PUB_KEY_HASH).unwrap();
        assert_eq!(hash, [0u8; 20]);

        assert!(parse_pub_key_hash("0000000000000000000000000000000000000000").is_err());
        assert!(parse_pub_key_hash("sync:00").is_err());
    }
}
