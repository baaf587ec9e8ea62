#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use zksync_fanout::errors::{Error, Result};
use zksync_fanout::ledger::{
    AccountId, EthAuthType, Finality, LedgerSession, Nonce, PendingTx, Receipt, Token,
    TransferRequest, TransferResult, TxHash,
};
use zksync_fanout::pacing::Pacer;
use zksync_fanout::rpc::{ChangePubKeyTx, TransferTx, TxSignature, ZkSigner};

pub fn funding_address() -> Address {
    Address::repeat_byte(0xf0)
}

/// What the scripted ledger answers for one `transfer` call.
#[derive(Debug, Clone)]
pub enum Step {
    Nonce(Nonce),
    Fail(&'static str),
}

/// In-memory ledger that replays a fixed script of transfer outcomes.
pub struct ScriptedLedger {
    pub account_id: Option<AccountId>,
    key_set: Mutex<bool>,
    registration_receipt: Receipt,
    registration_error: Option<&'static str>,
    steps: Mutex<VecDeque<Step>>,
    transfers: Mutex<Vec<TransferRequest>>,
    registrations: Mutex<Vec<(EthAuthType, Token)>>,
    receipts_awaited: Mutex<usize>,
}

impl ScriptedLedger {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            account_id: Some(42),
            key_set: Mutex::new(true),
            registration_receipt: Receipt {
                executed: true,
                success: true,
                fail_reason: None,
                block_number: Some(7),
                committed: true,
            },
            registration_error: None,
            steps: Mutex::new(steps.into_iter().collect()),
            transfers: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            receipts_awaited: Mutex::new(0),
        }
    }

    pub fn with_nonces(nonces: impl IntoIterator<Item = Nonce>) -> Self {
        Self::new(nonces.into_iter().map(Step::Nonce))
    }

    pub fn without_signing_key(self) -> Self {
        *self.key_set.lock().unwrap() = false;
        self
    }

    pub fn without_account_id(mut self) -> Self {
        self.account_id = None;
        self
    }

    pub fn rejecting_registration(mut self, reason: &'static str) -> Self {
        self.registration_receipt.success = false;
        self.registration_receipt.fail_reason = Some(reason.to_owned());
        self
    }

    pub fn failing_registration(mut self, message: &'static str) -> Self {
        self.registration_error = Some(message);
        self
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<(EthAuthType, Token)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn receipts_awaited(&self) -> usize {
        *self.receipts_awaited.lock().unwrap()
    }
}

#[async_trait]
impl LedgerSession for ScriptedLedger {
    fn address(&self) -> Address {
        funding_address()
    }

    async fn account_id(&self) -> Result<Option<AccountId>> {
        Ok(self.account_id)
    }

    async fn is_signing_key_set(&self) -> Result<bool> {
        Ok(*self.key_set.lock().unwrap())
    }

    async fn set_signing_key(&self, auth: EthAuthType, fee_token: Token) -> Result<PendingTx> {
        self.registrations.lock().unwrap().push((auth, fee_token));
        if let Some(message) = self.registration_error {
            return Err(Error::Rpc {
                method: "tx_submit".to_owned(),
                code: 101,
                message: message.to_owned(),
            });
        }
        Ok(PendingTx {
            tx_hash: TxHash::from("sync-tx:change-pub-key"),
        })
    }

    async fn await_receipt(&self, _tx: &PendingTx) -> Result<Receipt> {
        *self.receipts_awaited.lock().unwrap() += 1;
        if self.registration_receipt.success {
            *self.key_set.lock().unwrap() = true;
        }
        Ok(self.registration_receipt.clone())
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<TransferResult> {
        self.transfers.lock().unwrap().push(request.clone());
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("script ran out of transfer steps");

        match step {
            Step::Nonce(nonce) => Ok(TransferResult {
                tx_hash: TxHash(format!("sync-tx:{nonce:04}-{}", request.to)),
                nonce,
                receipt: None,
            }),
            Step::Fail(message) => Err(Error::Rpc {
                method: "tx_submit".to_owned(),
                code: -32000,
                message: message.to_owned(),
            }),
        }
    }

    async fn balance(&self, _token: Token, finality: Finality) -> Result<Decimal> {
        Ok(match finality {
            Finality::Committed => dec!(1.5),
            Finality::Verified => dec!(1.25),
        })
    }
}

/// Pacer that records every requested delay and returns immediately. Clones share state.
#[derive(Default, Clone)]
pub struct RecordingPacer {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingPacer {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

pub fn destinations(n: usize) -> Vec<Address> {
    (1..=n).map(|i| Address::repeat_byte(i as u8)).collect()
}

pub const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const FUNDING_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

pub const ZK_PUB_KEY: &str = "0x7a6b5c4d3e2f";
pub const ZK_PUB_KEY_HASH: &str = "sync:1111111111111111111111111111111111111111";

/// Layer-2 signer with a fixed key whose signatures name the signed transaction.
pub struct FixedZkSigner;

#[async_trait]
impl ZkSigner for FixedZkSigner {
    fn pub_key_hash(&self) -> String {
        ZK_PUB_KEY_HASH.to_owned()
    }

    async fn sign_transfer(&self, tx: &TransferTx) -> Result<TxSignature> {
        Ok(TxSignature {
            pub_key: ZK_PUB_KEY.to_owned(),
            signature: format!("transfer-{}", tx.nonce),
        })
    }

    async fn sign_change_pub_key(&self, tx: &ChangePubKeyTx) -> Result<TxSignature> {
        Ok(TxSignature {
            pub_key: ZK_PUB_KEY.to_owned(),
            signature: format!("change-pub-key-{}", tx.nonce),
        })
    }
}
