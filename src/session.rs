//! The funding account for one run.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::Result;
use crate::ledger::{AccountId, Finality, LedgerSession, Token};

/// Funding account state for the lifetime of a run.
///
/// Created once at start-up and passed by reference to the bootstrapper and the
/// dispatcher. Facts learned from the network (account id, key registration) are cached
/// here so they are asked for at most once.
pub struct FundingSession<L> {
    ledger: L,
    pub(crate) account_id: Option<AccountId>,
    pub(crate) signing_key_set: bool,
    pub(crate) registrations: usize,
}

/// Snapshot of the funding account, logged before dispatch starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub address: String,
    pub account_id: Option<AccountId>,
    pub signing_key_set: bool,
    pub committed_balance: Decimal,
    pub verified_balance: Decimal,
}

impl<L: LedgerSession> FundingSession<L> {
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            account_id: None,
            signing_key_set: false,
            registrations: 0,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn address(&self) -> Address {
        self.ledger.address()
    }

    /// Account id, if it has been observed.
    pub fn cached_account_id(&self) -> Option<AccountId> {
        self.account_id
    }

    pub fn signing_key_set(&self) -> bool {
        self.signing_key_set
    }

    /// Signing key registrations submitted through this session.
    pub fn registrations(&self) -> usize {
        self.registrations
    }

    /// Return the cached account id, asking the network only while it is unknown.
    pub async fn account_id(&mut self) -> Result<Option<AccountId>> {
        if self.account_id.is_none() {
            self.account_id = self.ledger.account_id().await?;
        }
        Ok(self.account_id)
    }

    #[tracing::instrument(skip(self), fields(address = %self.address()))]
    pub async fn summary(&mut self) -> Result<AccountSummary> {
        let committed_balance = self.ledger.balance(Token::ETH, Finality::Committed).await?;
        let verified_balance = self.ledger.balance(Token::ETH, Finality::Verified).await?;
        let account_id = self.account_id().await?;
        if account_id.is_some() && !self.signing_key_set {
            self.signing_key_set = self.ledger.is_signing_key_set().await?;
        }

        let summary = AccountSummary {
            address: self.address().to_string(),
            account_id,
            signing_key_set: self.signing_key_set,
            committed_balance,
            verified_balance,
        };

        match summary.account_id {
            Some(id) => tracing::info!(
                account_id = id,
                signing_key_set = summary.signing_key_set,
                committed = %summary.committed_balance,
                verified = %summary.verified_balance,
                "Funding account"
            ),
            None => tracing::warn!(
                committed = %summary.committed_balance,
                verified = %summary.verified_balance,
                "Funding account has no layer-2 account id yet"
            ),
        }

        Ok(summary)
    }
}
