//! Signing key registration.
//!
//! An account must bind a layer-2 signing key before it can authorize transfers. The
//! registration is itself a transaction: it needs a known account id, pays a fee, and has
//! to be committed before the first transfer is sent.

use crate::errors::{Error, Result};
use crate::ledger::{EthAuthType, LedgerSession, Token};
use crate::session::FundingSession;

/// Make sure the funding account has a registered signing key.
///
/// A no-op when the key is already registered. Otherwise submits one ECDSA-authorized
/// registration paid in ETH and waits until it is committed. Fails with
/// [`Error::UnknownAccountId`] when the account has no layer-2 id, and with
/// [`Error::AuthorizationFailure`] when the registration does not go through.
#[tracing::instrument(skip_all, fields(address = %session.address()))]
pub async fn ensure_signing_key<L: LedgerSession>(session: &mut FundingSession<L>) -> Result<()> {
    if session.signing_key_set {
        return Ok(());
    }

    let is_set = session.ledger().is_signing_key_set().await?;
    tracing::info!(is_set, "Checked signing key");
    if is_set {
        session.signing_key_set = true;
        return Ok(());
    }

    let account_id = session.account_id().await?.ok_or(Error::UnknownAccountId)?;
    if session.registrations > 0 {
        return Err(Error::AuthorizationFailure(
            "a registration was already attempted in this session".to_owned(),
        ));
    }

    tracing::info!(account_id, "Registering signing key");
    session.registrations += 1;
    let pending = session
        .ledger()
        .set_signing_key(EthAuthType::Ecdsa, Token::ETH)
        .await
        .map_err(|e| Error::AuthorizationFailure(e.to_string()))?;

    let receipt = session
        .ledger()
        .await_receipt(&pending)
        .await
        .map_err(|e| Error::AuthorizationFailure(e.to_string()))?;

    if !receipt.success {
        let reason = receipt
            .fail_reason
            .unwrap_or_else(|| "rejected without a reason".to_owned());
        tracing::error!(tx_hash = %pending.tx_hash, %reason, "Signing key registration failed");
        return Err(Error::AuthorizationFailure(reason));
    }

    tracing::info!(
        tx_hash = %pending.tx_hash,
        block = ?receipt.block_number,
        "Signing key registered"
    );
    session.signing_key_set = true;
    Ok(())
}
