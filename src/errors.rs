use alloy::primitives::ruint::ParseError;
use alloy::signers::local::LocalSignerError;
use derive_builder::UninitializedFieldError;
use thiserror::Error;

use crate::ledger::{Nonce, TxHash};

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("signing key registration failed: {0}")]
    AuthorizationFailure(String),
    #[error("dispatch cancelled")]
    Cancelled,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("transaction nonce did not advance: nonce {nonce} repeated by {tx_hash}")]
    DuplicateNonce { nonce: Nonce, tx_hash: TxHash },
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid amount {value:?}: {reason}")]
    InvalidAmount { value: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    LocalSigner(#[from] LocalSignerError),
    #[error("no layer-2 signer configured, refusing to submit {0}")]
    MissingZkSigner(&'static str),
    #[error("receipt for {0} not received before timeout")]
    ReceiptTimeout(TxHash),
    #[error("rpc error({code}) calling {method}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
    #[error(transparent)]
    UninitializedField(#[from] UninitializedFieldError),
    #[error("unknown account id: the funding account is not yet known on layer 2")]
    UnknownAccountId,
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    #[error(transparent)]
    U256Parse(#[from] ParseError),
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    pub(crate) fn invalid_amount(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// A dispatch run that ended before every destination was funded.
///
/// `processed` counts the transfers that were accepted before the failure.
/// Those transfers stay valid; the run simply stops moving forward.
#[derive(Debug, Error)]
#[error("dispatch halted after {processed} confirmed transfer(s): {cause}")]
pub struct DispatchError {
    pub processed: usize,
    #[source]
    pub cause: Error,
}

impl DispatchError {
    pub fn new(processed: usize, cause: Error) -> Self {
        Self { processed, cause }
    }
}
