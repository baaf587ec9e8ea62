//! Provision a batch of fresh wallets and fund each of them from one zkSync account.
//!
//! The run is strictly sequential: wallets are generated and saved, the funding account's
//! signing key is registered if needed, and then one transfer per wallet is submitted,
//! spaced by a fixed delay. A transfer whose nonce repeats the previous one halts the run.

pub mod amount;
pub mod bootstrap;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fanout;
pub mod ledger;
pub mod logging;
pub mod pacing;
pub mod persist;
pub mod record;
pub mod rpc;
pub mod session;
pub mod wallet;

pub use amount::{quantize, PackedAmount, PackedFee};
pub use bootstrap::ensure_signing_key;
pub use config::{Config, ConfigBuilder, PRIVATE_KEY_VAR};
pub use dispatch::{DispatchConfig, DispatchPhase, DispatchReport, Dispatcher};
pub use errors::{DispatchError, Error, Result};
pub use ledger::{LedgerSession, Token, TransferRequest, TransferResult};
pub use session::FundingSession;

/// Wallets generated when no count is given.
pub const DEFAULT_WALLET_COUNT: usize = 10;
