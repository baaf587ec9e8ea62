//! Sequential transfer dispatch.
//!
//! The dispatcher funds an ordered list of destinations from the funding account, one
//! transfer at a time:
//!
//! ```text
//! Idle -> Bootstrapping -> Ready -> Submitting -> Ready -> ... -> Confirmed
//!                                        \-> Halted
//! ```
//!
//! Before the first transfer the signing key is registered (once per run). Each transfer
//! must come back with a nonce different from the previous one; a repeated nonce means the
//! account is not advancing and the run stops immediately. Network errors stop the run as
//! well. Nothing is retried and no destination is skipped, so the set of funded addresses
//! is always a prefix of the input.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;

use crate::amount::quantize;
use crate::bootstrap::ensure_signing_key;
use crate::config::{Config, DEFAULT_PACING, DEFAULT_TRANSFER_AMOUNT, DEFAULT_TRANSFER_FEE};
use crate::errors::{DispatchError, Error};
use crate::ledger::{LedgerSession, Nonce, TransferRequest, TxHash};
use crate::pacing::Pacer;
use crate::record::{RecordSink, TransferOutcome, TransferRecord};
use crate::session::FundingSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Idle,
    Bootstrapping,
    Ready,
    Submitting,
    Confirmed,
    Halted,
}

/// Progress of the current run. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchState {
    pub last_observed_nonce: Option<Nonce>,
    pub processed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Amount per transfer, in ETH.
    pub amount: String,
    /// Fee per transfer, in ETH.
    pub fee: String,
    pub pacing: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            amount: DEFAULT_TRANSFER_AMOUNT.to_owned(),
            fee: DEFAULT_TRANSFER_FEE.to_owned(),
            pacing: DEFAULT_PACING,
        }
    }
}

impl From<&Config> for DispatchConfig {
    fn from(config: &Config) -> Self {
        Self {
            amount: config.transfer_amount.clone(),
            fee: config.transfer_fee.clone(),
            pacing: config.pacing,
        }
    }
}

/// A transfer the node accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTransfer {
    pub destination: Address,
    pub nonce: Nonce,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub confirmed: Vec<ConfirmedTransfer>,
}

impl DispatchReport {
    pub fn processed(&self) -> usize {
        self.confirmed.len()
    }
}

pub struct Dispatcher<P> {
    config: DispatchConfig,
    pacer: P,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
    phase: DispatchPhase,
    state: DispatchState,
}

impl<P: Pacer> Dispatcher<P> {
    pub fn new(config: DispatchConfig, pacer: P, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config,
            pacer,
            sink,
            cancel: CancellationToken::new(),
            phase: DispatchPhase::Idle,
            state: DispatchState::default(),
        }
    }

    /// Stop between submissions once `token` is cancelled. An in-flight submission is
    /// always allowed to finish.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    /// Fund every destination in order.
    ///
    /// Returns the confirmed transfers on success. On failure the error carries how many
    /// transfers were accepted before the run halted.
    #[tracing::instrument(skip_all, fields(destinations = destinations.len()))]
    pub async fn run<L: LedgerSession>(
        &mut self,
        session: &mut FundingSession<L>,
        destinations: &[Address],
    ) -> Result<DispatchReport, DispatchError> {
        self.state = DispatchState::default();
        self.phase = DispatchPhase::Idle;
        let mut report = DispatchReport::default();

        if destinations.is_empty() {
            tracing::info!("No destinations to fund");
            self.phase = DispatchPhase::Confirmed;
            return Ok(report);
        }

        // Amount and fee are fixed for the run, so a bad value fails before any fee is spent.
        let (amount, fee) =
            quantize(&self.config.amount, &self.config.fee).map_err(|e| self.halt(e))?;

        self.phase = DispatchPhase::Bootstrapping;
        ensure_signing_key(session).await.map_err(|e| self.halt(e))?;
        self.phase = DispatchPhase::Ready;

        for (index, destination) in destinations.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.halt(Error::Cancelled));
            }

            self.phase = DispatchPhase::Submitting;
            let request = TransferRequest::native(*destination, amount, fee);
            tracing::debug!(index, to = %destination, amount = %amount, fee = %fee, "Submitting transfer");

            let result = match session.ledger().transfer(&request).await {
                Ok(result) => result,
                Err(e) => {
                    let mut record = TransferRecord::new(index, &request, TransferOutcome::Failed);
                    record.error = Some(e.to_string());
                    self.sink.record(&record);
                    return Err(self.halt(e));
                }
            };

            if self.state.last_observed_nonce == Some(result.nonce) {
                let mut record =
                    TransferRecord::new(index, &request, TransferOutcome::DuplicateNonce);
                record.nonce = Some(result.nonce);
                record.tx_hash = Some(result.tx_hash.to_string());
                self.sink.record(&record);
                return Err(self.halt(Error::DuplicateNonce {
                    nonce: result.nonce,
                    tx_hash: result.tx_hash,
                }));
            }

            self.state.last_observed_nonce = Some(result.nonce);
            self.state.processed += 1;

            let mut record = TransferRecord::new(index, &request, TransferOutcome::Confirmed);
            record.nonce = Some(result.nonce);
            record.tx_hash = Some(result.tx_hash.to_string());
            self.sink.record(&record);

            report.confirmed.push(ConfirmedTransfer {
                destination: *destination,
                nonce: result.nonce,
                tx_hash: result.tx_hash,
            });
            self.phase = DispatchPhase::Ready;

            if index + 1 < destinations.len() {
                let cancelled = tokio::select! {
                    _ = self.pacer.wait(self.config.pacing) => false,
                    _ = self.cancel.cancelled() => true,
                };
                if cancelled {
                    return Err(self.halt(Error::Cancelled));
                }
            }
        }

        self.phase = DispatchPhase::Confirmed;
        tracing::info!(processed = self.state.processed, "All transfers submitted");
        Ok(report)
    }

    fn halt(&mut self, cause: Error) -> DispatchError {
        self.phase = DispatchPhase::Halted;
        tracing::error!(processed = self.state.processed, error = %cause, "Dispatch halted");
        DispatchError::new(self.state.processed, cause)
    }
}
