//! Per-transfer records.
//!
//! The dispatcher reports every submission as a [`TransferRecord`] through a
//! [`RecordSink`]. Production runs log them with `tracing` and optionally append them to a
//! JSON lines file; tests collect them in memory and assert on the values.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::errors::Result;
use crate::ledger::{Nonce, TransferRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferOutcome {
    Confirmed,
    DuplicateNonce,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    /// Position of the destination in the batch.
    pub index: usize,
    pub destination: String,
    /// Packed amount in wei.
    pub amount: String,
    /// Packed fee in wei.
    pub fee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Nonce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub outcome: TransferOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferRecord {
    pub(crate) fn new(index: usize, request: &TransferRequest, outcome: TransferOutcome) -> Self {
        Self {
            index,
            destination: request.to.to_string(),
            amount: request.amount.to_string(),
            fee: request.fee.to_string(),
            nonce: None,
            tx_hash: None,
            outcome,
            error: None,
        }
    }
}

/// Receives one record per submitted transfer.
pub trait RecordSink: Send + Sync {
    fn record(&self, record: &TransferRecord);
}

impl<A: RecordSink, B: RecordSink> RecordSink for (A, B) {
    fn record(&self, record: &TransferRecord) {
        self.0.record(record);
        self.1.record(record);
    }
}

/// Emits records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn record(&self, record: &TransferRecord) {
        match record.outcome {
            TransferOutcome::Confirmed => tracing::info!(
                index = record.index,
                destination = %record.destination,
                amount = %record.amount,
                nonce = ?record.nonce,
                tx_hash = ?record.tx_hash,
                "Transfer accepted"
            ),
            TransferOutcome::DuplicateNonce => tracing::error!(
                index = record.index,
                destination = %record.destination,
                nonce = ?record.nonce,
                tx_hash = ?record.tx_hash,
                "Transfer nonce is the same as the previous one"
            ),
            TransferOutcome::Failed => tracing::error!(
                index = record.index,
                destination = %record.destination,
                error = ?record.error,
                "Transfer failed"
            ),
        }
    }
}

/// Appends each record to a file as one JSON object per line.
pub struct JsonLinesSink {
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub fn file(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl RecordSink for JsonLinesSink {
    fn record(&self, record: &TransferRecord) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize transfer record");
                return;
            }
        };

        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(file, "{json}") {
            tracing::warn!(error = %e, "Failed to write transfer record");
        }
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<TransferRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TransferRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RecordSink for MemorySink {
    fn record(&self, record: &TransferRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
    }
}
