//! Durable record of generated wallets.
//!
//! Keys are written before any transfer goes out, so funds never reach an address
//! whose private key was not saved.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::Result;
use crate::wallet::Keypair;

/// Destination for a batch of generated keypairs.
pub trait KeypairSink {
    /// Write every keypair, in order, and make the write durable before returning.
    fn persist(&mut self, keypairs: &[Keypair]) -> Result<()>;
}

#[derive(Serialize)]
struct KeypairRow {
    #[serde(rename = "PrivateKey")]
    private_key: String,
    #[serde(rename = "EthAddress")]
    address: String,
}

/// Two column CSV file (`PrivateKey,EthAddress`).
#[derive(Debug, Clone)]
pub struct CsvKeypairFile {
    path: PathBuf,
}

impl CsvKeypairFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `ethaddrs_<unix seconds>.csv` inside `dir`.
    pub fn timestamped_in(dir: impl AsRef<Path>) -> Self {
        let timestamp = chrono::Utc::now().timestamp();
        Self::new(dir.as_ref().join(format!("ethaddrs_{timestamp}.csv")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeypairSink for CsvKeypairFile {
    fn persist(&mut self, keypairs: &[Keypair]) -> Result<()> {
        // Never clobber keys from an earlier run.
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)?;

        let mut writer = csv::Writer::from_writer(file);
        for keypair in keypairs {
            writer.serialize(KeypairRow {
                private_key: keypair.private_key_hex(),
                address: keypair.address().to_string(),
            })?;
        }
        if keypairs.is_empty() {
            writer.write_record(["PrivateKey", "EthAddress"])?;
        }
        writer.flush()?;

        let file: File = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        tracing::info!(path = %self.path.display(), count = keypairs.len(), "Saved wallets");
        Ok(())
    }
}
