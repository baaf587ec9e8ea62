//! Run configuration, read from the environment (and `.env`, loaded by the binaries).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use derive_builder::Builder;
use url::Url;

use crate::errors::{Error, Result};

pub const PRIVATE_KEY_VAR: &str = "PRIV_KEY";
pub const RPC_URL_VAR: &str = "ZKSYNC_RPC_URL";
pub const TRANSFER_AMOUNT_VAR: &str = "TRANSFER_AMOUNT";
pub const TRANSFER_FEE_VAR: &str = "TRANSFER_FEE";
pub const PACING_SECS_VAR: &str = "PACING_SECS";
pub const RECEIPT_POLL_MS_VAR: &str = "RECEIPT_POLL_MS";
pub const RECEIPT_TIMEOUT_SECS_VAR: &str = "RECEIPT_TIMEOUT_SECS";
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIR";
pub const RECORDS_FILE_VAR: &str = "RECORDS_FILE";

pub const DEFAULT_RPC_URL: &str = "https://goerli-api.zksync.io/jsrpc";
pub const DEFAULT_TRANSFER_AMOUNT: &str = "0.01";
pub const DEFAULT_TRANSFER_FEE: &str = "0.0013";
pub const DEFAULT_PACING: Duration = Duration::from_secs(15);

#[derive(Clone, Builder)]
#[builder(build_fn(error = "crate::errors::Error"))]
pub struct Config {
    /// Funding account key. Surrounding quotes and a `0x` prefix are tolerated.
    #[builder(setter(into))]
    private_key: String,
    #[builder(default = "default_rpc_url()")]
    pub rpc_url: Url,
    /// Amount sent to every new wallet, in ETH.
    #[builder(setter(into), default = "DEFAULT_TRANSFER_AMOUNT.to_owned()")]
    pub transfer_amount: String,
    /// Fee offered per transfer, in ETH.
    #[builder(setter(into), default = "DEFAULT_TRANSFER_FEE.to_owned()")]
    pub transfer_fee: String,
    /// Pause between two transfers.
    #[builder(default = "DEFAULT_PACING")]
    pub pacing: Duration,
    #[builder(default = "Duration::from_secs(1)")]
    pub receipt_poll_interval: Duration,
    #[builder(default = "Duration::from_secs(300)")]
    pub receipt_timeout: Duration,
    /// Directory the wallet CSV is written to.
    #[builder(setter(into), default = "PathBuf::from(\".\")")]
    pub output_dir: PathBuf,
    /// Optional JSON lines file receiving one record per transfer.
    #[builder(setter(into, strip_option), default)]
    pub records_file: Option<PathBuf>,
}

fn default_rpc_url() -> Url {
    Url::parse(DEFAULT_RPC_URL).expect("default rpc url is valid")
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset variables fall back to the defaults above.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConfigBuilder::default();

        let private_key = lookup(PRIVATE_KEY_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Validation(format!("{PRIVATE_KEY_VAR} not set")))?;
        builder.private_key(private_key);

        if let Some(url) = lookup(RPC_URL_VAR) {
            builder.rpc_url(Url::parse(&url)?);
        }
        if let Some(amount) = lookup(TRANSFER_AMOUNT_VAR) {
            builder.transfer_amount(amount);
        }
        if let Some(fee) = lookup(TRANSFER_FEE_VAR) {
            builder.transfer_fee(fee);
        }
        if let Some(secs) = lookup(PACING_SECS_VAR) {
            builder.pacing(Duration::from_secs(parse_number(PACING_SECS_VAR, &secs)?));
        }
        if let Some(ms) = lookup(RECEIPT_POLL_MS_VAR) {
            builder.receipt_poll_interval(Duration::from_millis(parse_number(
                RECEIPT_POLL_MS_VAR,
                &ms,
            )?));
        }
        if let Some(secs) = lookup(RECEIPT_TIMEOUT_SECS_VAR) {
            builder.receipt_timeout(Duration::from_secs(parse_number(
                RECEIPT_TIMEOUT_SECS_VAR,
                &secs,
            )?));
        }
        if let Some(dir) = lookup(OUTPUT_DIR_VAR) {
            builder.output_dir(dir);
        }
        if let Some(file) = lookup(RECORDS_FILE_VAR) {
            builder.records_file(file);
        }

        builder.build()
    }

    /// Signer for the funding account.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        let key = normalize_private_key(&self.private_key);
        Ok(PrivateKeySigner::from_str(&key)?)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("private_key", &"<redacted>")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("transfer_amount", &self.transfer_amount)
            .field("transfer_fee", &self.transfer_fee)
            .field("pacing", &self.pacing)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .field("receipt_timeout", &self.receipt_timeout)
            .field("output_dir", &self.output_dir)
            .field("records_file", &self.records_file)
            .finish()
    }
}

fn normalize_private_key(raw: &str) -> String {
    let key = raw.trim().trim_matches('"').trim_matches('\'');
    key.strip_prefix("0x").unwrap_or(key).to_owned()
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Validation(format!("{name}={value:?} is not a number: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = Config::from_lookup(lookup(&[(PRIVATE_KEY_VAR, KEY)])).unwrap();

        assert_eq!(config.rpc_url.as_str(), DEFAULT_RPC_URL);
        assert_eq!(config.transfer_amount, "0.01");
        assert_eq!(config.transfer_fee, "0.0013");
        assert_eq!(config.pacing, Duration::from_secs(15));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert!(config.records_file.is_none());
    }

    #[test]
    fn missing_private_key_is_rejected() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains(PRIVATE_KEY_VAR)));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            (PRIVATE_KEY_VAR, KEY),
            (RPC_URL_VAR, "http://localhost:3030/jsrpc"),
            (TRANSFER_AMOUNT_VAR, "0.5"),
            (PACING_SECS_VAR, "2"),
            (RECEIPT_POLL_MS_VAR, "250"),
            (RECORDS_FILE_VAR, "transfers.jsonl"),
        ]))
        .unwrap();

        assert_eq!(config.rpc_url.as_str(), "http://localhost:3030/jsrpc");
        assert_eq!(config.transfer_amount, "0.5");
        assert_eq!(config.pacing, Duration::from_secs(2));
        assert_eq!(config.receipt_poll_interval, Duration::from_millis(250));
        assert_eq!(config.records_file, Some(PathBuf::from("transfers.jsonl")));
    }

    #[test]
    fn non_numeric_pacing_is_rejected() {
        let err = Config::from_lookup(lookup(&[(PRIVATE_KEY_VAR, KEY), (PACING_SECS_VAR, "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn quoted_and_prefixed_keys_resolve_to_the_same_signer() {
        let plain = Config::from_lookup(lookup(&[(PRIVATE_KEY_VAR, KEY)]))
            .unwrap()
            .signer()
            .unwrap();
        let quoted = format!("\"0x{KEY}\"");
        let decorated = Config::from_lookup(lookup(&[(PRIVATE_KEY_VAR, quoted.as_str())]))
            .unwrap()
            .signer()
            .unwrap();
        assert_eq!(plain.address(), decorated.address());
    }

    #[test]
    fn debug_output_hides_the_private_key() {
        let config = Config::from_lookup(lookup(&[(PRIVATE_KEY_VAR, KEY)])).unwrap();
        assert!(!format!("{config:?}").contains(KEY));
    }
}
