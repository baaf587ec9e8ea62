mod common;

use std::sync::Arc;

use zksync_fanout::dispatch::{DispatchConfig, Dispatcher};
use zksync_fanout::errors::{Error, Result};
use zksync_fanout::fanout;
use zksync_fanout::pacing::NoDelay;
use zksync_fanout::persist::{CsvKeypairFile, KeypairSink};
use zksync_fanout::record::MemorySink;
use zksync_fanout::wallet::{Keypair, LocalKeyGenerator};
use zksync_fanout::FundingSession;

use crate::common::ScriptedLedger;

struct BrokenDisk;

impl KeypairSink for BrokenDisk {
    fn persist(&mut self, _keypairs: &[Keypair]) -> Result<()> {
        Err(Error::Io(std::io::Error::other("disk full")))
    }
}

fn dispatcher(sink: &MemorySink) -> Dispatcher<NoDelay> {
    Dispatcher::new(DispatchConfig::default(), NoDelay, Arc::new(sink.clone()))
}

#[tokio::test]
async fn three_wallets_are_saved_and_funded() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvKeypairFile::timestamped_in(dir.path());
    let sink = MemorySink::new();
    let mut dispatcher = dispatcher(&sink);
    let mut session = FundingSession::new(ScriptedLedger::with_nonces([5, 6, 7]));

    let outcome = fanout::run(
        &mut session,
        &LocalKeyGenerator,
        &mut store,
        &mut dispatcher,
        3,
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.processed(), 3);
    assert_eq!(outcome.exit_code(), 0);

    let csv = std::fs::read_to_string(store.path()).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "PrivateKey,EthAddress");
    assert_eq!(lines.len(), 4);

    // Every saved address is funded, in file order.
    let sent: Vec<_> = session.ledger().transfers().iter().map(|t| t.to).collect();
    let saved: Vec<_> = outcome.keypairs.iter().map(Keypair::address).collect();
    assert_eq!(sent, saved);
    for (line, keypair) in lines[1..].iter().zip(&outcome.keypairs) {
        assert_eq!(
            *line,
            format!("{},{}", keypair.private_key_hex(), keypair.address())
        );
    }
}

#[tokio::test]
async fn repeated_nonce_stops_after_the_first_wallet() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvKeypairFile::timestamped_in(dir.path());
    let sink = MemorySink::new();
    let mut dispatcher = dispatcher(&sink);
    let mut session = FundingSession::new(ScriptedLedger::with_nonces([5, 5, 6]));

    let outcome = fanout::run(
        &mut session,
        &LocalKeyGenerator,
        &mut store,
        &mut dispatcher,
        3,
    )
    .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.processed(), 1);
    assert_eq!(outcome.exit_code(), 1);
    let err = outcome.result.unwrap_err();
    assert!(matches!(err.cause, Error::DuplicateNonce { nonce: 5, .. }));
    assert_eq!(session.ledger().transfers().len(), 2);

    // All three keys were saved even though only one wallet was funded.
    let csv = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(csv.lines().count(), 4);
}

#[tokio::test]
async fn nothing_is_sent_when_saving_fails() {
    let sink = MemorySink::new();
    let mut dispatcher = dispatcher(&sink);
    let mut session = FundingSession::new(ScriptedLedger::with_nonces([1, 2]).without_signing_key());

    let outcome = fanout::run(
        &mut session,
        &LocalKeyGenerator,
        &mut BrokenDisk,
        &mut dispatcher,
        2,
    )
    .await;

    assert_eq!(outcome.processed(), 0);
    assert_eq!(outcome.exit_code(), 1);
    assert!(matches!(outcome.result, Err(ref e) if matches!(e.cause, Error::Io(_))));
    assert!(session.ledger().transfers().is_empty());
    assert!(session.ledger().registrations().is_empty());
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn zero_wallets_writes_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvKeypairFile::timestamped_in(dir.path());
    let sink = MemorySink::new();
    let mut dispatcher = dispatcher(&sink);
    let mut session = FundingSession::new(ScriptedLedger::with_nonces(Vec::new()));

    let outcome = fanout::run(
        &mut session,
        &LocalKeyGenerator,
        &mut store,
        &mut dispatcher,
        0,
    )
    .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.processed(), 0);
    assert_eq!(
        std::fs::read_to_string(store.path()).unwrap().trim_end(),
        "PrivateKey,EthAddress"
    );
}
