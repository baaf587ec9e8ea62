use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use zksync_fanout::dispatch::{DispatchConfig, Dispatcher};
use zksync_fanout::logging;
use zksync_fanout::pacing::TokioPacer;
use zksync_fanout::persist::CsvKeypairFile;
use zksync_fanout::record::{JsonLinesSink, RecordSink, TracingSink};
use zksync_fanout::rpc::JsonRpcLedger;
use zksync_fanout::wallet::LocalKeyGenerator;
use zksync_fanout::{fanout, Config, FundingSession, DEFAULT_WALLET_COUNT};

/// Generate fresh wallets and fund each one from the account in PRIV_KEY.
#[derive(Debug, Parser)]
#[command(name = "fanout", about, long_about = None)]
struct Cli {
    /// Number of wallets to generate and fund
    #[arg(default_value_t = DEFAULT_WALLET_COUNT)]
    count: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(count = cli.count, rpc_url = %config.rpc_url, "Starting fanout");

    let ledger = JsonRpcLedger::from_config(&config).context("invalid funding key")?;
    let can_submit = ledger.can_submit();
    let mut session = FundingSession::new(ledger);
    session
        .summary()
        .await
        .context("failed to query the funding account")?;
    anyhow::ensure!(
        can_submit,
        "no layer-2 signer is available to authorize transfers; use `keygen` to only generate wallets"
    );

    let sink: Arc<dyn RecordSink> = match &config.records_file {
        Some(path) => Arc::new((
            TracingSink,
            JsonLinesSink::file(path).context("failed to open records file")?,
        )),
        None => Arc::new(TracingSink),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current transfer");
            on_signal.cancel();
        }
    });

    let mut dispatcher = Dispatcher::new(DispatchConfig::from(&config), TokioPacer, sink)
        .with_cancellation(cancel);
    let mut store = CsvKeypairFile::timestamped_in(&config.output_dir);

    let outcome = fanout::run(
        &mut session,
        &LocalKeyGenerator,
        &mut store,
        &mut dispatcher,
        cli.count,
    )
    .await;

    match &outcome.result {
        Ok(report) => tracing::info!(
            confirmed = report.processed(),
            wallets = %store.path().display(),
            "Fanout complete"
        ),
        Err(e) => tracing::error!(
            confirmed = e.processed,
            requested = cli.count,
            wallets = %store.path().display(),
            error = %e.cause,
            "Fanout halted"
        ),
    }

    Ok(outcome.exit_code())
}
