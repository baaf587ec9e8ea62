use anyhow::Context;
use clap::Parser;
use zksync_fanout::logging;
use zksync_fanout::persist::{CsvKeypairFile, KeypairSink};
use zksync_fanout::wallet::{generate_batch, LocalKeyGenerator};
use zksync_fanout::DEFAULT_WALLET_COUNT;

/// Generate fresh wallets and save them without funding.
#[derive(Debug, Parser)]
#[command(name = "keygen", about, long_about = None)]
struct Cli {
    /// Number of wallets to generate
    #[arg(default_value_t = DEFAULT_WALLET_COUNT)]
    count: usize,

    /// Directory the CSV is written to
    #[arg(long, default_value = ".")]
    output_dir: std::path::PathBuf,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    println!("\nGenerating {} fresh wallets...\n", cli.count);

    let keypairs = generate_batch(&LocalKeyGenerator, cli.count);
    for (i, keypair) in keypairs.iter().enumerate() {
        println!("--- Wallet #{} ---", i + 1);
        println!("Address:     {}", keypair.address());
        println!();
    }

    let mut store = CsvKeypairFile::timestamped_in(&cli.output_dir);
    store
        .persist(&keypairs)
        .with_context(|| format!("failed to write {}", store.path().display()))?;

    println!("Private keys saved to {}", store.path().display());
    Ok(())
}
