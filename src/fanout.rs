//! End-to-end run: generate wallets, save them, fund them.

use alloy::primitives::Address;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::errors::DispatchError;
use crate::ledger::LedgerSession;
use crate::pacing::Pacer;
use crate::persist::KeypairSink;
use crate::session::FundingSession;
use crate::wallet::{generate_batch, KeyGenerator, Keypair};

#[derive(Debug)]
pub struct FanoutOutcome {
    pub keypairs: Vec<Keypair>,
    pub result: Result<DispatchReport, DispatchError>,
}

impl FanoutOutcome {
    pub fn processed(&self) -> usize {
        match &self.result {
            Ok(report) => report.processed(),
            Err(e) => e.processed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Process exit status: 0 when every wallet was funded, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Generate `count` wallets, persist them, then fund each one in order.
///
/// Nothing is sent unless persisting succeeded. Persistence failures are returned as a
/// dispatch error with zero transfers processed.
pub async fn run<L, G, K, P>(
    session: &mut FundingSession<L>,
    generator: &G,
    store: &mut K,
    dispatcher: &mut Dispatcher<P>,
    count: usize,
) -> FanoutOutcome
where
    L: LedgerSession,
    G: KeyGenerator + ?Sized,
    K: KeypairSink + ?Sized,
    P: Pacer,
{
    let keypairs = generate_batch(generator, count);

    if let Err(e) = store.persist(&keypairs) {
        tracing::error!(error = %e, "Failed to save wallets, nothing was sent");
        return FanoutOutcome {
            keypairs,
            result: Err(DispatchError::new(0, e)),
        };
    }

    let destinations: Vec<Address> = keypairs.iter().map(Keypair::address).collect();
    let result = dispatcher.run(session, &destinations).await;
    FanoutOutcome { keypairs, result }
}
