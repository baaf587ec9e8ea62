//! Fresh wallet generation.

use std::fmt;

use alloy::hex;
use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;

/// A freshly generated private key and the address derived from it.
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    private_key: B256,
    address: Address,
}

impl Keypair {
    pub fn from_signer(signer: &PrivateKeySigner) -> Self {
        Self {
            private_key: signer.to_bytes(),
            address: signer.address(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn private_key(&self) -> &B256 {
        &self.private_key
    }

    /// `0x`-prefixed hex of the private key, the form written to disk.
    pub fn private_key_hex(&self) -> String {
        hex::encode_prefixed(self.private_key)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("private_key", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}

/// Source of independent keypairs.
pub trait KeyGenerator {
    fn generate(&self) -> Keypair;
}

/// Draws keys from the operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalKeyGenerator;

impl KeyGenerator for LocalKeyGenerator {
    fn generate(&self) -> Keypair {
        Keypair::from_signer(&PrivateKeySigner::random())
    }
}

/// Generate `count` keypairs in order.
pub fn generate_batch<G: KeyGenerator + ?Sized>(generator: &G, count: usize) -> Vec<Keypair> {
    (0..count)
        .map(|index| {
            let keypair = generator.generate();
            tracing::debug!(index, address = %keypair.address(), "Generated wallet");
            keypair
        })
        .collect()
}
