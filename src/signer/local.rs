//! Keypair-file signer provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    transaction::VersionedTransaction,
};
use std::path::PathBuf;
use std::sync::Arc;

use super::{SignerFailure, SignerProvider};

/// Signs with a local keypair, used by the command-line entry point
pub struct KeypairSigner {
    keypair: Arc<Keypair>,
}

impl KeypairSigner {
    /// Load a keypair file (JSON byte array as written by `solana-keygen`, or raw 64 bytes)
    pub fn from_file(path: &str) -> Result<Self> {
        let path = expand_home(path);
        let keypair_bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read keypair file: {}", path.display()))?;

        let keypair = if keypair_bytes.len() == 64 {
            if keypair_bytes.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(keypair_bytes.as_slice()).context("Invalid keypair bytes")?
        } else {
            let json: Vec<u8> = serde_json::from_slice(&keypair_bytes)
                .context("Failed to parse keypair JSON")?;
            if json.len() != 64 {
                anyhow::bail!("Invalid keypair length: expected 64 bytes, got {}", json.len());
            }
            if json.iter().all(|&b| b == 0) {
                anyhow::bail!("Invalid keypair: all-zero key rejected");
            }
            Keypair::try_from(json.as_slice()).context("Invalid keypair from JSON")?
        };

        Ok(Self::from_keypair(keypair))
    }

    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[async_trait]
impl SignerProvider for KeypairSigner {
    fn name(&self) -> &str {
        "keypair"
    }

    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn is_connected(&self) -> bool {
        true
    }

    fn supports_batch_sign(&self) -> bool {
        true
    }

    async fn sign_all(
        &self,
        transactions: Vec<VersionedTransaction>,
    ) -> Result<Vec<VersionedTransaction>, SignerFailure> {
        transactions
            .into_iter()
            .map(|tx| {
                VersionedTransaction::try_new(tx.message, &[self.keypair.as_ref()])
                    .map_err(|e| SignerFailure::Other(e.to_string()))
            })
            .collect()
    }
}
