//! Compiles an instruction list into an unsigned v0 transaction
//!
//! A fresh anchor is fetched for every call; instruction order is preserved
//! exactly as received.

use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    message::{v0::Message as MessageV0, VersionedMessage},
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;
use tracing::debug;

use crate::errors::TransferError;
use crate::rpc_manager::NetworkClient;
use crate::types::{RecencyAnchor, TransactionEnvelope};

pub struct TransactionAssembler {
    network: Arc<dyn NetworkClient>,
    commitment: CommitmentConfig,
}

impl TransactionAssembler {
    pub fn new(network: Arc<dyn NetworkClient>, commitment: CommitmentConfig) -> Self {
        Self {
            network,
            commitment,
        }
    }

    /// Fetch a fresh anchor and compile `instructions` against it
    pub async fn assemble(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
    ) -> Result<TransactionEnvelope, TransferError> {
        let anchor = self.network.get_latest_anchor(self.commitment).await?;
        debug!(
            blockhash = %anchor.blockhash,
            last_valid_block_height = anchor.last_valid_block_height,
            "Fetched recency anchor"
        );
        compile_with_anchor(instructions, payer, anchor)
    }
}

/// Compile into a v0 message with placeholder signatures for every required signer
///
/// # Errors
///
/// [`TransferError::Validation`] when the signed transaction would not fit in
/// one packet; retrying the same batch cannot help.
pub fn compile_with_anchor(
    instructions: &[Instruction],
    payer: &Pubkey,
    anchor: RecencyAnchor,
) -> Result<TransactionEnvelope, TransferError> {
    let message = MessageV0::try_compile(payer, instructions, &[], anchor.blockhash)
        .map_err(|e| TransferError::Build(format!("Failed to compile message: {}", e)))?;

    let message = VersionedMessage::V0(message);
    let required = message.header().num_required_signatures as usize;

    let size = serialized_len(&message, required);
    if size > PACKET_DATA_SIZE {
        return Err(TransferError::Validation(format!(
            "transaction of {} instructions is {} bytes, over the {}-byte packet limit",
            instructions.len(),
            size,
            PACKET_DATA_SIZE
        )));
    }

    Ok(TransactionEnvelope {
        transaction: VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message,
        },
        anchor,
        instruction_count: instructions.len(),
    })
}

/// Wire size of the transaction once `signatures` signatures are attached
pub fn serialized_len(message: &VersionedMessage, signatures: usize) -> usize {
    short_vec_len(signatures) + signatures * 64 + message.serialize().len()
}

fn short_vec_len(len: usize) -> usize {
    match len {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        _ => 3,
    }
}
