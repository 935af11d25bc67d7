//! Transaction building for one batch
//!
//! The builder is split into focused modules:
//! - **amount**: exact decimal parsing and base-unit conversion
//! - **instructions**: recipient transfers, conditional token-account creation
//!   and the trailing fee transfer
//! - **assembler**: anchor fetch and v0 message compilation
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use multisend::tx_builder::{InstructionBuilder, TransactionAssembler};
//! # use multisend::errors::TransferError;
//! # async fn example(
//! #     builder: InstructionBuilder,
//! #     assembler: TransactionAssembler,
//! #     recipients: Vec<String>,
//! #     payer: solana_sdk::pubkey::Pubkey,
//! # ) -> Result<(), TransferError> {
//! let amount = "0.25".parse()?;
//! let plan = builder.build_instructions(&recipients, &amount, &payer, None).await?;
//! let envelope = assembler.assemble(&plan.instructions, &payer).await?;
//! // envelope.transaction is ready for the signer
//! # Ok(())
//! # }
//! ```

pub mod amount;
pub mod assembler;
pub mod instructions;

pub use amount::{DecimalAmount, NATIVE_DECIMALS};
pub use assembler::{compile_with_anchor, TransactionAssembler};
pub use instructions::{sanity_check_ix_order, InstructionBuilder, InstructionPlan};
