//! Instruction planning and ordering validation
//!
//! Builds the ordered instruction list for one batch:
//! 1. Per recipient, in input order:
//!    - (token path) create the recipient's associated token account if missing
//!    - the transfer itself
//! 2. The commission transfer to the fee destination, always last
//!
//! A batch is all-or-nothing at build time: one unparseable recipient aborts
//! the whole build before any network query is made.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction, system_program};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id,
    instruction::create_associated_token_account_idempotent,
};
use std::sync::Arc;
use tracing::debug;

use crate::address::parse_address;
use crate::config::{FeeConfig, ResolvedFee};
use crate::errors::TransferError;
use crate::rpc_manager::NetworkClient;
use crate::tx_builder::amount::{DecimalAmount, NATIVE_DECIMALS};

/// Plan of instructions for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPlan {
    /// The ordered list of instructions for the transaction
    pub instructions: Vec<Instruction>,

    /// Amount each recipient receives, in base units
    pub units_per_recipient: u64,

    /// Number of associated token accounts created by this plan
    pub accounts_created: usize,
}

/// Builds batch instructions against live account state
pub struct InstructionBuilder {
    network: Arc<dyn NetworkClient>,
    fee: FeeConfig,
}

impl InstructionBuilder {
    pub fn new(network: Arc<dyn NetworkClient>, fee: FeeConfig) -> Self {
        Self { network, fee }
    }

    /// Build the instruction list for `recipients`.
    ///
    /// # Errors
    ///
    /// - [`TransferError::FatalConfig`] when the fee destination or amount is invalid
    /// - [`TransferError::Validation`] naming the first unparseable recipient, or
    ///   when the amount cannot be expressed in the asset's base units
    /// - [`TransferError::Rpc`] when a read-only query fails
    pub async fn build_instructions(
        &self,
        recipients: &[String],
        amount: &DecimalAmount,
        payer: &Pubkey,
        asset: Option<&Pubkey>,
    ) -> Result<InstructionPlan, TransferError> {
        let fee = self.fee.resolve()?;

        let recipients = recipients
            .iter()
            .map(|r| parse_address(r))
            .collect::<Result<Vec<_>, _>>()?;

        let mut plan = match asset {
            None => native_plan(&recipients, amount, payer)?,
            Some(mint) => self.token_plan(&recipients, amount, payer, mint).await?,
        };

        plan.instructions.push(fee_instruction(payer, &fee));
        sanity_check_ix_order(&plan.instructions, payer, &fee)?;

        debug!(
            recipients = recipients.len(),
            instructions = plan.instructions.len(),
            accounts_created = plan.accounts_created,
            units_per_recipient = plan.units_per_recipient,
            "Batch instructions built"
        );

        Ok(plan)
    }

    async fn token_plan(
        &self,
        recipients: &[Pubkey],
        amount: &DecimalAmount,
        payer: &Pubkey,
        mint: &Pubkey,
    ) -> Result<InstructionPlan, TransferError> {
        // One decimals lookup per batch
        let decimals = self.network.get_asset_decimals(mint).await?;
        let units = amount.to_minimal_units(decimals)?;

        let token_program = spl_token::id();
        let source = get_associated_token_address_with_program_id(payer, mint, &token_program);

        // Worst case: create + transfer per recipient, plus the fee
        let mut instructions = Vec::with_capacity(recipients.len() * 2 + 1);
        let mut accounts_created = 0;

        for recipient in recipients {
            let destination =
                get_associated_token_address_with_program_id(recipient, mint, &token_program);

            if self.network.get_account_info(&destination).await?.is_none() {
                instructions.push(create_associated_token_account_idempotent(
                    payer,
                    recipient,
                    mint,
                    &token_program,
                ));
                accounts_created += 1;
            }

            let transfer = spl_token::instruction::transfer_checked(
                &token_program,
                &source,
                mint,
                &destination,
                payer,
                &[],
                units,
                decimals,
            )
            .map_err(|e| {
                TransferError::Build(format!(
                    "token transfer to {} could not be built: {}",
                    recipient, e
                ))
            })?;
            instructions.push(transfer);
        }

        Ok(InstructionPlan {
            instructions,
            units_per_recipient: units,
            accounts_created,
        })
    }
}

fn native_plan(
    recipients: &[Pubkey],
    amount: &DecimalAmount,
    payer: &Pubkey,
) -> Result<InstructionPlan, TransferError> {
    let lamports = amount.to_minimal_units(NATIVE_DECIMALS)?;

    let mut instructions = Vec::with_capacity(recipients.len() + 1);
    for recipient in recipients {
        #[allow(deprecated)]
        instructions.push(system_instruction::transfer(payer, recipient, lamports));
    }

    Ok(InstructionPlan {
        instructions,
        units_per_recipient: lamports,
        accounts_created: 0,
    })
}

fn fee_instruction(payer: &Pubkey, fee: &ResolvedFee) -> Instruction {
    #[allow(deprecated)]
    system_instruction::transfer(payer, &fee.destination, fee.lamports)
}

/// Validate that the commission transfer closes the instruction list (debug/test only)
///
/// # Errors
///
/// Returns `TransferError::Build` if the list is empty or the last
/// instruction is not the fee transfer.
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(
    instructions: &[Instruction],
    payer: &Pubkey,
    fee: &ResolvedFee,
) -> Result<(), TransferError> {
    let Some(last) = instructions.last() else {
        return Err(TransferError::Build("Instruction list is empty".to_string()));
    };

    if last.program_id != system_program::id() || *last != fee_instruction(payer, fee) {
        return Err(TransferError::Build(format!(
            "Fee transfer must be the last instruction, got program_id: {}",
            last.program_id
        )));
    }

    if instructions.len() < 2 {
        return Err(TransferError::Build(
            "Batch has no recipient instructions".to_string(),
        ));
    }

    Ok(())
}

/// No-op version of sanity_check_ix_order for release builds
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(
    _instructions: &[Instruction],
    _payer: &Pubkey,
    _fee: &ResolvedFee,
) -> Result<(), TransferError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockNetwork;

    fn fee_config() -> FeeConfig {
        FeeConfig {
            destination: Pubkey::new_from_array([200; 32]).to_string(),
            amount: "0.001".to_string(),
        }
    }

    fn recipients(n: u8) -> Vec<String> {
        (1..=n)
            .map(|i| Pubkey::new_from_array([i; 32]).to_string())
            .collect()
    }

    fn builder(network: Arc<MockNetwork>) -> InstructionBuilder {
        InstructionBuilder::new(network, fee_config())
    }

    #[tokio::test]
    async fn test_native_plan_orders_fee_last() {
        let network = Arc::new(MockNetwork::new());
        let payer = Pubkey::new_unique();
        let amount: DecimalAmount = "0.5".parse().unwrap();

        let plan = builder(network.clone())
            .build_instructions(&recipients(3), &amount, &payer, None)
            .await
            .unwrap();

        assert_eq!(plan.instructions.len(), 4);
        assert_eq!(plan.units_per_recipient, 500_000_000);
        for ix in &plan.instructions {
            assert_eq!(ix.program_id, system_program::id());
        }
        let fee = fee_config().resolve().unwrap();
        assert_eq!(plan.instructions[3], fee_instruction(&payer, &fee));
        assert_eq!(network.decimals_calls(), 0);
    }

    #[tokio::test]
    async fn test_token_plan_creates_missing_accounts() {
        let network = Arc::new(MockNetwork::new());
        let mint = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        network.set_decimals(6);

        let recipients = recipients(3);
        // Second recipient already holds an account
        let existing = Pubkey::new_from_array([2; 32]);
        network.add_account(get_associated_token_address_with_program_id(
            &existing,
            &mint,
            &spl_token::id(),
        ));

        let amount: DecimalAmount = "1.5".parse().unwrap();
        let plan = builder(network.clone())
            .build_instructions(&recipients, &amount, &payer, Some(&mint))
            .await
            .unwrap();

        // create, transfer, transfer, create, transfer, fee
        assert_eq!(plan.instructions.len(), 6);
        assert_eq!(plan.accounts_created, 2);
        assert_eq!(plan.units_per_recipient, 1_500_000);
        assert_eq!(plan.instructions[0].program_id, spl_associated_token_account::id());
        assert_eq!(plan.instructions[1].program_id, spl_token::id());
        assert_eq!(plan.instructions[2].program_id, spl_token::id());
        assert_eq!(plan.instructions[3].program_id, spl_associated_token_account::id());
        assert_eq!(plan.instructions[4].program_id, spl_token::id());
        assert_eq!(plan.instructions[5].program_id, system_program::id());

        // Decimals resolved once per batch
        assert_eq!(network.decimals_calls(), 1);
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let network = Arc::new(MockNetwork::new());
        network.set_decimals(9);
        let mint = Pubkey::new_unique();
        let payer = Pubkey::new_unique();
        let amount: DecimalAmount = "2".parse().unwrap();
        let builder = builder(network);

        let first = builder
            .build_instructions(&recipients(5), &amount, &payer, Some(&mint))
            .await
            .unwrap();
        let second = builder
            .build_instructions(&recipients(5), &amount, &payer, Some(&mint))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_bad_recipient_aborts_batch() {
        let network = Arc::new(MockNetwork::new());
        let mut list = recipients(2);
        list.insert(1, "definitely-not-base58!".to_string());
        let amount: DecimalAmount = "1".parse().unwrap();

        let err = builder(network.clone())
            .build_instructions(&list, &amount, &Pubkey::new_unique(), Some(&Pubkey::new_unique()))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Validation(_)));
        assert!(err.to_string().contains("definitely-not-base58!"));
        // No network activity for a rejected batch
        assert_eq!(network.decimals_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_fee_is_fatal() {
        let network = Arc::new(MockNetwork::new());
        let builder = InstructionBuilder::new(
            network,
            FeeConfig {
                destination: Pubkey::new_unique().to_string(),
                amount: "-1".to_string(),
            },
        );
        let amount: DecimalAmount = "1".parse().unwrap();
        let err = builder
            .build_instructions(&recipients(1), &amount, &Pubkey::new_unique(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::FatalConfig(_)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_sanity_check_rejects_misplaced_fee() {
        let payer = Pubkey::new_unique();
        let fee = fee_config().resolve().unwrap();
        #[allow(deprecated)]
        let transfer = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);

        let ordered = vec![transfer.clone(), fee_instruction(&payer, &fee)];
        assert!(sanity_check_ix_order(&ordered, &payer, &fee).is_ok());

        let misplaced = vec![fee_instruction(&payer, &fee), transfer];
        assert!(sanity_check_ix_order(&misplaced, &payer, &fee).is_err());

        assert!(sanity_check_ix_order(&[], &payer, &fee).is_err());
        assert!(sanity_check_ix_order(&[fee_instruction(&payer, &fee)], &payer, &fee).is_err());
    }
}
