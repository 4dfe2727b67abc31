use crate::context::ArbContext;
use crate::error::{ArbError, Result};
use crate::execution::instruction_assembler::{resolve_lookup_tables, InstructionBundle};
use crate::execution::rpc_ledger::SimulationOutcome;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};

/// Largest serialized transaction the network accepts
pub const PACKET_DATA_SIZE: usize = 1232;

/// How many times one opportunity may be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const SINGLE_ATTEMPT: RetryPolicy = RetryPolicy { max_attempts: 1 };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::SINGLE_ATTEMPT
    }
}

/// What happened to a built flash loan transaction
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Submitted(Signature),
    Simulated(SimulationOutcome),
}

/// Wraps assembled swap instructions in a flash loan and sends them
pub struct FlashLoanTxBuilder {
    trade_principal: u64,
    retry_policy: RetryPolicy,
    simulation_mode: bool,
}

impl FlashLoanTxBuilder {
    pub fn new(trade_principal: u64, retry_policy: RetryPolicy) -> Self {
        Self {
            trade_principal,
            retry_policy,
            simulation_mode: false,
        }
    }

    /// Create a builder in simulation mode (transactions are simulated, never sent)
    pub fn new_simulation_mode(trade_principal: u64, retry_policy: RetryPolicy) -> Self {
        Self {
            simulation_mode: true,
            ..Self::new(trade_principal, retry_policy)
        }
    }

    /// Enable or disable simulation mode
    pub fn set_simulation_mode(&mut self, enabled: bool) {
        self.simulation_mode = enabled;
    }

    /// Check if simulation mode is enabled
    pub fn is_simulation_mode(&self) -> bool {
        self.simulation_mode
    }

    /// Instruction order the transaction must keep:
    /// compute, setup, borrow, swap, repay
    pub fn sequence_instructions(
        bundle: &InstructionBundle,
        borrow: Vec<Instruction>,
        repay: Vec<Instruction>,
    ) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(
            bundle.compute_instructions.len() + bundle.setup_instructions.len() + borrow.len() + repay.len() + 1,
        );
        instructions.extend(bundle.compute_instructions.iter().cloned());
        instructions.extend(bundle.setup_instructions.iter().cloned());
        instructions.extend(borrow);
        instructions.push(bundle.swap_instruction.clone());
        instructions.extend(repay);
        instructions
    }

    /// Build and sign the flash loan transaction for `bundle`
    pub async fn build_transaction(&self, ctx: &ArbContext, bundle: &InstructionBundle) -> Result<VersionedTransaction> {
        let borrow = ctx
            .lending
            .borrow_instructions(self.trade_principal)
            .await
            .map_err(ArbError::execution)?;
        let repay = ctx
            .lending
            .repay_instructions(self.trade_principal, true)
            .await
            .map_err(ArbError::execution)?;

        let instructions = Self::sequence_instructions(bundle, borrow.into_sequenced(), repay);

        let known: Vec<Pubkey> = bundle.address_lookup_table_accounts.iter().map(|t| t.key).collect();
        let remaining: Vec<Pubkey> = ctx
            .lending
            .lookup_table_addresses()
            .into_iter()
            .filter(|address| !known.contains(address))
            .collect();
        let mut lookup_tables = bundle.address_lookup_table_accounts.clone();
        lookup_tables.extend(resolve_lookup_tables(ctx.ledger.as_ref(), &remaining).await?);

        let recent_blockhash = ctx.ledger.latest_blockhash().await.map_err(ArbError::execution)?;

        let message = ctx
            .lending
            .build_flash_loan_message(&ctx.signer_pubkey(), instructions, &lookup_tables, recent_blockhash)
            .map_err(ArbError::execution)?;

        let signers: [&Keypair; 1] = [ctx.signer.as_ref()];
        let transaction = VersionedTransaction::try_new(message, &signers[..])
            .map_err(|e| ArbError::Execution(format!("Failed to sign flash loan transaction: {}", e)))?;

        let size = bincode::serialize(&transaction)
            .map_err(|e| ArbError::Execution(format!("Failed to serialize flash loan transaction: {}", e)))?
            .len();
        if size > PACKET_DATA_SIZE {
            return Err(ArbError::Execution(format!(
                "transaction is {} bytes, limit is {}",
                size, PACKET_DATA_SIZE
            )));
        }

        Ok(transaction)
    }

    /// Build and submit (or simulate) the flash loan, honouring the retry policy.
    /// Each attempt starts from a fresh blockhash.
    pub async fn execute_flash_loan(&self, ctx: &ArbContext, bundle: &InstructionBundle) -> Result<ExecutionOutcome> {
        let max_attempts = self.retry_policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(ctx, bundle).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < max_attempts => {
                    log::warn!("Flash loan attempt {}/{} failed: {}", attempt, max_attempts, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, ctx: &ArbContext, bundle: &InstructionBundle) -> Result<ExecutionOutcome> {
        let transaction = self.build_transaction(ctx, bundle).await?;

        if self.simulation_mode {
            log::info!("🧪 SIMULATION MODE - No transaction will be submitted");
            let outcome = ctx.ledger.simulate(&transaction).await.map_err(ArbError::execution)?;
            if outcome.succeeded() {
                log::info!("✅ Simulation successful ({:?} compute units)", outcome.units_consumed);
            } else {
                log::warn!("❌ Simulation failed: {:?}", outcome.error);
                for line in &outcome.logs {
                    log::warn!("  {}", line);
                }
            }
            return Ok(ExecutionOutcome::Simulated(outcome));
        }

        // preflight is skipped: the ledger's execution result is the only check
        let signature = ctx
            .ledger
            .submit(&transaction, true)
            .await
            .map_err(ArbError::execution)?;

        Ok(ExecutionOutcome::Submitted(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ix(tag: u8) -> Instruction {
        Instruction {
            program_id: Pubkey::new_unique(),
            accounts: vec![],
            data: vec![tag],
        }
    }

    fn tags(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().map(|ix| ix.data[0]).collect()
    }

    #[test]
    fn test_sequence_is_compute_setup_borrow_swap_repay() {
        let bundle = InstructionBundle {
            compute_instructions: vec![ix(1), ix(2)],
            setup_instructions: vec![ix(3)],
            swap_instruction: ix(5),
            address_lookup_table_accounts: vec![],
        };

        let sequenced = FlashLoanTxBuilder::sequence_instructions(&bundle, vec![ix(4)], vec![ix(6), ix(7)]);

        assert_eq!(tags(&sequenced), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_sequence_without_setup() {
        let bundle = InstructionBundle {
            compute_instructions: vec![],
            setup_instructions: vec![],
            swap_instruction: ix(5),
            address_lookup_table_accounts: vec![],
        };

        let sequenced = FlashLoanTxBuilder::sequence_instructions(&bundle, vec![ix(4)], vec![ix(6)]);
        assert_eq!(tags(&sequenced), vec![4, 5, 6]);
    }

    #[test]
    fn test_default_policy_is_single_attempt() {
        assert_eq!(RetryPolicy::default().max_attempts, 1);

        let builder = FlashLoanTxBuilder::new(1_000, RetryPolicy::default());
        assert!(!builder.is_simulation_mode());

        let mut simulated = FlashLoanTxBuilder::new_simulation_mode(1_000, RetryPolicy::default());
        assert!(simulated.is_simulation_mode());
        simulated.set_simulation_mode(false);
        assert!(!simulated.is_simulation_mode());
    }
}
