use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{AddressLookupTableAccount, VersionedMessage},
    pubkey::Pubkey,
};

/// Borrow instructions as produced by a lending market
#[derive(Debug, Clone, PartialEq)]
pub struct BorrowInstructions {
    pub instructions: Vec<Instruction>,
    /// Set when the last instruction is a self-transfer that is redundant
    /// once borrow and swap are sequenced by hand
    pub has_trailing_transfer: bool,
}

impl BorrowInstructions {
    /// Instructions to place between setup and swap
    pub fn into_sequenced(mut self) -> Vec<Instruction> {
        if self.has_trailing_transfer {
            self.instructions.pop();
        }
        self.instructions
    }
}

/// Lending capability backing the flash loan
///
/// One implementation serves one asset (bank) for the lifetime of the process.
#[async_trait]
pub trait LendingMarket: Send + Sync {
    async fn borrow_instructions(&self, amount: u64) -> Result<BorrowInstructions>;

    async fn repay_instructions(&self, amount: u64, repay_all: bool) -> Result<Vec<Instruction>>;

    /// Lookup tables the market's own instructions compress against
    fn lookup_table_addresses(&self) -> Vec<Pubkey>;

    /// Wrap `instructions` in the market's flash loan envelope and compile
    /// an unsigned message paid by `payer`
    fn build_flash_loan_message(
        &self,
        payer: &Pubkey,
        instructions: Vec<Instruction>,
        lookup_tables: &[AddressLookupTableAccount],
        recent_blockhash: Hash,
    ) -> Result<VersionedMessage>;
}
