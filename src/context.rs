use crate::execution::{Ledger, QuoteSource, SwapInstructionSource};
use crate::flash_loan::lending::LendingMarket;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::sync::Arc;

/// Signer and collaborator handles shared by every component call
#[derive(Clone)]
pub struct ArbContext {
    pub signer: Arc<Keypair>,
    pub quotes: Arc<dyn QuoteSource>,
    pub swaps: Arc<dyn SwapInstructionSource>,
    pub ledger: Arc<dyn Ledger>,
    pub lending: Arc<dyn LendingMarket>,
}

impl ArbContext {
    pub fn signer_pubkey(&self) -> Pubkey {
        self.signer.pubkey()
    }
}
