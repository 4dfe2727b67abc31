#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use jupiter_flash_arb::context::ArbContext;
use jupiter_flash_arb::execution::jupiter_router::{
    Quote, QuoteRequest, QuoteSource, RawInstruction, RoutePlanStep, SwapInfo, SwapInstructionOptions,
    SwapInstructionSource, SwapInstructionsResponse,
};
use jupiter_flash_arb::execution::rpc_ledger::{Ledger, SimulationOutcome};
use jupiter_flash_arb::flash_loan::lending::{BorrowInstructions, LendingMarket};
use jupiter_flash_arb::flash_loan::opportunity_detector::{MergedQuote, ScanSettings};
use serde_json::Map;
pub use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::{v0, AddressLookupTableAccount, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::VersionedTransaction,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const PRINCIPAL: u64 = 4000 * LAMPORTS_PER_SOL;

pub const COMPUTE_PROGRAM: Pubkey = Pubkey::new_from_array([1; 32]);
pub const SETUP_PROGRAM: Pubkey = Pubkey::new_from_array([2; 32]);
pub const BORROW_PROGRAM: Pubkey = Pubkey::new_from_array([3; 32]);
pub const TRANSFER_PROGRAM: Pubkey = Pubkey::new_from_array([4; 32]);
pub const SWAP_PROGRAM: Pubkey = Pubkey::new_from_array([5; 32]);
pub const REPAY_PROGRAM: Pubkey = Pubkey::new_from_array([6; 32]);

pub fn base_mint() -> Pubkey {
    Pubkey::new_from_array([9; 32])
}

pub fn quote(input: Pubkey, output: Pubkey, in_amount: u64, out_amount: u64, label: &str) -> Quote {
    Quote {
        input_mint: input,
        in_amount,
        output_mint: output,
        out_amount,
        other_amount_threshold: out_amount,
        swap_mode: "ExactIn".to_string(),
        slippage_bps: 0,
        price_impact_pct: "0.001".to_string(),
        route_plan: vec![RoutePlanStep {
            swap_info: SwapInfo {
                amm_key: Pubkey::new_from_array([7; 32]).to_string(),
                label: Some(label.to_string()),
                input_mint: input.to_string(),
                output_mint: output.to_string(),
                in_amount: in_amount.to_string(),
                out_amount: out_amount.to_string(),
                fee_amount: None,
                fee_mint: None,
                extra: Map::new(),
            },
            percent: Some(100),
            extra: Map::new(),
        }],
        context_slot: None,
        time_taken: None,
        extra: Map::new(),
    }
}

/// Quotes a fixed 150 quote units per base unit on the buy leg and a
/// configurable return per quote mint on the sell leg
#[derive(Default)]
pub struct FakeQuotes {
    pub sell_returns: HashMap<Pubkey, u64>,
    pub failing: Vec<Pubkey>,
    pub requests: Mutex<Vec<QuoteRequest>>,
    pub cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeQuotes {
    pub fn with_returns(returns: &[(Pubkey, u64)]) -> Self {
        Self {
            sell_returns: returns.iter().cloned().collect(),
            ..Default::default()
        }
    }

    pub fn cancel_on_call(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((call, token));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl QuoteSource for FakeQuotes {
    async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        // the call that reaches the limit stops the loop and the scan it
        // belongs to finds nothing
        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
                anyhow::bail!("quote feed closed");
            }
        }

        if request.input_mint == base_mint() {
            if self.failing.contains(&request.output_mint) {
                anyhow::bail!("Jupiter API error 400: no route");
            }
            let out = request.amount / 1000 * 150;
            return Ok(quote(request.input_mint, request.output_mint, request.amount, out, "Buy AMM"));
        }

        let out = self
            .sell_returns
            .get(&request.input_mint)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no route"))?;
        Ok(quote(request.input_mint, request.output_mint, request.amount, out, "Sell AMM"))
    }
}

fn raw(program: Pubkey, data: Vec<u8>) -> RawInstruction {
    RawInstruction {
        program_id: program.to_string(),
        accounts: vec![],
        data: BASE64.encode(data),
    }
}

/// Swap instruction payload is the quote mint the merged route passes through
#[derive(Default)]
pub struct FakeSwaps {
    pub merged: Mutex<Vec<MergedQuote>>,
    pub lookup_tables: Vec<Pubkey>,
}

#[async_trait]
impl SwapInstructionSource for FakeSwaps {
    async fn swap_instructions(
        &self,
        _user: &Pubkey,
        quote: &MergedQuote,
        _options: &SwapInstructionOptions,
    ) -> Result<SwapInstructionsResponse> {
        self.merged.lock().unwrap().push(quote.clone());
        let via: Pubkey = quote.route_plan[0].swap_info.output_mint.parse()?;
        Ok(SwapInstructionsResponse {
            token_ledger_instruction: None,
            compute_budget_instructions: vec![raw(COMPUTE_PROGRAM, vec![0])],
            setup_instructions: vec![raw(SETUP_PROGRAM, vec![0])],
            swap_instruction: raw(SWAP_PROGRAM, via.to_bytes().to_vec()),
            cleanup_instruction: None,
            address_lookup_table_addresses: self.lookup_tables.iter().map(|t| t.to_string()).collect(),
        })
    }
}

#[derive(Default)]
pub struct FakeLedger {
    pub tables: HashMap<Pubkey, Vec<Pubkey>>,
    pub submitted: Mutex<Vec<VersionedTransaction>>,
    pub simulated: Mutex<Vec<VersionedTransaction>>,
    pub fail_submissions: bool,
    /// Returned by every simulation when set
    pub simulation_result: Option<SimulationOutcome>,
}

impl FakeLedger {
    pub fn submission_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new_from_array([8; 32]))
    }

    async fn resolve_lookup_table(&self, address: &Pubkey) -> Result<Option<AddressLookupTableAccount>> {
        Ok(self.tables.get(address).map(|addresses| AddressLookupTableAccount {
            key: *address,
            addresses: addresses.clone(),
        }))
    }

    async fn submit(&self, transaction: &VersionedTransaction, skip_preflight: bool) -> Result<Signature> {
        assert!(skip_preflight, "flash loans are sent without preflight");
        self.submitted.lock().unwrap().push(transaction.clone());
        if self.fail_submissions {
            anyhow::bail!("Transaction simulation failed: insufficient funds for repay");
        }
        Ok(transaction.signatures[0])
    }

    async fn simulate(&self, transaction: &VersionedTransaction) -> Result<SimulationOutcome> {
        self.simulated.lock().unwrap().push(transaction.clone());
        Ok(self.simulation_result.clone().unwrap_or_default())
    }
}

/// Borrow set ends with a redundant self-transfer; no flash loan envelope
#[derive(Default)]
pub struct FakeLending {
    pub lookup_tables: Vec<Pubkey>,
}

fn marker(program: Pubkey) -> Instruction {
    Instruction {
        program_id: program,
        accounts: vec![],
        data: vec![0],
    }
}

#[async_trait]
impl LendingMarket for FakeLending {
    async fn borrow_instructions(&self, _amount: u64) -> Result<BorrowInstructions> {
        Ok(BorrowInstructions {
            instructions: vec![marker(BORROW_PROGRAM), marker(TRANSFER_PROGRAM)],
            has_trailing_transfer: true,
        })
    }

    async fn repay_instructions(&self, _amount: u64, repay_all: bool) -> Result<Vec<Instruction>> {
        assert!(repay_all);
        Ok(vec![marker(REPAY_PROGRAM)])
    }

    fn lookup_table_addresses(&self) -> Vec<Pubkey> {
        self.lookup_tables.clone()
    }

    fn build_flash_loan_message(
        &self,
        payer: &Pubkey,
        instructions: Vec<Instruction>,
        lookup_tables: &[AddressLookupTableAccount],
        recent_blockhash: Hash,
    ) -> Result<VersionedMessage> {
        Ok(VersionedMessage::V0(v0::Message::try_compile(
            payer,
            &instructions,
            lookup_tables,
            recent_blockhash,
        )?))
    }
}

pub struct Harness {
    pub ctx: ArbContext,
    pub quotes: Arc<FakeQuotes>,
    pub swaps: Arc<FakeSwaps>,
    pub ledger: Arc<FakeLedger>,
}

pub fn harness(quotes: FakeQuotes, swaps: FakeSwaps, ledger: FakeLedger, lending: FakeLending) -> Harness {
    let quotes = Arc::new(quotes);
    let swaps = Arc::new(swaps);
    let ledger = Arc::new(ledger);
    let ctx = ArbContext {
        signer: Arc::new(Keypair::new()),
        quotes: quotes.clone(),
        swaps: swaps.clone(),
        ledger: ledger.clone(),
        lending: Arc::new(lending),
    };
    Harness {
        ctx,
        quotes,
        swaps,
        ledger,
    }
}

pub fn scan_settings(quote_mints: Vec<Pubkey>) -> ScanSettings {
    ScanSettings {
        base_mint: base_mint(),
        quote_mints,
        trade_principal: PRINCIPAL,
        buy_slippage_bps: 50,
        sell_slippage_bps: 0,
        excluded_dexes: vec!["Obric V2".to_string()],
        swap_options: SwapInstructionOptions::default(),
    }
}

/// Program ids of a compiled transaction, in execution order
pub fn program_order(transaction: &VersionedTransaction) -> Vec<Pubkey> {
    let keys = transaction.message.static_account_keys();
    transaction
        .message
        .instructions()
        .iter()
        .map(|ix| keys[ix.program_id_index as usize])
        .collect()
}

/// Payload of the swap instruction in a compiled transaction
pub fn swap_payload(transaction: &VersionedTransaction) -> Vec<u8> {
    let keys = transaction.message.static_account_keys();
    transaction
        .message
        .instructions()
        .iter()
        .find(|ix| keys[ix.program_id_index as usize] == SWAP_PROGRAM)
        .map(|ix| ix.data.clone())
        .unwrap_or_default()
}
