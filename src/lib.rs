//! Jupiter Flash Arb - round-trip arbitrage inside a flash loan
//!
//! Scans the Jupiter aggregator for base -> quote -> base round trips that
//! return more than they cost, merges both legs into one swap, and executes
//! it between a marginfi borrow and repay in a single transaction. If the
//! swap does not return enough to repay, the whole transaction fails.
//!
//! # Example Usage
//!
//! ```no_run
//! use jupiter_flash_arb::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run(ctx: ArbContext, settings: ScanSettings) {
//!     let evaluator = ProfitEvaluator::new(9, rust_decimal::Decimal::new(1, 1));
//!     let builder = FlashLoanTxBuilder::new(settings.trade_principal, RetryPolicy::default());
//!     let detector = OpportunityDetector::new(settings, evaluator);
//!     let arb = ArbitrageLoop::new(ctx, detector, builder, LoopTiming::default());
//!     arb.run(CancellationToken::new()).await;
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod flash_loan;

pub use context::ArbContext;
pub use error::{ArbError, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::ArbContext;
    pub use crate::error::{ArbError, Result};
    pub use crate::execution::{
        InstructionAssembler, InstructionBundle, JupiterRouter, Ledger, Quote, QuoteRequest, QuoteSource,
        RpcLedger, SwapInstructionOptions, SwapInstructionSource,
    };
    pub use crate::flash_loan::{
        merge_routes, ArbitrageLoop, FlashLoanTxBuilder, LendingMarket, LoopTiming, MarginfiLending,
        MergedQuote, OpportunityDetector, ProfitEvaluator, RetryPolicy, ScanSettings,
    };
}
