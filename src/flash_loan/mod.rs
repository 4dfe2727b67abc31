/// Flash loan arbitrage engine
///
/// - Detecting round-trip opportunities through the aggregator
/// - Building and submitting flash loan transactions
/// - Driving the scan / execute / cool down loop

pub mod arbitrage_loop;
pub mod lending;
pub mod marginfi;
pub mod opportunity_detector;
pub mod transaction_builder;

pub use arbitrage_loop::{ArbitrageLoop, LoopState, LoopSummary, LoopTiming, ScanOutcome};
pub use lending::{BorrowInstructions, LendingMarket};
pub use marginfi::{MarginfiConfig, MarginfiLending};
pub use opportunity_detector::{
    merge_routes, MergedQuote, Opportunity, OpportunityDetector, ProfitEvaluator, ScanSettings,
};
pub use transaction_builder::{ExecutionOutcome, FlashLoanTxBuilder, RetryPolicy};
