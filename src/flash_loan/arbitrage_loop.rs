/// Scan / execute / cool down control loop
///
/// At most one trade is in flight at any time. Each scan executes only the
/// first profitable opportunity; the rest are dropped.

use crate::context::ArbContext;
use crate::error::{ArbError, Result};
use crate::execution::instruction_assembler::InstructionAssembler;
use crate::flash_loan::opportunity_detector::{Opportunity, OpportunityDetector};
use crate::flash_loan::transaction_builder::{ExecutionOutcome, FlashLoanTxBuilder};
use chrono::Utc;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Scanning,
    CooldownAfterTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// Pause between scans that did not trade
    pub scan_delay: Duration,
    /// Pause after a submitted or failed trade
    pub cooldown: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            scan_delay: Duration::from_millis(200),
            cooldown: Duration::from_secs(60 * 60 * 24),
        }
    }
}

/// Result of one scan iteration
#[derive(Debug)]
pub enum ScanOutcome {
    NoOpportunity,
    Traded { quote_token: Pubkey, signature: Signature },
    Simulated { quote_token: Pubkey },
    Failed { quote_token: Pubkey, error: ArbError },
}

impl ScanOutcome {
    pub fn next_state(&self) -> LoopState {
        match self {
            ScanOutcome::Traded { .. } | ScanOutcome::Failed { .. } => LoopState::CooldownAfterTrade,
            ScanOutcome::NoOpportunity | ScanOutcome::Simulated { .. } => LoopState::Scanning,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub scans: u64,
    pub trades: u64,
    pub failures: u64,
}

pub struct ArbitrageLoop {
    ctx: ArbContext,
    detector: OpportunityDetector,
    builder: FlashLoanTxBuilder,
    timing: LoopTiming,
}

impl ArbitrageLoop {
    pub fn new(ctx: ArbContext, detector: OpportunityDetector, builder: FlashLoanTxBuilder, timing: LoopTiming) -> Self {
        Self {
            ctx,
            detector,
            builder,
            timing,
        }
    }

    pub fn delay_for(&self, state: LoopState) -> Duration {
        match state {
            LoopState::Scanning => self.timing.scan_delay,
            LoopState::CooldownAfterTrade => self.timing.cooldown,
        }
    }

    /// Scan every quote asset and execute the first opportunity found
    pub async fn scan_once(&self) -> ScanOutcome {
        let opportunities = self.detector.find_opportunities(&self.ctx).await;
        let total = opportunities.len();

        let Some(opportunity) = opportunities.into_iter().next() else {
            return ScanOutcome::NoOpportunity;
        };
        if total > 1 {
            log::debug!("Executing first of {} opportunities, discarding the rest", total);
        }
        log::info!(
            "Executing {} opportunity detected {}ms ago",
            opportunity.quote_token,
            (Utc::now() - opportunity.detected_at).num_milliseconds()
        );

        match self.execute_arbitrage(&opportunity).await {
            Ok(ExecutionOutcome::Submitted(signature)) => {
                log::info!("Flash loan submitted: {}", signature);
                ScanOutcome::Traded {
                    quote_token: opportunity.quote_token,
                    signature,
                }
            }
            Ok(ExecutionOutcome::Simulated(_)) => ScanOutcome::Simulated {
                quote_token: opportunity.quote_token,
            },
            Err(error) => {
                log::error!("Arbitrage execution failed: {}", error);
                ScanOutcome::Failed {
                    quote_token: opportunity.quote_token,
                    error,
                }
            }
        }
    }

    /// Assemble the opportunity's instructions and run them inside a flash loan
    pub async fn execute_arbitrage(&self, opportunity: &Opportunity) -> Result<ExecutionOutcome> {
        let assembler = InstructionAssembler::new(self.ctx.ledger.clone());
        let bundle = assembler.assemble(&opportunity.swap_instructions).await?;
        self.builder.execute_flash_loan(&self.ctx, &bundle).await
    }

    /// Run until `cancel` fires. Sleeps are interrupted by cancellation; a
    /// scan or execution already under way runs to completion first.
    pub async fn run(&self, cancel: CancellationToken) -> LoopSummary {
        let mut summary = LoopSummary::default();

        while !cancel.is_cancelled() {
            let outcome = self.scan_once().await;
            summary.scans += 1;
            match &outcome {
                ScanOutcome::Traded { .. } => summary.trades += 1,
                ScanOutcome::Failed { .. } => summary.failures += 1,
                _ => {}
            }

            let state = outcome.next_state();
            let delay = self.delay_for(state);
            if state == LoopState::CooldownAfterTrade {
                log::info!("Cooling down for {:?} after trade attempt", delay);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        log::info!(
            "Arbitrage loop stopped after {} scans ({} trades, {} failures)",
            summary.scans,
            summary.trades,
            summary.failures
        );
        summary
    }
}
