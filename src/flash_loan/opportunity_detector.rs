use crate::context::ArbContext;
use crate::error::{ArbError, Result};
use crate::execution::jupiter_router::{Quote, QuoteRequest, SwapInstructionOptions, SwapInstructionsResponse};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::ops::Deref;

/// Round trip quote sent to the instruction builder
///
/// Its amounts are the loan repayment target, not market output: the swap
/// must return at least the trade principal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MergedQuote(Quote);

impl Deref for MergedQuote {
    type Target = Quote;

    fn deref(&self) -> &Quote {
        &self.0
    }
}

/// Merge the buy leg (base -> quote) and sell leg (quote -> base) into one
/// quote that closes back to the base asset.
///
/// Assumes both legs route through the same quote asset.
pub fn merge_routes(buy: &Quote, sell: &Quote, trade_principal: u64) -> MergedQuote {
    let mut merged = buy.clone();
    merged.output_mint = sell.output_mint;
    merged.out_amount = trade_principal;
    merged.other_amount_threshold = trade_principal;
    merged.price_impact_pct = "0".to_string();
    merged.route_plan.extend(sell.route_plan.iter().cloned());
    MergedQuote(merged)
}

/// Decides whether a round trip clears the minimum profit
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitEvaluator {
    base_decimals: u32,
    min_profit: Decimal,
}

impl ProfitEvaluator {
    pub fn new(base_decimals: u32, min_profit: Decimal) -> Self {
        Self {
            base_decimals,
            min_profit,
        }
    }

    /// Profit in display units of the base asset. Excludes network and
    /// lending fees.
    pub fn profit(&self, spent: u64, received: u64) -> Result<Decimal> {
        let delta = i128::from(received) - i128::from(spent);
        Decimal::try_from_i128_with_scale(delta, self.base_decimals)
            .map_err(|e| ArbError::InvalidAmount(format!("profit of {} smallest units: {}", delta, e)))
    }

    /// `Some(profit)` only when profit strictly exceeds the threshold
    pub fn evaluate(&self, buy: &Quote, sell: &Quote) -> Result<Option<Decimal>> {
        let profit = self.profit(buy.in_amount, sell.out_amount)?;
        Ok((profit > self.min_profit).then_some(profit))
    }
}

/// A profitable round trip found during one scan
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub base_token: Pubkey,
    pub quote_token: Pubkey,
    /// Fee-exclusive estimate in display units of the base asset
    pub profit: Decimal,
    pub route: String,
    pub swap_instructions: SwapInstructionsResponse,
    pub detected_at: DateTime<Utc>,
}

/// Static parameters of every scan
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub base_mint: Pubkey,
    pub quote_mints: Vec<Pubkey>,
    pub trade_principal: u64,
    pub buy_slippage_bps: u16,
    pub sell_slippage_bps: u16,
    pub excluded_dexes: Vec<String>,
    pub swap_options: SwapInstructionOptions,
}

/// Prices round trips through each quote asset
pub struct OpportunityDetector {
    settings: ScanSettings,
    evaluator: ProfitEvaluator,
}

impl OpportunityDetector {
    pub fn new(settings: ScanSettings, evaluator: ProfitEvaluator) -> Self {
        Self { settings, evaluator }
    }

    /// Check every quote asset in order. A failing asset is logged and
    /// skipped; it never aborts the scan.
    pub async fn find_opportunities(&self, ctx: &ArbContext) -> Vec<Opportunity> {
        let mut opportunities = Vec::new();

        for quote_mint in &self.settings.quote_mints {
            match self.check_pair(ctx, quote_mint).await {
                Ok(Some(opportunity)) => opportunities.push(opportunity),
                Ok(None) => {}
                Err(e) => log::warn!("Error checking route for {}: {}", quote_mint, e),
            }
        }

        opportunities
    }

    /// Price base -> quote -> base and, when profitable, request the swap
    /// instructions for the merged route
    pub async fn check_pair(&self, ctx: &ArbContext, quote_mint: &Pubkey) -> Result<Option<Opportunity>> {
        let base_mint = self.settings.base_mint;

        let buy_request = QuoteRequest {
            input_mint: base_mint,
            output_mint: *quote_mint,
            amount: self.settings.trade_principal,
            slippage_bps: self.settings.buy_slippage_bps,
            excluded_dexes: self.settings.excluded_dexes.clone(),
            only_direct_routes: false,
        };
        let buy = ctx
            .quotes
            .quote(&buy_request)
            .await
            .map_err(|e| ArbError::quote_unavailable(base_mint, *quote_mint, e))?;

        if buy.out_amount == 0 {
            return Err(ArbError::QuoteUnavailable {
                input_mint: base_mint,
                output_mint: *quote_mint,
                reason: "buy leg returns nothing".to_string(),
            });
        }

        let sell_request = QuoteRequest {
            input_mint: *quote_mint,
            output_mint: base_mint,
            amount: buy.out_amount,
            slippage_bps: self.settings.sell_slippage_bps,
            excluded_dexes: self.settings.excluded_dexes.clone(),
            only_direct_routes: false,
        };
        let sell = ctx
            .quotes
            .quote(&sell_request)
            .await
            .map_err(|e| ArbError::quote_unavailable(*quote_mint, base_mint, e))?;

        let Some(profit) = self.evaluator.evaluate(&buy, &sell)? else {
            log::debug!(
                "{} -> {} not profitable: spent {} received {}",
                base_mint,
                quote_mint,
                buy.in_amount,
                sell.out_amount
            );
            return Ok(None);
        };

        if buy.output_mint != sell.input_mint {
            return Err(ArbError::Assembly(format!(
                "legs do not meet: buy ends in {}, sell starts from {}",
                buy.output_mint, sell.input_mint
            )));
        }

        let merged = merge_routes(&buy, &sell, self.settings.trade_principal);
        let swap_instructions = ctx
            .swaps
            .swap_instructions(&ctx.signer_pubkey(), &merged, &self.settings.swap_options)
            .await
            .map_err(|e| ArbError::Assembly(format!("{:#}", e)))?;

        let route = format!("{} -> {}", buy.route_labels(), sell.route_labels());
        log::info!(
            "Opportunity: base={} quote={} route={} profit={} (estimated, before fees)",
            base_mint,
            quote_mint,
            route,
            profit
        );

        Ok(Some(Opportunity {
            base_token: base_mint,
            quote_token: *quote_mint,
            profit,
            route,
            swap_instructions,
            detected_at: Utc::now(),
        }))
    }
}
