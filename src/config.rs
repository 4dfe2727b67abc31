//! Startup configuration
//!
//! Every flag can also come from the environment (a `.env` file is loaded by
//! the binary). Values are validated once into a [`BotConfig`] and never
//! change for the lifetime of the process.

use crate::error::{ArbError, Result};
use crate::execution::jupiter_router::SwapInstructionOptions;
use crate::flash_loan::arbitrage_loop::LoopTiming;
use crate::flash_loan::marginfi::{MARGINFI_MAINNET_GROUP, MARGINFI_PROGRAM_ID};
use crate::flash_loan::opportunity_detector::ScanSettings;
use crate::flash_loan::transaction_builder::RetryPolicy;
use clap::Parser;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signature::Keypair};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// Decimal places beyond which a u64 amount can no longer be scaled safely
const MAX_DECIMALS: u32 = 18;

#[derive(Parser, Debug, Clone)]
#[command(name = "flash-arb")]
#[command(about = "Round-trip Jupiter arbitrage executed inside a marginfi flash loan", long_about = None)]
pub struct Args {
    /// Solana JSON-RPC endpoint
    #[arg(long = "rpc-url", env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Jupiter quote API base path
    #[arg(long = "jupiter-base-path", env = "JUPITER_BASE_PATH", default_value = "https://quote-api.jup.ag/v6")]
    pub jupiter_base_path: String,

    /// Base58-encoded 64-byte keypair that signs and pays
    #[arg(long = "secret-key", env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Asset borrowed, swapped through and repaid
    #[arg(long = "base-mint", env = "BASE_MINT", default_value = WSOL_MINT)]
    pub base_mint: String,

    /// Intermediate assets to try, in scan order
    #[arg(long = "quote-mints", env = "ARB_MINTS", value_delimiter = ',', default_value = USDC_MINT)]
    pub quote_mints: Vec<String>,

    /// Decimal places of the base asset
    #[arg(long = "base-decimals", env = "BASE_DECIMALS", default_value = "9")]
    pub base_decimals: u32,

    /// Trade principal in display units of the base asset
    #[arg(long = "trade-amount", env = "TRADE_AMOUNT", default_value = "4000")]
    pub trade_amount: Decimal,

    /// Minimum estimated profit, in display units of the base asset
    #[arg(long = "min-profit", env = "MIN_PROFIT", default_value = "0.1")]
    pub min_profit: Decimal,

    #[arg(long = "buy-slippage-bps", env = "BUY_SLIPPAGE_BPS", default_value = "50")]
    pub buy_slippage_bps: u16,

    #[arg(long = "sell-slippage-bps", env = "SELL_SLIPPAGE_BPS", default_value = "0")]
    pub sell_slippage_bps: u16,

    /// Venues never routed through
    #[arg(long = "exclude-dexes", env = "EXCLUDE_DEXES", value_delimiter = ',', default_value = "Obric V2")]
    pub exclude_dexes: Vec<String>,

    /// Priority fee in micro-lamports per compute unit
    #[arg(long = "compute-unit-price", env = "COMPUTE_UNIT_PRICE_MICRO_LAMPORTS", default_value = "1")]
    pub compute_unit_price: u64,

    #[arg(long = "scan-delay-ms", env = "SCAN_DELAY_MS", default_value = "200")]
    pub scan_delay_ms: u64,

    #[arg(long = "cooldown-secs", env = "COOLDOWN_SECS", default_value = "86400")]
    pub cooldown_secs: u64,

    #[arg(long = "max-execution-attempts", env = "MAX_EXECUTION_ATTEMPTS", default_value = "1")]
    pub max_execution_attempts: u32,

    /// Simulate flash loans instead of submitting them
    #[arg(long = "simulate", env = "SIMULATION_MODE")]
    pub simulate: bool,

    #[arg(long = "marginfi-program", env = "MARGINFI_PROGRAM_ID", default_value_t = MARGINFI_PROGRAM_ID.to_string())]
    pub marginfi_program: String,

    #[arg(long = "marginfi-group", env = "MARGINFI_GROUP", default_value_t = MARGINFI_MAINNET_GROUP.to_string())]
    pub marginfi_group: String,

    /// marginfi account to borrow through; looked up by signer when absent
    #[arg(long = "marginfi-account", env = "MARGINFI_ACCOUNT")]
    pub marginfi_account: Option<String>,

    /// Bank holding the base asset
    #[arg(long = "marginfi-bank", env = "MARGINFI_BANK")]
    pub marginfi_bank: Option<String>,

    /// Price oracle of the bank
    #[arg(long = "marginfi-bank-oracle", env = "MARGINFI_BANK_ORACLE")]
    pub marginfi_bank_oracle: Option<String>,

    #[arg(long = "marginfi-lookup-tables", env = "MARGINFI_LOOKUP_TABLES", value_delimiter = ',')]
    pub marginfi_lookup_tables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarginfiSettings {
    pub program_id: Pubkey,
    pub group: Pubkey,
    pub account: Option<Pubkey>,
    pub bank: Pubkey,
    pub bank_oracle: Pubkey,
    pub lookup_tables: Vec<Pubkey>,
}

/// Validated, immutable process configuration
pub struct BotConfig {
    pub rpc_url: String,
    pub jupiter_base_path: String,
    pub signer: Arc<Keypair>,
    pub base_decimals: u32,
    pub min_profit: Decimal,
    pub scan: ScanSettings,
    pub timing: LoopTiming,
    pub retry_policy: RetryPolicy,
    pub simulation_mode: bool,
    pub marginfi: MarginfiSettings,
}

impl Args {
    pub fn into_config(self) -> Result<BotConfig> {
        let rpc_url = require(self.rpc_url, "RPC_URL")?;
        let secret_key = require(self.secret_key, "SECRET_KEY")?;
        let signer = Arc::new(parse_keypair(&secret_key)?);

        let base_mint = parse_pubkey("BASE_MINT", &self.base_mint)?;
        let quote_mints = parse_pubkeys("ARB_MINTS", &self.quote_mints)?;
        if quote_mints.is_empty() {
            return Err(ArbError::Configuration("at least one quote mint is required".into()));
        }
        if quote_mints.contains(&base_mint) {
            return Err(ArbError::Configuration("quote mints must differ from the base mint".into()));
        }

        if self.base_decimals > MAX_DECIMALS {
            return Err(ArbError::Configuration(format!(
                "BASE_DECIMALS must be at most {}",
                MAX_DECIMALS
            )));
        }
        let trade_principal = to_smallest_units(self.trade_amount, self.base_decimals)?;
        if trade_principal == 0 {
            return Err(ArbError::Configuration("TRADE_AMOUNT must be positive".into()));
        }
        if self.min_profit.is_sign_negative() {
            return Err(ArbError::Configuration("MIN_PROFIT must not be negative".into()));
        }
        if self.max_execution_attempts == 0 {
            return Err(ArbError::Configuration("MAX_EXECUTION_ATTEMPTS must be at least 1".into()));
        }

        let marginfi = MarginfiSettings {
            program_id: parse_pubkey("MARGINFI_PROGRAM_ID", &self.marginfi_program)?,
            group: parse_pubkey("MARGINFI_GROUP", &self.marginfi_group)?,
            account: self
                .marginfi_account
                .as_deref()
                .map(|s| parse_pubkey("MARGINFI_ACCOUNT", s))
                .transpose()?,
            bank: parse_pubkey("MARGINFI_BANK", &require(self.marginfi_bank, "MARGINFI_BANK")?)?,
            bank_oracle: parse_pubkey(
                "MARGINFI_BANK_ORACLE",
                &require(self.marginfi_bank_oracle, "MARGINFI_BANK_ORACLE")?,
            )?,
            lookup_tables: parse_pubkeys("MARGINFI_LOOKUP_TABLES", &self.marginfi_lookup_tables)?,
        };

        let scan = ScanSettings {
            base_mint,
            quote_mints,
            trade_principal,
            buy_slippage_bps: self.buy_slippage_bps,
            sell_slippage_bps: self.sell_slippage_bps,
            excluded_dexes: self
                .exclude_dexes
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            swap_options: SwapInstructionOptions {
                compute_unit_price_micro_lamports: self.compute_unit_price,
                ..SwapInstructionOptions::default()
            },
        };

        Ok(BotConfig {
            rpc_url,
            jupiter_base_path: self.jupiter_base_path,
            signer,
            base_decimals: self.base_decimals,
            min_profit: self.min_profit,
            scan,
            timing: LoopTiming {
                scan_delay: Duration::from_millis(self.scan_delay_ms),
                cooldown: Duration::from_secs(self.cooldown_secs),
            },
            retry_policy: RetryPolicy {
                max_attempts: self.max_execution_attempts,
            },
            simulation_mode: self.simulate,
            marginfi,
        })
    }
}

/// Strip API keys from an endpoint before logging it
pub fn redact_url(url: &str) -> &str {
    url.split("api-key=").next().unwrap_or(url)
}

/// Convert a display amount into smallest units, refusing to round
pub fn to_smallest_units(amount: Decimal, decimals: u32) -> Result<u64> {
    let scale = 10u64
        .checked_pow(decimals)
        .map(Decimal::from)
        .ok_or_else(|| ArbError::InvalidAmount(format!("{} decimals is out of range", decimals)))?;
    let scaled = amount
        .checked_mul(scale)
        .ok_or_else(|| ArbError::InvalidAmount(format!("{} overflows at {} decimals", amount, decimals)))?;
    if !scaled.fract().is_zero() {
        return Err(ArbError::InvalidAmount(format!(
            "{} has more than {} decimal places",
            amount, decimals
        )));
    }
    scaled
        .to_u64()
        .ok_or_else(|| ArbError::InvalidAmount(format!("{} does not fit in smallest units", amount)))
}

fn require(value: Option<String>, name: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ArbError::Configuration(format!("{} is required", name)))
}

fn parse_pubkey(name: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|e| ArbError::Configuration(format!("invalid {} '{}': {}", name, value, e)))
}

fn parse_pubkeys(name: &str, values: &[String]) -> Result<Vec<Pubkey>> {
    values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_pubkey(name, v))
        .collect()
}

fn parse_keypair(secret: &str) -> Result<Keypair> {
    let bytes = bs58::decode(secret.trim())
        .into_vec()
        .map_err(|e| ArbError::Configuration(format!("SECRET_KEY is not valid base58: {}", e)))?;
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| ArbError::Configuration(format!("SECRET_KEY is not a valid keypair: {}", e)))
}
