use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failures the arbitrage engine distinguishes between.
///
/// Each variant maps to one isolation boundary: quote and assembly failures
/// drop a single quote asset from the current scan, execution failures drop a
/// single trade attempt, and configuration failures stop the process before
/// scanning starts.
#[derive(Debug, Clone, Error)]
pub enum ArbError {
    /// A quote request failed or returned no route
    #[error("Quote unavailable for {input_mint} -> {output_mint}: {reason}")]
    QuoteUnavailable {
        input_mint: Pubkey,
        output_mint: Pubkey,
        reason: String,
    },

    /// An address lookup table could not be fetched or decoded
    #[error("Lookup table {address} could not be resolved: {reason}")]
    LookupResolution { address: Pubkey, reason: String },

    /// The instruction-build request failed or returned malformed instructions
    #[error("Instruction assembly failed: {0}")]
    Assembly(String),

    /// Building, signing, submitting or landing the transaction failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Missing or invalid startup configuration
    #[error("Config Error: {0}")]
    Configuration(String),

    /// An amount could not be converted without losing precision
    #[error("Invalid Amount: {0}")]
    InvalidAmount(String),
}

impl ArbError {
    pub fn quote_unavailable(input_mint: Pubkey, output_mint: Pubkey, err: anyhow::Error) -> Self {
        ArbError::QuoteUnavailable {
            input_mint,
            output_mint,
            reason: format!("{:#}", err),
        }
    }

    pub fn execution(err: anyhow::Error) -> Self {
        ArbError::Execution(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, ArbError>;
