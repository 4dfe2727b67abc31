//! Flash Arb - long-running round-trip arbitrage daemon
//!
//! # Usage
//!
//! ```bash
//! export RPC_URL="https://mainnet.helius-rpc.com/?api-key=your-key"
//! export SECRET_KEY="<base58 keypair>"
//! export MARGINFI_BANK="<SOL bank>"
//! export MARGINFI_BANK_ORACLE="<SOL bank oracle>"
//! cargo run --bin flash-arb
//!
//! # Dry run against the same setup
//! cargo run --bin flash-arb -- --simulate
//! ```

use clap::Parser;
use jupiter_flash_arb::config::{redact_url, Args};
use jupiter_flash_arb::flash_loan::marginfi::{create_account_for_authority, find_account_for_authority};
use jupiter_flash_arb::prelude::*;
use jupiter_flash_arb::flash_loan::MarginfiConfig;
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    let authority = config.signer.pubkey();

    let ledger = Arc::new(RpcLedger::new(config.rpc_url.clone()));

    let marginfi_account = match config.marginfi.account {
        Some(account) => account,
        None => {
            let rpc_client = ledger.rpc_client();
            let found = find_account_for_authority(
                &rpc_client,
                &config.marginfi.program_id,
                &config.marginfi.group,
                &authority,
            )
            .await?;
            match found {
                Some(account) => account,
                None => {
                    log::info!("No marginfi account in group {} for {}, creating one", config.marginfi.group, authority);
                    create_account_for_authority(
                        &rpc_client,
                        &config.marginfi.program_id,
                        &config.marginfi.group,
                        &config.signer,
                    )
                    .await?
                }
            }
        }
    };

    let lending = Arc::new(MarginfiLending::new(
        MarginfiConfig {
            program_id: config.marginfi.program_id,
            group: config.marginfi.group,
            account: marginfi_account,
            bank: config.marginfi.bank,
            bank_oracle: config.marginfi.bank_oracle,
            bank_mint: config.scan.base_mint,
            lookup_tables: config.marginfi.lookup_tables.clone(),
        },
        authority,
    ));
    let router = Arc::new(JupiterRouter::with_url(config.jupiter_base_path.clone()));

    log::info!("=== Flash Arb ===");
    log::info!("RPC: {}", redact_url(&config.rpc_url));
    log::info!("Jupiter: {}", redact_url(router.api_url()));
    log::info!("Signer: {}", authority);
    log::info!("marginfi account: {}", marginfi_account);
    log::info!("Base mint: {}", config.scan.base_mint);
    log::info!(
        "Quote mints: {}",
        config.scan.quote_mints.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
    );
    log::info!("Trade principal: {} smallest units", config.scan.trade_principal);
    log::info!("Min profit: {}", config.min_profit);
    log::info!("Simulation mode: {}", config.simulation_mode);
    log::info!("=================");

    let ctx = ArbContext {
        signer: config.signer.clone(),
        quotes: router.clone(),
        swaps: router,
        ledger,
        lending,
    };

    let evaluator = ProfitEvaluator::new(config.base_decimals, config.min_profit);
    let builder = if config.simulation_mode {
        FlashLoanTxBuilder::new_simulation_mode(config.scan.trade_principal, config.retry_policy)
    } else {
        FlashLoanTxBuilder::new(config.scan.trade_principal, config.retry_policy)
    };
    let detector = OpportunityDetector::new(config.scan, evaluator);
    let arb = ArbitrageLoop::new(ctx, detector, builder, config.timing);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    arb.run(cancel).await;
    Ok(())
}
