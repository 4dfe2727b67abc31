/// Ledger access: blockhashes, lookup tables, submission and simulation

use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_address_lookup_table_interface::{program as lookup_table_program, state::AddressLookupTable};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{
    hash::Hash,
    message::AddressLookupTableAccount,
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use std::sync::Arc;

/// Outcome of a simulated transaction
#[derive(Debug, Clone, Default)]
pub struct SimulationOutcome {
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub units_consumed: Option<u64>,
}

impl SimulationOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Ledger submission capability
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Hash>;

    /// `Ok(None)` when no account exists at `address`
    async fn resolve_lookup_table(&self, address: &Pubkey) -> Result<Option<AddressLookupTableAccount>>;

    async fn submit(&self, transaction: &VersionedTransaction, skip_preflight: bool) -> Result<Signature>;

    async fn simulate(&self, transaction: &VersionedTransaction) -> Result<SimulationOutcome>;
}

/// `Ledger` backed by a JSON-RPC node
pub struct RpcLedger {
    rpc_client: Arc<RpcClient>,
}

impl RpcLedger {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc_client: Arc::new(RpcClient::new_with_commitment(
                rpc_url,
                CommitmentConfig::confirmed(),
            )),
        }
    }

    pub fn rpc_client(&self) -> Arc<RpcClient> {
        self.rpc_client.clone()
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn latest_blockhash(&self) -> Result<Hash> {
        self.rpc_client
            .get_latest_blockhash()
            .await
            .context("Failed to fetch latest blockhash")
    }

    async fn resolve_lookup_table(&self, address: &Pubkey) -> Result<Option<AddressLookupTableAccount>> {
        let response = self
            .rpc_client
            .get_account_with_commitment(address, self.rpc_client.commitment())
            .await
            .with_context(|| format!("Failed to fetch lookup table account {}", address))?;

        let Some(account) = response.value else {
            return Ok(None);
        };

        lookup_table_account(address, &account.owner, &account.data).map(Some)
    }

    async fn submit(&self, transaction: &VersionedTransaction, skip_preflight: bool) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight,
            ..RpcSendTransactionConfig::default()
        };

        self.rpc_client
            .send_transaction_with_config(transaction, config)
            .await
            .context("Failed to send transaction")
    }

    async fn simulate(&self, transaction: &VersionedTransaction) -> Result<SimulationOutcome> {
        let response = self
            .rpc_client
            .simulate_transaction(transaction)
            .await
            .context("Failed to simulate transaction")?;

        Ok(SimulationOutcome {
            error: response.value.err.map(|e| format!("{:?}", e)),
            logs: response.value.logs.unwrap_or_default(),
            units_consumed: response.value.units_consumed,
        })
    }
}

/// Build a lookup table account from its on-chain owner and data
pub fn lookup_table_account(address: &Pubkey, owner: &Pubkey, data: &[u8]) -> Result<AddressLookupTableAccount> {
    if *owner != lookup_table_program::id() {
        anyhow::bail!("account {} is owned by {}, not the lookup table program", address, owner);
    }

    let table = AddressLookupTable::deserialize(data)
        .map_err(|e| anyhow::anyhow!("Failed to deserialize lookup table {}: {:?}", address, e))?;

    Ok(AddressLookupTableAccount {
        key: *address,
        addresses: table.addresses.to_vec(),
    })
}
