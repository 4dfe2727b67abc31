/// Turns Jupiter's wire-format swap instructions into native instructions
/// and resolves the lookup tables they reference

use crate::error::{ArbError, Result};
use crate::execution::jupiter_router::{RawInstruction, SwapInstructionsResponse};
use crate::execution::rpc_ledger::Ledger;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::future::try_join_all;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    message::AddressLookupTableAccount,
    pubkey::Pubkey,
};
use std::str::FromStr;
use std::sync::Arc;

/// Executable swap instructions for one merged quote
///
/// Consumers must emit them as compute, setup, swap. The flash loan builder
/// slots borrow and repay around `swap_instruction`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionBundle {
    pub compute_instructions: Vec<Instruction>,
    pub setup_instructions: Vec<Instruction>,
    pub swap_instruction: Instruction,
    pub address_lookup_table_accounts: Vec<AddressLookupTableAccount>,
}

impl InstructionBundle {
    /// Instructions in execution order, without any flash loan wrapping
    pub fn ordered_instructions(&self) -> Vec<Instruction> {
        self.compute_instructions
            .iter()
            .chain(self.setup_instructions.iter())
            .chain(std::iter::once(&self.swap_instruction))
            .cloned()
            .collect()
    }
}

pub struct InstructionAssembler {
    ledger: Arc<dyn Ledger>,
}

impl InstructionAssembler {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    pub async fn assemble(&self, response: &SwapInstructionsResponse) -> Result<InstructionBundle> {
        let compute_instructions = response
            .compute_budget_instructions
            .iter()
            .map(deserialize_instruction)
            .collect::<Result<Vec<_>>>()?;
        let setup_instructions = response
            .setup_instructions
            .iter()
            .map(deserialize_instruction)
            .collect::<Result<Vec<_>>>()?;
        let swap_instruction = deserialize_instruction(&response.swap_instruction)?;

        if response.cleanup_instruction.is_some() {
            log::debug!("Ignoring cleanup instruction; wrapped SOL stays wrapped inside the transaction");
        }

        let table_addresses = response
            .address_lookup_table_addresses
            .iter()
            .map(|address| {
                Pubkey::from_str(address)
                    .map_err(|e| ArbError::Assembly(format!("invalid lookup table address '{}': {}", address, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let address_lookup_table_accounts = resolve_lookup_tables(self.ledger.as_ref(), &table_addresses).await?;

        Ok(InstructionBundle {
            compute_instructions,
            setup_instructions,
            swap_instruction,
            address_lookup_table_accounts,
        })
    }
}

/// Convert one wire instruction into a native `Instruction`
pub fn deserialize_instruction(raw: &RawInstruction) -> Result<Instruction> {
    let program_id = Pubkey::from_str(&raw.program_id)
        .map_err(|e| ArbError::Assembly(format!("invalid program id '{}': {}", raw.program_id, e)))?;

    let accounts = raw
        .accounts
        .iter()
        .map(|meta| {
            let pubkey = Pubkey::from_str(&meta.pubkey)
                .map_err(|e| ArbError::Assembly(format!("invalid account '{}': {}", meta.pubkey, e)))?;
            Ok(AccountMeta {
                pubkey,
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let data = BASE64
        .decode(&raw.data)
        .map_err(|e| ArbError::Assembly(format!("invalid instruction data for {}: {}", program_id, e)))?;

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}

/// Fetch every lookup table concurrently, once per distinct address.
///
/// A missing or undecodable table fails the whole resolution.
pub async fn resolve_lookup_tables(
    ledger: &dyn Ledger,
    addresses: &[Pubkey],
) -> Result<Vec<AddressLookupTableAccount>> {
    let mut unique = Vec::with_capacity(addresses.len());
    for address in addresses {
        if !unique.contains(address) {
            unique.push(*address);
        }
    }

    try_join_all(unique.into_iter().map(|address| async move {
        match ledger.resolve_lookup_table(&address).await {
            Ok(Some(table)) => Ok(table),
            Ok(None) => Err(ArbError::LookupResolution {
                address,
                reason: "account not found".to_string(),
            }),
            Err(e) => Err(ArbError::LookupResolution {
                address,
                reason: format!("{:#}", e),
            }),
        }
    }))
    .await
}
