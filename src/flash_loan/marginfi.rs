/// marginfi v2 lending market
///
/// Builds the borrow, repay and flash loan envelope instructions directly
/// from the program's Anchor interface. The flash loan envelope is
/// `start_flashloan(end_index)` first and `end_flashloan` last, with
/// `end_index` pointing at the closing instruction.

use crate::flash_loan::lending::{BorrowInstructions, LendingMarket};
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcProgramAccountsConfig;
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    message::{v0, AddressLookupTableAccount, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use spl_associated_token_account_interface::address::get_associated_token_address;

pub const MARGINFI_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("MFv2hWf31Z9kbCa1snEPYctwafyhdvnV7FZnsebVacA");
pub const MARGINFI_MAINNET_GROUP: Pubkey = solana_sdk::pubkey!("4qp6Fx6tnZkY5Wropq9wUYgtFxXKwE6viZxFHg3rdAG8");

const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");
const INSTRUCTIONS_SYSVAR_ID: Pubkey = solana_sdk::pubkey!("Sysvar1nstructions1111111111111111111111111");

// sha256("global:<name>")[..8]
const BORROW_DISCRIMINATOR: [u8; 8] = [4, 126, 116, 53, 48, 5, 212, 31];
const REPAY_DISCRIMINATOR: [u8; 8] = [79, 209, 172, 177, 222, 51, 173, 151];
const START_FLASHLOAN_DISCRIMINATOR: [u8; 8] = [14, 131, 33, 220, 81, 186, 180, 107];
const END_FLASHLOAN_DISCRIMINATOR: [u8; 8] = [105, 124, 201, 106, 153, 2, 8, 156];
const ACCOUNT_INITIALIZE_DISCRIMINATOR: [u8; 8] = [43, 78, 61, 255, 148, 52, 249, 154];
// sha256("account:MarginfiAccount")[..8]
const MARGINFI_ACCOUNT_DISCRIMINATOR: [u8; 8] = [67, 178, 130, 109, 126, 114, 28, 42];

const GROUP_OFFSET: usize = 8;
const AUTHORITY_OFFSET: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct MarginfiConfig {
    pub program_id: Pubkey,
    pub group: Pubkey,
    pub account: Pubkey,
    pub bank: Pubkey,
    pub bank_oracle: Pubkey,
    pub bank_mint: Pubkey,
    pub lookup_tables: Vec<Pubkey>,
}

pub struct MarginfiLending {
    config: MarginfiConfig,
    authority: Pubkey,
    liquidity_vault: Pubkey,
    liquidity_vault_authority: Pubkey,
    authority_token_account: Pubkey,
}

impl MarginfiLending {
    pub fn new(config: MarginfiConfig, authority: Pubkey) -> Self {
        let (liquidity_vault, _) =
            Pubkey::find_program_address(&[b"liquidity_vault", config.bank.as_ref()], &config.program_id);
        let (liquidity_vault_authority, _) =
            Pubkey::find_program_address(&[b"liquidity_vault_auth", config.bank.as_ref()], &config.program_id);
        let authority_token_account = get_associated_token_address(&authority, &config.bank_mint);

        Self {
            config,
            authority,
            liquidity_vault,
            liquidity_vault_authority,
            authority_token_account,
        }
    }

    fn borrow_ix(&self, amount: u64) -> Instruction {
        let mut data = BORROW_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&amount.to_le_bytes());

        Instruction {
            program_id: self.config.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.config.group, false),
                AccountMeta::new(self.config.account, false),
                AccountMeta::new_readonly(self.authority, true),
                AccountMeta::new(self.config.bank, false),
                AccountMeta::new(self.authority_token_account, false),
                AccountMeta::new(self.liquidity_vault_authority, false),
                AccountMeta::new(self.liquidity_vault, false),
                AccountMeta::new_readonly(spl_token_interface::id(), false),
                // health observation: the borrowed bank and its oracle
                AccountMeta::new_readonly(self.config.bank, false),
                AccountMeta::new_readonly(self.config.bank_oracle, false),
            ],
            data,
        }
    }

    fn repay_ix(&self, amount: u64, repay_all: bool) -> Instruction {
        let mut data = REPAY_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&amount.to_le_bytes());
        // Option<bool>
        data.push(1);
        data.push(repay_all as u8);

        Instruction {
            program_id: self.config.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.config.group, false),
                AccountMeta::new(self.config.account, false),
                AccountMeta::new_readonly(self.authority, true),
                AccountMeta::new(self.config.bank, false),
                AccountMeta::new(self.authority_token_account, false),
                AccountMeta::new(self.liquidity_vault, false),
                AccountMeta::new_readonly(spl_token_interface::id(), false),
            ],
            data,
        }
    }

    fn start_flashloan_ix(&self, end_index: u64) -> Instruction {
        let mut data = START_FLASHLOAN_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&end_index.to_le_bytes());

        Instruction {
            program_id: self.config.program_id,
            accounts: vec![
                AccountMeta::new(self.config.account, false),
                AccountMeta::new_readonly(self.authority, true),
                AccountMeta::new_readonly(INSTRUCTIONS_SYSVAR_ID, false),
            ],
            data,
        }
    }

    fn end_flashloan_ix(&self) -> Instruction {
        Instruction {
            program_id: self.config.program_id,
            accounts: vec![
                AccountMeta::new(self.config.account, false),
                AccountMeta::new_readonly(self.authority, true),
            ],
            data: END_FLASHLOAN_DISCRIMINATOR.to_vec(),
        }
    }
}

#[async_trait]
impl LendingMarket for MarginfiLending {
    async fn borrow_instructions(&self, amount: u64) -> Result<BorrowInstructions> {
        if amount == 0 {
            anyhow::bail!("borrow amount must be positive");
        }
        Ok(BorrowInstructions {
            instructions: vec![self.borrow_ix(amount)],
            has_trailing_transfer: false,
        })
    }

    async fn repay_instructions(&self, amount: u64, repay_all: bool) -> Result<Vec<Instruction>> {
        if amount == 0 {
            anyhow::bail!("repay amount must be positive");
        }
        Ok(vec![self.repay_ix(amount, repay_all)])
    }

    fn lookup_table_addresses(&self) -> Vec<Pubkey> {
        self.config.lookup_tables.clone()
    }

    fn build_flash_loan_message(
        &self,
        payer: &Pubkey,
        instructions: Vec<Instruction>,
        lookup_tables: &[AddressLookupTableAccount],
        recent_blockhash: Hash,
    ) -> Result<VersionedMessage> {
        let end_index = instructions.len() as u64 + 1;

        let mut wrapped = Vec::with_capacity(instructions.len() + 2);
        wrapped.push(self.start_flashloan_ix(end_index));
        wrapped.extend(instructions);
        wrapped.push(self.end_flashloan_ix());

        let message = v0::Message::try_compile(payer, &wrapped, lookup_tables, recent_blockhash)
            .context("Failed to compile flash loan message")?;

        Ok(VersionedMessage::V0(message))
    }
}

/// Find a marginfi account in `group` owned by `authority`
pub async fn find_account_for_authority(
    rpc_client: &RpcClient,
    program_id: &Pubkey,
    group: &Pubkey,
    authority: &Pubkey,
) -> Result<Option<Pubkey>> {
    let config = RpcProgramAccountsConfig {
        filters: Some(vec![
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(0, &MARGINFI_ACCOUNT_DISCRIMINATOR)),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(GROUP_OFFSET, group.as_ref())),
            RpcFilterType::Memcmp(Memcmp::new_base58_encoded(AUTHORITY_OFFSET, authority.as_ref())),
        ]),
        ..RpcProgramAccountsConfig::default()
    };

    let accounts = rpc_client
        .get_program_accounts_with_config(program_id, config)
        .await
        .context("Failed to query marginfi accounts")?;

    if accounts.len() > 1 {
        log::info!("Found {} marginfi accounts for {}, using the first", accounts.len(), authority);
    }

    Ok(accounts.into_iter().map(|(pubkey, _)| pubkey).next())
}

/// `marginfi_account_initialize` for a fresh `account` keypair in `group`,
/// paid for by `authority`
pub fn initialize_account_ix(program_id: &Pubkey, group: &Pubkey, account: &Pubkey, authority: &Pubkey) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*group, false),
            AccountMeta::new(*account, true),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
        ],
        data: ACCOUNT_INITIALIZE_DISCRIMINATOR.to_vec(),
    }
}

/// Create a marginfi account in `group` owned by `signer` and wait for confirmation
pub async fn create_account_for_authority(
    rpc_client: &RpcClient,
    program_id: &Pubkey,
    group: &Pubkey,
    signer: &Keypair,
) -> Result<Pubkey> {
    let account = Keypair::new();
    let authority = signer.pubkey();
    let ix = initialize_account_ix(program_id, group, &account.pubkey(), &authority);

    let recent_blockhash = rpc_client
        .get_latest_blockhash()
        .await
        .context("Failed to fetch blockhash for marginfi account creation")?;
    let transaction = Transaction::new_signed_with_payer(&[ix], Some(&authority), &[signer, &account], recent_blockhash);

    let signature = rpc_client
        .send_and_confirm_transaction(&transaction)
        .await
        .context("Failed to create marginfi account")?;
    log::info!("Created marginfi account {} ({})", account.pubkey(), signature);

    Ok(account.pubkey())
}
