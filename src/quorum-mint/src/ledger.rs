//! The connection seam between the orchestration core and a ledger node.
//!
//! Everything the workflow needs from the node goes through [`Ledger`], an
//! immutable handle passed explicitly into every call. The client crate backs
//! it with an RPC client; tests back it with an in-memory bank.

use anyhow::{anyhow, bail, Context, Result};
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use spl_token::state::{Account as SplAccount, Mint, Multisig};

use crate::error::LedgerError;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Outcome of a transaction as seen at the ledger's commitment level.
///
/// `Err` carries the ledger's description of why execution failed.
pub type TransactionStatus = std::result::Result<(), String>;

pub trait Ledger {
    fn commitment(&self) -> CommitmentConfig;

    /// Returns the latest blockhash and the last block height at which
    /// transactions referencing it are still valid.
    fn get_latest_blockhash(&self) -> LedgerResult<(Hash, u64)>;

    fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64>;

    fn send_transaction(&self, tx: &VersionedTransaction) -> LedgerResult<Signature>;

    /// `None` until the transaction reaches [`Ledger::commitment`].
    fn get_signature_status(&self, signature: &Signature)
        -> LedgerResult<Option<TransactionStatus>>;

    fn get_block_height(&self) -> LedgerResult<u64>;

    fn get_account(&self, pubkey: &Pubkey) -> LedgerResult<Option<Account>>;
}

/// Decoded contents of an on-chain multisig account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigState {
    pub address: Pubkey,
    pub threshold: u8,
    pub members: Vec<Pubkey>,
    pub data_len: usize,
}

/// Decoded contents of an on-chain mint account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintState {
    pub address: Pubkey,
    pub decimals: u8,
    pub supply: u64,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub data_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccount {
    pub address: Pubkey,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

pub fn get_multisig(ledger: &dyn Ledger, address: &Pubkey) -> Result<MultisigState> {
    let account = get_token_program_account(ledger, address)?;
    let multisig = Multisig::unpack(&account.data)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("account {} is not a multisig", address))?;

    let member_count = usize::from(multisig.n).min(multisig.signers.len());
    let members = multisig.signers[..member_count].to_vec();

    Ok(MultisigState {
        address: *address,
        threshold: multisig.m,
        members,
        data_len: account.data.len(),
    })
}

pub fn get_mint(ledger: &dyn Ledger, address: &Pubkey) -> Result<MintState> {
    let account = get_token_program_account(ledger, address)?;
    let mint = Mint::unpack(&account.data)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("account {} is not a mint", address))?;

    Ok(MintState {
        address: *address,
        decimals: mint.decimals,
        supply: mint.supply,
        mint_authority: from_coption(mint.mint_authority),
        freeze_authority: from_coption(mint.freeze_authority),
        data_len: account.data.len(),
    })
}

/// Reads a token account, returning `None` if nothing exists at `address`.
pub fn get_token_account(ledger: &dyn Ledger, address: &Pubkey) -> Result<Option<TokenAccount>> {
    let account = match ledger.get_account(address)? {
        Some(account) => account,
        None => return Ok(None),
    };

    if account.owner != spl_token::id() {
        bail!(
            "account {} is owned by {}, not the token program",
            address,
            account.owner
        );
    }

    let token_account = SplAccount::unpack(&account.data)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("account {} is not a token account", address))?;

    Ok(Some(TokenAccount {
        address: *address,
        mint: token_account.mint,
        owner: token_account.owner,
        amount: token_account.amount,
    }))
}

fn get_token_program_account(ledger: &dyn Ledger, address: &Pubkey) -> Result<Account> {
    let account = ledger
        .get_account(address)?
        .ok_or_else(|| anyhow!("account {} does not exist", address))?;

    if account.owner != spl_token::id() {
        bail!(
            "account {} is owned by {}, not the token program",
            address,
            account.owner
        );
    }

    Ok(account)
}

fn from_coption(value: COption<Pubkey>) -> Option<Pubkey> {
    match value {
        COption::Some(key) => Some(key),
        COption::None => None,
    }
}
