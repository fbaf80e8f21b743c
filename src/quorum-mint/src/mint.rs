use anyhow::{Context, Result};
use log::info;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::system_instruction;
use spl_token::state::Mint;

use crate::ledger::Ledger;
use crate::transaction::send_instructions;

/// Size of the token program's mint account layout.
pub const MINT_ACCOUNT_LEN: usize = Mint::LEN;

/// Minted tokens are indivisible.
pub const MINT_DECIMALS: u8 = 0;

pub fn build_create_mint_instructions(
    payer: &Pubkey,
    mint_account: &Pubkey,
    mint_authority: &Pubkey,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    Ok(vec![
        system_instruction::create_account(
            payer,
            mint_account,
            lamports,
            MINT_ACCOUNT_LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(
            &spl_token::id(),
            mint_account,
            mint_authority,
            None,
            MINT_DECIMALS,
        )?,
    ])
}

/// Creates a zero-decimal mint controlled by `mint_authority`, with no
/// freeze authority.
pub fn create_mint(
    ledger: &dyn Ledger,
    payer: &dyn Signer,
    mint_account: &dyn Signer,
    mint_authority: &Pubkey,
) -> Result<Signature> {
    let mint_pubkey = mint_account.pubkey();

    info!(
        "creating mint {} with authority {}",
        mint_pubkey, mint_authority
    );

    let lamports = ledger.get_minimum_balance_for_rent_exemption(MINT_ACCOUNT_LEN)?;
    let instructions =
        build_create_mint_instructions(&payer.pubkey(), &mint_pubkey, mint_authority, lamports)?;

    send_instructions(
        ledger,
        &payer.pubkey(),
        &instructions,
        &[payer, mint_account],
    )
    .with_context(|| format!("unable to create mint {}", mint_pubkey))
}
