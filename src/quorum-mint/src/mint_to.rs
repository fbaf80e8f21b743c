use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;

use crate::ledger::{get_token_account, Ledger, TokenAccount};
use crate::transaction::{dedup_signers, send_instructions};

/// Returns `owner`'s associated token account for `mint`, creating it first
/// if it does not exist. Creation is paid for by `payer` and is a
/// transaction of its own.
pub fn get_or_create_associated_token_account(
    ledger: &dyn Ledger,
    payer: &dyn Signer,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<TokenAccount> {
    let address = get_associated_token_address(owner, mint);

    if let Some(account) = get_token_account(ledger, &address)? {
        debug!("found associated token account {}", address);
        return check_associated_account(account, mint, owner);
    }

    info!(
        "creating associated token account {} for owner {}",
        address, owner
    );

    let instruction =
        create_associated_token_account(&payer.pubkey(), owner, mint, &spl_token::id());
    send_instructions(ledger, &payer.pubkey(), &[instruction], &[payer])
        .with_context(|| format!("unable to create associated token account {}", address))?;

    let account = get_token_account(ledger, &address)?
        .ok_or_else(|| {
            anyhow!(
                "associated token account {} missing after creation",
                address
            )
        })?;

    check_associated_account(account, mint, owner)
}

fn check_associated_account(
    account: TokenAccount,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Result<TokenAccount> {
    if account.mint != *mint {
        bail!(
            "token account {} holds mint {}, expected {}",
            account.address,
            account.mint,
            mint
        );
    }

    if account.owner != *owner {
        bail!(
            "token account {} is owned by {}, expected {}",
            account.address,
            account.owner,
            owner
        );
    }

    Ok(account)
}

/// Mints `amount` of `mint` into `recipient`'s associated token account,
/// authorized by the multisig `mint_authority`.
///
/// `signers[0]` pays for the token account (if it must be created) and for
/// the mint transaction. Every distinct signer is passed to the token program
/// as a multisig signer; whether they reach the quorum is for the ledger to
/// decide.
pub fn mint_to(
    ledger: &dyn Ledger,
    mint: &Pubkey,
    recipient: &Pubkey,
    amount: u64,
    mint_authority: &Pubkey,
    signers: &[&dyn Signer],
) -> Result<Signature> {
    let signers = dedup_signers(signers);
    let payer = match signers.first() {
        Some(payer) => *payer,
        None => bail!("minting requires at least one signer"),
    };

    let token_account = get_or_create_associated_token_account(ledger, payer, mint, recipient)?;

    let signer_pubkeys = signers.iter().map(|s| s.pubkey()).collect::<Vec<Pubkey>>();
    let signer_refs = signer_pubkeys.iter().collect::<Vec<&Pubkey>>();

    let instruction = spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        &token_account.address,
        mint_authority,
        &signer_refs,
        amount,
    )?;

    info!(
        "minting {} of {} to {} with {} signer(s)",
        amount,
        mint,
        token_account.address,
        signers.len()
    );

    send_instructions(ledger, &payer.pubkey(), &[instruction], &signers)
        .with_context(|| format!("unable to mint {} to {}", amount, token_account.address))
}
