use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use crate::error::SubmitError;
use crate::ledger::Ledger;

const CONFIRMATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Compiles `instructions` into an unsigned v0 message paid for by `payer`.
///
/// Instruction order is preserved. No lookup tables are used.
pub fn build(
    payer: &Pubkey,
    blockhash: Hash,
    instructions: &[Instruction],
) -> Result<VersionedMessage> {
    let message = v0::Message::try_compile(payer, instructions, &[], blockhash)
        .map_err(|e| anyhow!("{:?}", e))
        .context("unable to compile transaction message")?;

    Ok(VersionedMessage::V0(message))
}

/// Drops repeated signers, keeping the first occurrence of each key.
pub(crate) fn dedup_signers<'a>(signers: &[&'a dyn Signer]) -> Vec<&'a dyn Signer> {
    let mut seen = HashSet::new();
    signers
        .iter()
        .copied()
        .filter(|signer| seen.insert(signer.pubkey()))
        .collect()
}

/// Signs `message` with `signers`, sends it once, and blocks until the ledger
/// reports it confirmed or the blockhash window closes.
///
/// `signers` must cover exactly the message's required signer keys. The same
/// key may appear more than once.
pub fn submit(
    ledger: &dyn Ledger,
    message: VersionedMessage,
    signers: &[&dyn Signer],
) -> Result<Signature, SubmitError> {
    let signers = dedup_signers(signers);
    let tx = VersionedTransaction::try_new(message, &signers)?;

    debug!(
        "sending transaction with {} instruction(s) and {} signature(s)",
        tx.message.instructions().len(),
        tx.signatures.len()
    );

    let signature = ledger
        .send_transaction(&tx)
        .map_err(|e| SubmitError::from_ledger(e, tx.signatures.first().copied()))?;

    let (blockhash, last_valid_block_height) = ledger
        .get_latest_blockhash()
        .map_err(|e| SubmitError::from_ledger(e, Some(signature)))?;

    debug!(
        "awaiting {:?} confirmation of {} (blockhash {}, valid through height {})",
        ledger.commitment().commitment,
        signature,
        blockhash,
        last_valid_block_height
    );

    loop {
        let status = ledger
            .get_signature_status(&signature)
            .map_err(|e| SubmitError::from_ledger(e, Some(signature)))?;

        match status {
            Some(Ok(())) => return Ok(signature),
            Some(Err(reason)) => {
                return Err(SubmitError::Rejected {
                    signature: Some(signature),
                    reason,
                })
            }
            None => {}
        }

        let block_height = ledger
            .get_block_height()
            .map_err(|e| SubmitError::from_ledger(e, Some(signature)))?;

        if block_height > last_valid_block_height {
            return Err(SubmitError::ConfirmationTimeout(signature));
        }

        thread::sleep(CONFIRMATION_POLL_INTERVAL);
    }
}

/// Builds a transaction from `instructions` against a fresh blockhash, with
/// `payer` paying fees, and submits it signed by `signers`.
///
/// `payer` must also appear in `signers`.
pub fn send_instructions(
    ledger: &dyn Ledger,
    payer: &Pubkey,
    instructions: &[Instruction],
    signers: &[&dyn Signer],
) -> Result<Signature> {
    if !signers.iter().any(|signer| signer.pubkey() == *payer) {
        bail!("fee payer {} is not among the transaction signers", payer);
    }

    let (blockhash, _) = ledger.get_latest_blockhash()?;
    let message = build(payer, blockhash, instructions)?;
    let signature = submit(ledger, message, signers)?;

    info!("confirmed transaction {}", signature);

    Ok(signature)
}
