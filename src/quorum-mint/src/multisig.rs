use anyhow::{Context, Result};
use log::info;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::system_instruction;
use spl_token::instruction::MAX_SIGNERS;
use spl_token::state::Multisig;

use crate::error::MultisigError;
use crate::ledger::Ledger;
use crate::transaction::send_instructions;

/// Size of the token program's multisig account layout.
pub const MULTISIG_ACCOUNT_LEN: usize = Multisig::LEN;

/// An N-of-M signing quorum, validated before anything is sent to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigAuthority {
    members: Vec<Pubkey>,
    threshold: u8,
}

impl MultisigAuthority {
    pub fn new(members: Vec<Pubkey>, threshold: u8) -> Result<MultisigAuthority, MultisigError> {
        if members.is_empty() {
            return Err(MultisigError::NoMembers);
        }

        if members.len() > MAX_SIGNERS {
            return Err(MultisigError::TooManyMembers {
                count: members.len(),
                max: MAX_SIGNERS,
            });
        }

        if threshold == 0 {
            return Err(MultisigError::ZeroThreshold);
        }

        if usize::from(threshold) > members.len() {
            return Err(MultisigError::ThresholdTooHigh {
                threshold,
                members: members.len(),
            });
        }

        let mut sorted_members = members.clone();
        sorted_members.sort_unstable();
        if let Some(pair) = sorted_members.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(MultisigError::DuplicateMember(pair[0].to_string()));
        }

        Ok(MultisigAuthority { members, threshold })
    }

    pub fn members(&self) -> &[Pubkey] {
        &self.members
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }
}

/// The allocation and initialization instructions for a new multisig
/// account, in the order they must execute.
pub fn build_create_multisig_instructions(
    payer: &Pubkey,
    multisig_account: &Pubkey,
    authority: &MultisigAuthority,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    let members = authority.members().iter().collect::<Vec<&Pubkey>>();

    Ok(vec![
        system_instruction::create_account(
            payer,
            multisig_account,
            lamports,
            MULTISIG_ACCOUNT_LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_multisig(
            &spl_token::id(),
            multisig_account,
            &members,
            authority.threshold(),
        )?,
    ])
}

/// Creates `multisig_account` on-chain as a token-program multisig.
///
/// The transaction is signed by the payer and the new account.
pub fn create_multisig(
    ledger: &dyn Ledger,
    payer: &dyn Signer,
    authority: &MultisigAuthority,
    multisig_account: &dyn Signer,
) -> Result<Signature> {
    let multisig_pubkey = multisig_account.pubkey();

    info!(
        "creating {}-of-{} multisig {}",
        authority.threshold(),
        authority.members().len(),
        multisig_pubkey
    );

    let lamports = ledger.get_minimum_balance_for_rent_exemption(MULTISIG_ACCOUNT_LEN)?;
    let instructions =
        build_create_multisig_instructions(&payer.pubkey(), &multisig_pubkey, authority, lamports)?;

    send_instructions(
        ledger,
        &payer.pubkey(),
        &instructions,
        &[payer, multisig_account],
    )
    .with_context(|| format!("unable to create multisig {}", multisig_pubkey))
}
