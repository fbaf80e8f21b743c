use solana_sdk::signature::Signature;
use solana_sdk::signer::SignerError;
use thiserror::Error;

/// Failures reported by a [`Ledger`](crate::ledger::Ledger) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the transaction (preflight or execution failure).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The endpoint could not be reached or returned garbage.
    #[error("ledger transport failure: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("failed to sign transaction: {0}")]
    Signing(#[from] SignerError),

    #[error("transaction {} rejected: {}", display_signature(.signature), .reason)]
    Rejected {
        signature: Option<Signature>,
        reason: String,
    },

    #[error("transaction {0} was not confirmed before its blockhash expired")]
    ConfirmationTimeout(Signature),

    #[error("ledger transport failure: {0}")]
    Transport(String),
}

impl SubmitError {
    pub(crate) fn from_ledger(err: LedgerError, signature: Option<Signature>) -> SubmitError {
        match err {
            LedgerError::Rejected(reason) => SubmitError::Rejected { signature, reason },
            LedgerError::Transport(reason) => SubmitError::Transport(reason),
        }
    }
}

fn display_signature(signature: &Option<Signature>) -> String {
    signature
        .as_ref()
        .map(|sig| sig.to_string())
        .unwrap_or_else(|| "(unsent)".to_string())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("multisig must have at least one member")]
    NoMembers,

    #[error("multisig may have at most {max} members, got {count}")]
    TooManyMembers { count: usize, max: usize },

    #[error("approval threshold must be greater than 0")]
    ZeroThreshold,

    #[error("approval threshold {threshold} exceeds the number of members ({members})")]
    ThresholdTooHigh { threshold: u8, members: usize },

    #[error("duplicate multisig member {0}")]
    DuplicateMember(String),
}
