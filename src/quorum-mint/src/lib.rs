//! Provisioning of a token-program multisig, a mint controlled by it, and
//! quorum-signed minting, against any [`ledger::Ledger`].

pub mod error;
pub mod ledger;
pub mod mint;
pub mod mint_to;
pub mod multisig;
pub mod transaction;
pub mod workflow;

#[cfg(test)]
mod test_ledger;

pub use error::{LedgerError, MultisigError, SubmitError};
pub use ledger::Ledger;
pub use multisig::MultisigAuthority;
pub use workflow::{WorkflowContext, WorkflowReport};
