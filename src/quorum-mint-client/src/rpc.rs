use anyhow::Result;
use log::info;
use quorum_mint::ledger::{Ledger, LedgerResult, TransactionStatus};
use quorum_mint::LedgerError;
use solana_client::client_error::ClientError;
use solana_client::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

/// A [`Ledger`] backed by a node's JSON RPC endpoint, at `confirmed`
/// commitment.
pub struct RpcLedger {
    client: RpcClient,
}

pub fn connect(json_rpc_url: &str) -> Result<RpcLedger> {
    info!("connecting to solana node at {}", json_rpc_url);
    let client =
        RpcClient::new_with_commitment(json_rpc_url.to_string(), CommitmentConfig::confirmed());

    let version = client.get_version()?;
    info!("RPC version: {:?}", version);

    Ok(RpcLedger { client })
}

fn ledger_error(err: ClientError) -> LedgerError {
    match err.get_transaction_error() {
        Some(tx_err) => LedgerError::Rejected(tx_err.to_string()),
        None => LedgerError::Transport(err.to_string()),
    }
}

impl Ledger for RpcLedger {
    fn commitment(&self) -> CommitmentConfig {
        self.client.commitment()
    }

    fn get_latest_blockhash(&self) -> LedgerResult<(Hash, u64)> {
        self.client
            .get_latest_blockhash_with_commitment(self.client.commitment())
            .map_err(ledger_error)
    }

    fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(data_len)
            .map_err(ledger_error)
    }

    fn send_transaction(&self, tx: &VersionedTransaction) -> LedgerResult<Signature> {
        self.client.send_transaction(tx).map_err(ledger_error)
    }

    fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<TransactionStatus>> {
        let status = self
            .client
            .get_signature_status_with_commitment(signature, self.client.commitment())
            .map_err(ledger_error)?;

        Ok(status.map(|result| result.map_err(|e| e.to_string())))
    }

    fn get_block_height(&self) -> LedgerResult<u64> {
        self.client.get_block_height().map_err(ledger_error)
    }

    fn get_account(&self, pubkey: &Pubkey) -> LedgerResult<Option<Account>> {
        self.client
            .get_account_with_commitment(pubkey, self.client.commitment())
            .map(|response| response.value)
            .map_err(ledger_error)
    }
}
