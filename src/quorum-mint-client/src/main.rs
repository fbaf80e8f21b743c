use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use quorum_mint::workflow::{self, WorkflowContext, WorkflowReport};
use solana_sdk::signature::Signer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

mod identity;
mod rpc;

use identity::ResolvedIdentity;

/// JSON RPC endpoint of the local ledger node.
const RPC_URL: &str = "http://127.0.0.1:8899";

/// Create a 2-of-2 multisig, a mint it controls, and mint to the operator.
///
/// The operator identity comes from the Solana CLI config at its default
/// location.
#[derive(StructOpt, Debug)]
#[structopt(name = "quorum-mint")]
struct Opt {
    /// Number of tokens to mint to the operator [default: 100]
    #[structopt(long)]
    amount: Option<u64>,

    /// Write a JSON report of the run to this file.
    #[structopt(long, parse(from_os_str))]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opt = Opt::from_args();

    let identity = identity::resolve(None);
    match &identity {
        ResolvedIdentity::Configured { keypair_path, .. } => {
            println!("Operator identity loaded from {}", keypair_path);
        }
        ResolvedIdentity::Ephemeral { reason, .. } => {
            println!("Operator identity is ephemeral: {}", reason);
            warn!(
                "operator {} is unfunded; transactions it pays for will be rejected",
                identity.keypair().pubkey()
            );
        }
    }

    let ledger = rpc::connect(RPC_URL)?;

    let amount = opt.amount.unwrap_or(workflow::DEFAULT_MINT_AMOUNT);
    let ctx = WorkflowContext::new(identity.into_keypair(), amount);
    let report = workflow::run(&ledger, ctx)?;

    println!("{}", report);

    if let Some(path) = &opt.report {
        write_report(path, &report)?;
        info!("report written to {}", path.display());
    }

    Ok(())
}

fn write_report(path: &Path, report: &WorkflowReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("unable to create report file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| anyhow!("{}", e))?;
    writer.flush()?;

    Ok(())
}
