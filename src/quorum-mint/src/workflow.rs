//! The end-to-end run: provision a 2-of-2 multisig of the operator and a
//! freshly generated co-signer, create a mint controlled by it, and mint to
//! the operator's associated token account.
//!
//! Steps run strictly in order and the run stops at the first failure.
//! Nothing already confirmed is undone.

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use spl_associated_token_account::get_associated_token_address;
use std::fmt;

use crate::ledger::{get_token_account, Ledger};
use crate::mint::create_mint;
use crate::mint_to::mint_to;
use crate::multisig::{create_multisig, MultisigAuthority};

pub const DEFAULT_MINT_AMOUNT: u64 = 100;
pub const MULTISIG_THRESHOLD: u8 = 2;

pub struct WorkflowContext {
    pub operator: Keypair,
    pub co_signer: Keypair,
    pub amount: u64,
    pub multisig: Option<Pubkey>,
    pub mint: Option<Pubkey>,
    pub transactions: Vec<StepRecord>,
}

impl WorkflowContext {
    pub fn new(operator: Keypair, amount: u64) -> WorkflowContext {
        WorkflowContext {
            operator,
            co_signer: Keypair::new(),
            amount,
            multisig: None,
            mint: None,
            transactions: vec![],
        }
    }

    fn record(&mut self, step: &'static str, signature: Signature) {
        info!("{}: {}", step, signature);
        self.transactions.push(StepRecord { step, signature });
    }

    fn require_multisig(&self) -> Result<Pubkey> {
        self.multisig
            .ok_or_else(|| anyhow!("multisig has not been provisioned"))
    }

    fn require_mint(&self) -> Result<Pubkey> {
        self.mint.ok_or_else(|| anyhow!("mint has not been provisioned"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: &'static str,
    pub signature: Signature,
}

pub type Step = fn(&dyn Ledger, WorkflowContext) -> Result<WorkflowContext>;

pub const STEPS: &[(&str, Step)] = &[
    ("create multisig", provision_multisig),
    ("create mint", provision_mint),
    ("mint to recipient", mint_to_operator),
];

fn provision_multisig(ledger: &dyn Ledger, mut ctx: WorkflowContext) -> Result<WorkflowContext> {
    let authority = MultisigAuthority::new(
        vec![ctx.operator.pubkey(), ctx.co_signer.pubkey()],
        MULTISIG_THRESHOLD,
    )?;
    let multisig_account = Keypair::new();

    let signature = create_multisig(ledger, &ctx.operator, &authority, &multisig_account)?;

    ctx.multisig = Some(multisig_account.pubkey());
    ctx.record("create multisig", signature);
    Ok(ctx)
}

fn provision_mint(ledger: &dyn Ledger, mut ctx: WorkflowContext) -> Result<WorkflowContext> {
    let multisig = ctx.require_multisig()?;
    let mint_account = Keypair::new();

    let signature = create_mint(ledger, &ctx.operator, &mint_account, &multisig)?;

    ctx.mint = Some(mint_account.pubkey());
    ctx.record("create mint", signature);
    Ok(ctx)
}

fn mint_to_operator(ledger: &dyn Ledger, mut ctx: WorkflowContext) -> Result<WorkflowContext> {
    let multisig = ctx.require_multisig()?;
    let mint = ctx.require_mint()?;

    let signature = mint_to(
        ledger,
        &mint,
        &ctx.operator.pubkey(),
        ctx.amount,
        &multisig,
        &[&ctx.operator, &ctx.co_signer],
    )?;

    ctx.record("mint to recipient", signature);
    Ok(ctx)
}

/// Runs every step in [`STEPS`] against `ledger`.
pub fn run(ledger: &dyn Ledger, ctx: WorkflowContext) -> Result<WorkflowReport> {
    run_steps(ledger, ctx, STEPS)
}

pub fn run_steps(
    ledger: &dyn Ledger,
    mut ctx: WorkflowContext,
    steps: &[(&str, Step)],
) -> Result<WorkflowReport> {
    info!("operator: {}", ctx.operator.pubkey());
    info!("co-signer: {}", ctx.co_signer.pubkey());

    for (name, step) in steps {
        info!("step: {}", name);
        ctx = step(ledger, ctx).with_context(|| format!("step '{}' failed", name))?;
    }

    WorkflowReport::collect(ledger, &ctx)
}

/// What a run did, for the operator.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub operator: String,
    pub co_signer: String,
    pub multisig: Option<String>,
    pub mint: Option<String>,
    pub recipient_token_account: Option<String>,
    pub recipient_balance: Option<u64>,
    pub transactions: Vec<ReportedTransaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportedTransaction {
    pub step: String,
    pub signature: String,
}

impl WorkflowReport {
    fn collect(ledger: &dyn Ledger, ctx: &WorkflowContext) -> Result<WorkflowReport> {
        let operator = ctx.operator.pubkey();

        let (recipient_token_account, recipient_balance) = match ctx.mint {
            Some(mint) => {
                let address = get_associated_token_address(&operator, &mint);
                let balance = get_token_account(ledger, &address)?.map(|account| account.amount);
                (Some(address.to_string()), balance)
            }
            None => (None, None),
        };

        Ok(WorkflowReport {
            operator: operator.to_string(),
            co_signer: ctx.co_signer.pubkey().to_string(),
            multisig: ctx.multisig.map(|key| key.to_string()),
            mint: ctx.mint.map(|key| key.to_string()),
            recipient_token_account,
            recipient_balance,
            transactions: ctx
                .transactions
                .iter()
                .map(|record| ReportedTransaction {
                    step: record.step.to_string(),
                    signature: record.signature.to_string(),
                })
                .collect(),
        })
    }
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let none = "-".to_string();
        writeln!(f, "Quorum mint run")?;
        writeln!(f, "  Operator:        {}", self.operator)?;
        writeln!(f, "  Co-signer:       {}", self.co_signer)?;
        writeln!(f, "  Multisig:        {}", self.multisig.as_ref().unwrap_or(&none))?;
        writeln!(f, "  Mint:            {}", self.mint.as_ref().unwrap_or(&none))?;
        writeln!(
            f,
            "  Token account:   {}",
            self.recipient_token_account.as_ref().unwrap_or(&none)
        )?;
        match self.recipient_balance {
            Some(balance) => writeln!(f, "  Balance:         {}", balance)?,
            None => writeln!(f, "  Balance:         {}", none)?,
        }
        for tx in &self.transactions {
            writeln!(f, "  {:<17}{}", format!("{}:", tx.step), tx.signature)?;
        }
        Ok(())
    }
}
