//! In-memory ledger for unit tests.
//!
//! Token and associated-token-account instructions run through the on-chain
//! processors shipped in `spl-token` and `spl-associated-token-account`, with
//! cross-program invocation, return data and the rent sysvar served through
//! `SyscallStubs`. Only the system program is implemented here, and only the
//! instructions those processors and the workflow use.
//!
//! Each transaction runs against a scratch copy of the account map which is
//! committed only when every instruction succeeds.

use log::debug;
use solana_sdk::account::{create_account_for_test, Account};
use solana_sdk::account_info::AccountInfo;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::entrypoint::{ProgramResult, SUCCESS};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_error::ProgramError;
use solana_sdk::program_stubs::{self, SyscallStubs};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::rent::Rent;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction::{SystemError, SystemInstruction, MAX_PERMITTED_DATA_LENGTH};
use solana_sdk::system_program;
use solana_sdk::sysvar;
use solana_sdk::transaction::VersionedTransaction;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Once;

use crate::error::LedgerError;
use crate::ledger::{Ledger, LedgerResult, TransactionStatus};

const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
const BLOCKHASH_VALIDITY: u64 = 150;

type ExecResult = Result<(), String>;
type ProcessInstruction = fn(&Pubkey, &[AccountInfo], &[u8]) -> ProgramResult;

thread_local! {
    static INVOKE_STACK: RefCell<Vec<Pubkey>> = RefCell::new(Vec::new());
    static RETURN_DATA: RefCell<Option<(Pubkey, Vec<u8>)>> = RefCell::new(None);
}

struct State {
    accounts: HashMap<Pubkey, Account>,
    statuses: HashMap<Signature, TransactionStatus>,
    recent_blockhashes: HashSet<Hash>,
    blockhash: Hash,
    block_height: u64,
    drop_transactions: bool,
    connected: bool,
}

pub struct TestLedger {
    rent: Rent,
    state: RefCell<State>,
}

impl TestLedger {
    pub fn new() -> TestLedger {
        static STUBS: Once = Once::new();
        STUBS.call_once(|| {
            program_stubs::set_syscall_stubs(Box::new(TestSyscallStubs));
        });

        let rent = Rent::default();
        let blockhash = Hash::new_unique();
        let mut recent_blockhashes = HashSet::new();
        recent_blockhashes.insert(blockhash);
        let mut accounts = HashMap::new();
        accounts.insert(sysvar::rent::id(), create_account_for_test(&rent));

        TestLedger {
            rent,
            state: RefCell::new(State {
                accounts,
                statuses: HashMap::new(),
                recent_blockhashes,
                blockhash,
                block_height: 1,
                drop_transactions: false,
                connected: true,
            }),
        }
    }

    pub fn airdrop(&self, to: &Pubkey, lamports: u64) {
        let mut state = self.state.borrow_mut();
        let account = state
            .accounts
            .entry(*to)
            .or_insert_with(|| Account::new(0, 0, &system_program::id()));
        account.lamports += lamports;
    }

    pub fn lamports(&self, pubkey: &Pubkey) -> u64 {
        self.state
            .borrow()
            .accounts
            .get(pubkey)
            .map(|account| account.lamports)
            .unwrap_or(0)
    }

    pub fn account_exists(&self, pubkey: &Pubkey) -> bool {
        self.state.borrow().accounts.contains_key(pubkey)
    }

    pub fn is_confirmed(&self, signature: &Signature) -> bool {
        matches!(self.state.borrow().statuses.get(signature), Some(Ok(())))
    }

    pub fn transaction_count(&self) -> usize {
        self.state.borrow().statuses.len()
    }

    /// Accept transactions but never execute them, and let block height run
    /// past every blockhash window.
    pub fn drop_transactions(&self, drop: bool) {
        self.state.borrow_mut().drop_transactions = drop;
    }

    pub fn disconnect(&self) {
        self.state.borrow_mut().connected = false;
    }

    fn check_connected(&self) -> LedgerResult<()> {
        if self.state.borrow().connected {
            Ok(())
        } else {
            Err(LedgerError::Transport("connection refused".to_string()))
        }
    }

    fn execute(&self, tx: &VersionedTransaction) -> ExecResult {
        let message = &tx.message;
        let keys = message.static_account_keys();
        let num_signers = usize::from(message.header().num_required_signatures);

        if tx.signatures.len() != num_signers {
            return Err("signature count does not match message header".to_string());
        }
        if !tx.verify_with_results().into_iter().all(|ok| ok) {
            return Err("signature verification failed".to_string());
        }

        let mut accounts = self.state.borrow().accounts.clone();

        let payer = keys.first().ok_or("message has no fee payer")?;
        let fee = LAMPORTS_PER_SIGNATURE * num_signers as u64;
        let payer_account = accounts
            .get_mut(payer)
            .ok_or("fee payer account not found")?;
        if payer_account.lamports < fee {
            return Err("insufficient funds for fee".to_string());
        }
        payer_account.lamports -= fee;

        let mut loaded = keys
            .iter()
            .map(|key| {
                let account = accounts
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| Account::new(0, 0, &system_program::id()));
                (*key, account)
            })
            .collect::<Vec<_>>();

        let updated = {
            let infos = loaded
                .iter_mut()
                .enumerate()
                .map(|(i, (key, account))| {
                    AccountInfo::new(
                        key,
                        message.is_signer(i),
                        message.is_maybe_writable(i),
                        &mut account.lamports,
                        account.data.as_mut_slice(),
                        &account.owner,
                        account.executable,
                        account.rent_epoch,
                    )
                })
                .collect::<Vec<_>>();

            for (index, instruction) in message.instructions().iter().enumerate() {
                let program_id = keys
                    .get(usize::from(instruction.program_id_index))
                    .ok_or("invalid program index")?;
                let instruction_infos = instruction
                    .accounts
                    .iter()
                    .map(|&i| infos.get(usize::from(i)).cloned())
                    .collect::<Option<Vec<_>>>()
                    .ok_or("invalid account index")?;

                RETURN_DATA.with(|data| *data.borrow_mut() = None);
                invoke_program(program_id, &instruction_infos, &instruction.data)
                    .map_err(|e| format!("instruction {}: {}", index, e))?;
            }

            infos
                .iter()
                .map(|info| {
                    let account = Account {
                        lamports: info.lamports(),
                        data: info.data.borrow().to_vec(),
                        owner: *info.owner,
                        executable: info.executable,
                        rent_epoch: info.rent_epoch,
                    };
                    (*info.key, account)
                })
                .collect::<Vec<_>>()
        };

        for (key, account) in updated {
            if account.lamports == 0 && account.data.is_empty() {
                accounts.remove(&key);
            } else {
                accounts.insert(key, account);
            }
        }

        self.state.borrow_mut().accounts = accounts;

        Ok(())
    }
}

impl Ledger for TestLedger {
    fn commitment(&self) -> CommitmentConfig {
        CommitmentConfig::confirmed()
    }

    fn get_latest_blockhash(&self) -> LedgerResult<(Hash, u64)> {
        self.check_connected()?;
        let state = self.state.borrow();
        Ok((state.blockhash, state.block_height + BLOCKHASH_VALIDITY))
    }

    fn get_minimum_balance_for_rent_exemption(&self, data_len: usize) -> LedgerResult<u64> {
        self.check_connected()?;
        Ok(self.rent.minimum_balance(data_len))
    }

    fn send_transaction(&self, tx: &VersionedTransaction) -> LedgerResult<Signature> {
        self.check_connected()?;

        let signature = *tx
            .signatures
            .first()
            .ok_or_else(|| LedgerError::Rejected("transaction has no signatures".to_string()))?;

        if !self
            .state
            .borrow()
            .recent_blockhashes
            .contains(tx.message.recent_blockhash())
        {
            return Err(LedgerError::Rejected("blockhash not found".to_string()));
        }

        if self.state.borrow().drop_transactions {
            return Ok(signature);
        }

        self.execute(tx).map_err(LedgerError::Rejected)?;

        let mut state = self.state.borrow_mut();
        state.statuses.insert(signature, Ok(()));
        state.block_height += 1;
        state.blockhash = Hash::new_unique();
        let blockhash = state.blockhash;
        state.recent_blockhashes.insert(blockhash);

        Ok(signature)
    }

    fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<TransactionStatus>> {
        self.check_connected()?;
        Ok(self.state.borrow().statuses.get(signature).cloned())
    }

    fn get_block_height(&self) -> LedgerResult<u64> {
        self.check_connected()?;
        let mut state = self.state.borrow_mut();
        if state.drop_transactions {
            state.block_height += BLOCKHASH_VALIDITY + 1;
        }
        Ok(state.block_height)
    }

    fn get_account(&self, pubkey: &Pubkey) -> LedgerResult<Option<Account>> {
        self.check_connected()?;
        Ok(self.state.borrow().accounts.get(pubkey).cloned())
    }
}

fn processor_for(program_id: &Pubkey) -> Option<ProcessInstruction> {
    if *program_id == system_program::id() {
        Some(process_system_instruction as ProcessInstruction)
    } else if *program_id == spl_token::id() {
        Some(spl_token::processor::Processor::process as ProcessInstruction)
    } else if *program_id == spl_associated_token_account::id() {
        Some(spl_associated_token_account::processor::process_instruction as ProcessInstruction)
    } else {
        None
    }
}

fn invoke_program(program_id: &Pubkey, accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    let process = processor_for(program_id).ok_or(ProgramError::IncorrectProgramId)?;

    INVOKE_STACK.with(|stack| stack.borrow_mut().push(*program_id));
    let result = process(program_id, accounts, data);
    INVOKE_STACK.with(|stack| stack.borrow_mut().pop());

    result
}

fn current_program() -> Option<Pubkey> {
    INVOKE_STACK.with(|stack| stack.borrow().last().copied())
}

struct TestSyscallStubs;

impl SyscallStubs for TestSyscallStubs {
    fn sol_log(&self, message: &str) {
        debug!("{}", message);
    }

    fn sol_invoke_signed(
        &self,
        instruction: &Instruction,
        account_infos: &[AccountInfo],
        signers_seeds: &[&[&[u8]]],
    ) -> ProgramResult {
        let caller = current_program().ok_or(ProgramError::InvalidArgument)?;
        let derived_signers = signers_seeds
            .iter()
            .map(|seeds| Pubkey::create_program_address(seeds, &caller))
            .collect::<Result<Vec<_>, _>>()?;

        let mut callee_infos = Vec::with_capacity(instruction.accounts.len());
        for meta in &instruction.accounts {
            let info = account_infos
                .iter()
                .find(|info| *info.key == meta.pubkey)
                .ok_or(ProgramError::NotEnoughAccountKeys)?;

            if meta.is_signer && !info.is_signer && !derived_signers.contains(&meta.pubkey) {
                return Err(ProgramError::MissingRequiredSignature);
            }
            if meta.is_writable && !info.is_writable {
                return Err(ProgramError::InvalidArgument);
            }

            callee_infos.push(AccountInfo {
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
                ..info.clone()
            });
        }

        invoke_program(&instruction.program_id, &callee_infos, &instruction.data)
    }

    fn sol_get_rent_sysvar(&self, var_addr: *mut u8) -> u64 {
        unsafe {
            *(var_addr as *mut Rent) = Rent::default();
        }
        SUCCESS
    }

    fn sol_get_return_data(&self) -> Option<(Pubkey, Vec<u8>)> {
        RETURN_DATA.with(|data| data.borrow().clone())
    }

    fn sol_set_return_data(&self, data: &[u8]) {
        let program_id = current_program().unwrap_or_default();
        RETURN_DATA.with(|return_data| {
            *return_data.borrow_mut() = Some((program_id, data.to_vec()));
        });
    }
}

fn process_system_instruction(
    _program_id: &Pubkey,
    accounts: &[AccountInfo],
    data: &[u8],
) -> ProgramResult {
    let instruction: SystemInstruction =
        bincode::deserialize(data).map_err(|_| ProgramError::InvalidInstructionData)?;

    match instruction {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let (from, to) = two_accounts(accounts)?;
            if to.lamports() > 0 {
                return Err(system_error(SystemError::AccountAlreadyInUse));
            }
            allocate(to, space)?;
            assign(to, &owner)?;
            transfer(from, to, lamports)
        }
        SystemInstruction::Transfer { lamports } => {
            let (from, to) = two_accounts(accounts)?;
            transfer(from, to, lamports)
        }
        SystemInstruction::Allocate { space } => {
            let account = accounts.first().ok_or(ProgramError::NotEnoughAccountKeys)?;
            allocate(account, space)
        }
        SystemInstruction::Assign { owner } => {
            let account = accounts.first().ok_or(ProgramError::NotEnoughAccountKeys)?;
            assign(account, &owner)
        }
        _ => Err(ProgramError::InvalidInstructionData),
    }
}

fn two_accounts<'a, 'b>(
    accounts: &'a [AccountInfo<'b>],
) -> Result<(&'a AccountInfo<'b>, &'a AccountInfo<'b>), ProgramError> {
    match accounts {
        [first, second, ..] => Ok((first, second)),
        _ => Err(ProgramError::NotEnoughAccountKeys),
    }
}

fn system_error(err: SystemError) -> ProgramError {
    ProgramError::Custom(err as u32)
}

fn allocate(account: &AccountInfo, space: u64) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if !account.data_is_empty() || *account.owner != system_program::id() {
        return Err(system_error(SystemError::AccountAlreadyInUse));
    }
    if space > MAX_PERMITTED_DATA_LENGTH {
        return Err(system_error(SystemError::InvalidAccountDataLength));
    }

    // leaked; a test ledger lives for one test
    let data: &'static mut [u8] = Box::leak(vec![0; space as usize].into_boxed_slice());
    *account.try_borrow_mut_data()? = data;

    Ok(())
}

fn assign(account: &AccountInfo, owner: &Pubkey) -> ProgramResult {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if account.owner == owner {
        return Ok(());
    }
    if *account.owner != system_program::id() {
        return Err(ProgramError::IllegalOwner);
    }

    account.assign(owner);

    Ok(())
}

fn transfer(from: &AccountInfo, to: &AccountInfo, lamports: u64) -> ProgramResult {
    if !from.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    if !from.data_is_empty() {
        return Err(ProgramError::InvalidArgument);
    }
    if from.lamports() < lamports {
        return Err(system_error(SystemError::ResultWithNegativeLamports));
    }

    **from.try_borrow_mut_lamports()? -= lamports;
    let balance = to
        .lamports()
        .checked_add(lamports)
        .ok_or(ProgramError::InvalidArgument)?;
    **to.try_borrow_mut_lamports()? = balance;

    Ok(())
}
