// src/adapters/memory.rs
use crate::{
    ExecutionPlan, LedgerError, Operation, Pool, Transaction, TransactionStatus, Wallet,
    WalletStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Clone, Default)]
struct Store {
    wallets: HashMap<Uuid, Wallet>,
    /// Append-only, in durable commit order
    transactions: Vec<Transaction>,
    platform_keys: HashSet<String>,
}

impl Store {
    fn wallet_mut(&mut self, user: Uuid) -> &mut Wallet {
        let wallet = self.wallets.entry(user).or_insert_with(|| Wallet::new(user));
        wallet.updated_at = Utc::now();
        wallet
    }

    fn apply(&mut self, plan: &ExecutionPlan, locks: &[(Uuid, Pool, u64)]) -> Result<(), LedgerError> {
        // The caller holds the store mutex, so check-then-apply is atomic
        // here; this is the floor check the contract requires inside the
        // lock.
        for (user, pool, required) in locks {
            let available = self.wallets.get(user).map(|w| w.pool(*pool)).unwrap_or(0);
            if available < *required {
                return Err(LedgerError::InsufficientFunds);
            }
        }

        for op in plan.operations() {
            match op {
                Operation::DebitBalance { user, amount } => {
                    let wallet = self.wallet_mut(*user);
                    wallet.balance = wallet
                        .balance
                        .checked_sub(*amount)
                        .ok_or(LedgerError::InsufficientFunds)?;
                }
                Operation::CreditBalance { user, amount } => {
                    let wallet = self.wallet_mut(*user);
                    wallet.balance += amount;
                }
                Operation::DebitEarnings { user, amount } => {
                    let wallet = self.wallet_mut(*user);
                    wallet.earnings = wallet
                        .earnings
                        .checked_sub(*amount)
                        .ok_or(LedgerError::InsufficientFunds)?;
                }
                Operation::CreditEarnings { user, amount } => {
                    let wallet = self.wallet_mut(*user);
                    wallet.earnings += amount;
                }
                Operation::RecordTransaction { transaction } => {
                    if let Some(key) = &transaction.platform_tx {
                        if !self.platform_keys.insert(key.clone()) {
                            return Err(LedgerError::DuplicateTransaction(key.clone()));
                        }
                    }
                    self.transactions.push(transaction.clone());
                }
                Operation::MarkRefunded { transaction_id } => {
                    let entry = self
                        .transactions
                        .iter_mut()
                        .find(|t| t.id == *transaction_id)
                        .ok_or(LedgerError::TransactionNotFound)?;
                    if !entry.status.is_refundable() {
                        return Err(LedgerError::NotRefundable);
                    }
                    entry.status = TransactionStatus::Refunded;
                }
            }
        }

        Ok(())
    }
}

/// In-memory store for tests and embedded use. A single mutex serializes
/// plans; each plan is staged on a copy of the state and swapped in only
/// when every operation succeeded, so a failed plan leaves nothing applied.
pub struct MemoryStore {
    inner: Mutex<Store>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Store::default()),
        }
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        locks: &[(Uuid, Pool, u64)],
    ) -> Result<(), LedgerError> {
        let mut guard = self.inner.lock().unwrap();

        let mut staged = guard.clone();
        staged.apply(plan, locks)?;

        *guard = staged;
        Ok(())
    }

    async fn get_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError> {
        let guard = self.inner.lock().unwrap();
        guard
            .wallets
            .get(&user)
            .cloned()
            .ok_or(LedgerError::WalletNotFound(user))
    }

    async fn ensure_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError> {
        let mut guard = self.inner.lock().unwrap();
        Ok(guard
            .wallets
            .entry(user)
            .or_insert_with(|| Wallet::new(user))
            .clone())
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, LedgerError> {
        let guard = self.inner.lock().unwrap();
        guard
            .transactions
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound)
    }

    async fn transactions_for_user(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let guard = self.inner.lock().unwrap();
        Ok(guard
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user == user)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn check_platform_tx(&self, key_hash: &str) -> Result<(), LedgerError> {
        let guard = self.inner.lock().unwrap();
        if guard.platform_keys.contains(key_hash) {
            return Err(LedgerError::DuplicateTransaction(key_hash.to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
