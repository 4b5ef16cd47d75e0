// src/lib.rs
pub mod adapters;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod ops;
pub mod service;
pub mod statement;
pub mod transaction;
pub mod wallet;

pub use catalog::{Catalog, CatalogItem, MemoryCatalog};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use notify::{LedgerEvent, NotificationSink};
pub use ops::{ExecutionPlan, Operation};
pub use service::{Ledger, PurchaseOutcome};
pub use statement::Statement;
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use wallet::{Pool, Wallet};

use async_trait::async_trait;
use uuid::Uuid;

/// External platform transaction ids are stored hashed; the unique key over
/// the hash is what makes top-ups idempotent.
pub(crate) fn hash_platform_tx(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

/// Storage adapter trait
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Execute the complete operation plan atomically.
    /// Implementors MUST:
    /// 1. BEGIN a storage transaction
    /// 2. Lock the wallet pools named in `locks`
    /// 3. Verify each pool covers its required amount inside the lock;
    ///    return InsufficientFunds if not
    /// 4. Execute all operations
    /// 5. COMMIT on success, ROLLBACK on any error
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        locks: &[(Uuid, Pool, u64)],
    ) -> Result<(), LedgerError>;

    // READ OPERATIONS

    /// Strict read; fails with WalletNotFound for users that have never
    /// transacted.
    async fn get_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError>;
    /// Read that persists a zero wallet on first access.
    async fn ensure_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError>;
    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, LedgerError>;
    /// Entries for one user, newest first, in durable commit order.
    async fn transactions_for_user(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError>;
    /// Fails with DuplicateTransaction if the hashed platform key is already
    /// recorded.
    async fn check_platform_tx(&self, key_hash: &str) -> Result<(), LedgerError>;
}
