use crate::{
    ExecutionPlan, LedgerError, Operation, Pool, Transaction, TransactionKind, TransactionStatus,
    Wallet, WalletStore,
};
use sqlx::Row;
use uuid::Uuid;

pub trait PostgresWalletStore {
    fn get_pool(&self) -> sqlx::PgPool;
}

/// Ready-made store around a connection pool.
pub struct PgWalletStore {
    pool: sqlx::PgPool,
}

impl PgWalletStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

impl PostgresWalletStore for PgWalletStore {
    fn get_pool(&self) -> sqlx::PgPool {
        self.pool.clone()
    }
}

#[async_trait::async_trait]
pub trait PostgresSchemaWalletStore {
    /// Initialize the wallet and transaction tables. Call once at boot.
    async fn init_wallet_schema(&self) -> Result<(), LedgerError>;
}

#[async_trait::async_trait]
impl<T> PostgresSchemaWalletStore for T
where
    T: PostgresWalletStore + Send + Sync,
{
    async fn init_wallet_schema(&self) -> Result<(), LedgerError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        // Wallets table; the CHECKs backstop the in-lock floor checks
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                user_id UUID PRIMARY KEY,
                balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
                earnings BIGINT NOT NULL DEFAULT 0 CHECK (earnings >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        // Transactions table; platform_tx is the hashed external id and its
        // UNIQUE key is what makes top-ups idempotent
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_transactions (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('purchase', 'gift_sent', 'gift_received', 'admin_grant', 'withdrawal', 'refund')),
                amount BIGINT NOT NULL,
                related_user UUID,
                platform_tx TEXT UNIQUE,
                description TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed', 'refunded')),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_wallet_transactions_user_created
            ON wallet_transactions(user_id, created_at DESC)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(())
    }
}

fn map_db_err(e: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return LedgerError::DuplicateTransaction(
                db.constraint().unwrap_or("unique").to_string(),
            );
        }
        if db.is_check_violation() {
            return LedgerError::InsufficientFunds;
        }
        // 40001 serialization_failure, 40P01 deadlock_detected: retry
        // material, not logic errors
        if matches!(db.code().as_deref(), Some("40001") | Some("40P01")) {
            return LedgerError::Conflict(db.message().to_string());
        }
    }
    LedgerError::Storage(e.to_string())
}

fn row_to_transaction(row: &sqlx::postgres::PgRow) -> Result<Transaction, LedgerError> {
    let kind_str: String = row
        .try_get("kind")
        .map_err(|e| LedgerError::Storage(e.to_string()))?;
    let kind = TransactionKind::parse(&kind_str)
        .ok_or_else(|| LedgerError::Storage(format!("unknown transaction kind: {}", kind_str)))?;

    let status_str: String = row
        .try_get("status")
        .map_err(|e| LedgerError::Storage(e.to_string()))?;
    let status = TransactionStatus::parse(&status_str)
        .ok_or_else(|| LedgerError::Storage(format!("unknown transaction status: {}", status_str)))?;

    Ok(Transaction {
        id: row
            .try_get("id")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        user: row
            .try_get("user_id")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        kind,
        amount: row
            .try_get("amount")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        related_user: row
            .try_get("related_user")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        platform_tx: row
            .try_get("platform_tx")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
        status,
        created_at: row
            .try_get("created_at")
            .map_err(|e| LedgerError::Storage(e.to_string()))?,
    })
}

#[async_trait::async_trait]
trait PostgresInternalWalletStore {
    async fn lock_wallet_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
    ) -> Result<(u64, u64), LedgerError>;

    async fn credit_pool_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        pool: Pool,
        amount: u64,
    ) -> Result<(), LedgerError>;

    async fn debit_pool_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        pool: Pool,
        amount: u64,
    ) -> Result<(), LedgerError>;

    async fn record_transaction_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: Transaction,
    ) -> Result<(), LedgerError>;

    async fn mark_refunded_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction_id: Uuid,
    ) -> Result<(), LedgerError>;
}

#[async_trait::async_trait]
impl<T> PostgresInternalWalletStore for T
where
    T: PostgresWalletStore + Send + Sync,
{
    async fn lock_wallet_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
    ) -> Result<(u64, u64), LedgerError> {
        // Vivify first so there is always a row to lock
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;

        let row = sqlx::query(
            r#"
            SELECT balance, earnings
            FROM wallets
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_db_err)?;

        let balance: i64 = row
            .try_get("balance")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let earnings: i64 = row
            .try_get("earnings")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok((balance as u64, earnings as u64))
    }

    async fn credit_pool_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        pool: Pool,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let query = match pool {
            Pool::Balance => {
                r#"
                INSERT INTO wallets (user_id, balance, earnings) VALUES ($1, $2, 0)
                ON CONFLICT (user_id) DO UPDATE
                SET balance = wallets.balance + EXCLUDED.balance, updated_at = NOW()
                "#
            }
            Pool::Earnings => {
                r#"
                INSERT INTO wallets (user_id, balance, earnings) VALUES ($1, 0, $2)
                ON CONFLICT (user_id) DO UPDATE
                SET earnings = wallets.earnings + EXCLUDED.earnings, updated_at = NOW()
                "#
            }
        };

        sqlx::query(query)
            .bind(user)
            .bind(amount as i64)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn debit_pool_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user: Uuid,
        pool: Pool,
        amount: u64,
    ) -> Result<(), LedgerError> {
        // The row is already locked and floor-checked; the CHECK constraint
        // backstops
        let query = match pool {
            Pool::Balance => {
                "UPDATE wallets SET balance = balance - $2, updated_at = NOW() WHERE user_id = $1"
            }
            Pool::Earnings => {
                "UPDATE wallets SET earnings = earnings - $2, updated_at = NOW() WHERE user_id = $1"
            }
        };

        sqlx::query(query)
            .bind(user)
            .bind(amount as i64)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn record_transaction_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction: Transaction,
    ) -> Result<(), LedgerError> {
        let platform_tx = transaction.platform_tx.clone();

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, user_id, kind, amount, related_user, platform_tx, description, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id)
        .bind(transaction.user)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(transaction.related_user)
        .bind(&transaction.platform_tx)
        .bind(&transaction.description)
        .bind(transaction.status.as_str())
        .bind(transaction.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match map_db_err(e) {
            LedgerError::DuplicateTransaction(_) => {
                LedgerError::DuplicateTransaction(platform_tx.unwrap_or_default())
            }
            other => other,
        })?;

        Ok(())
    }

    async fn mark_refunded_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        transaction_id: Uuid,
    ) -> Result<(), LedgerError> {
        let row = sqlx::query("SELECT status FROM wallet_transactions WHERE id = $1 FOR UPDATE")
            .bind(transaction_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_db_err)?
            .ok_or(LedgerError::TransactionNotFound)?;

        let status_str: String = row
            .try_get("status")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let status = TransactionStatus::parse(&status_str).ok_or_else(|| {
            LedgerError::Storage(format!("unknown transaction status: {}", status_str))
        })?;

        if !status.is_refundable() {
            return Err(LedgerError::NotRefundable);
        }

        sqlx::query("UPDATE wallet_transactions SET status = 'refunded' WHERE id = $1")
            .bind(transaction_id)
            .execute(&mut **tx)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl<T> WalletStore for T
where
    T: PostgresWalletStore + PostgresInternalWalletStore + Send + Sync,
{
    async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        locks: &[(Uuid, Pool, u64)],
    ) -> Result<(), LedgerError> {
        let mut tx = self
            .get_pool()
            .begin()
            .await
            .map_err(map_db_err)?;

        // ── Phase 1: Lock & verify ─────────────────────────────────────────
        for (user, pool, required) in locks {
            let (balance, earnings) = self.lock_wallet_tx(&mut tx, *user).await?;
            let available = match pool {
                Pool::Balance => balance,
                Pool::Earnings => earnings,
            };

            // Checked INSIDE the lock — this is the real double-spend guard
            if available < *required {
                tx.rollback().await.ok();
                return Err(LedgerError::InsufficientFunds);
            }
        }

        // ── Phase 2: Execute operations ────────────────────────────────────
        for op in plan.operations() {
            match op {
                Operation::DebitBalance { user, amount } => {
                    self.debit_pool_tx(&mut tx, *user, Pool::Balance, *amount)
                        .await?;
                }
                Operation::CreditBalance { user, amount } => {
                    self.credit_pool_tx(&mut tx, *user, Pool::Balance, *amount)
                        .await?;
                }
                Operation::DebitEarnings { user, amount } => {
                    self.debit_pool_tx(&mut tx, *user, Pool::Earnings, *amount)
                        .await?;
                }
                Operation::CreditEarnings { user, amount } => {
                    self.credit_pool_tx(&mut tx, *user, Pool::Earnings, *amount)
                        .await?;
                }
                Operation::RecordTransaction { transaction } => {
                    self.record_transaction_tx(&mut tx, transaction.clone())
                        .await?;
                }
                Operation::MarkRefunded { transaction_id } => {
                    self.mark_refunded_tx(&mut tx, *transaction_id).await?;
                }
            }
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(())
    }

    async fn get_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, balance, earnings, updated_at
            FROM wallets
            WHERE user_id = $1
            "#,
        )
        .bind(user)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or(LedgerError::WalletNotFound(user))?;

        Ok(Wallet {
            user: row
                .try_get("user_id")
                .map_err(|e| LedgerError::Storage(e.to_string()))?,
            balance: row
                .try_get::<i64, _>("balance")
                .map_err(|e| LedgerError::Storage(e.to_string()))? as u64,
            earnings: row
                .try_get::<i64, _>("earnings")
                .map_err(|e| LedgerError::Storage(e.to_string()))? as u64,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| LedgerError::Storage(e.to_string()))?,
        })
    }

    async fn ensure_wallet(&self, user: Uuid) -> Result<Wallet, LedgerError> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user)
            .execute(&self.get_pool())
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        self.get_wallet(user).await
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Transaction, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, related_user, platform_tx, description, status, created_at
            FROM wallet_transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.get_pool())
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .ok_or(LedgerError::TransactionNotFound)?;

        row_to_transaction(&row)
    }

    async fn transactions_for_user(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, amount, related_user, platform_tx, description, status, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user)
        .bind(limit as i64)
        .fetch_all(&self.get_pool())
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn check_platform_tx(&self, key_hash: &str) -> Result<(), LedgerError> {
        let existing = sqlx::query("SELECT 1 FROM wallet_transactions WHERE platform_tx = $1")
            .bind(key_hash)
            .fetch_optional(&self.get_pool())
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        if existing.is_some() {
            return Err(LedgerError::DuplicateTransaction(key_hash.to_string()));
        }

        Ok(())
    }
}
