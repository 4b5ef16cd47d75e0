// src/service.rs
use crate::{
    Catalog, ExecutionPlan, LedgerConfig, LedgerError, LedgerEvent, NotificationSink, Operation,
    Statement, Transaction, TransactionKind, Wallet, WalletStore, hash_platform_tx,
};
use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

/// Result of a successful catalog purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub remaining_balance: u64,
    pub transaction: Transaction,
}

/// The ledger service. Owns no state beyond its collaborators; every
/// mutation is compiled into an `ExecutionPlan` and committed atomically by
/// the store.
pub struct Ledger {
    store: Arc<dyn WalletStore>,
    catalog: Arc<dyn Catalog>,
    notifier: Option<Arc<dyn NotificationSink>>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: Arc<dyn WalletStore>, catalog: Arc<dyn Catalog>, config: LedgerConfig) -> Self {
        Self {
            store,
            catalog,
            notifier: None,
            config,
        }
    }

    pub fn with_notifier(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(sink);
        self
    }

    pub fn store(&self) -> &dyn WalletStore {
        self.store.as_ref()
    }

    /// Current wallet snapshot, creating a zero wallet on first access.
    pub async fn get_balance(&self, user: Uuid) -> Result<Wallet, LedgerError> {
        self.store.ensure_wallet(user).await
    }

    /// Peer-to-peer gift: debit sender balance, credit receiver earnings,
    /// append both ledger entries, all in one atomic scope. Returns the new
    /// sender balance.
    pub async fn transfer(
        &self,
        sender: Uuid,
        receiver: Uuid,
        amount: u64,
        memo: impl Into<String>,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        if sender == receiver {
            return Err(LedgerError::SelfTransfer);
        }

        let memo = memo.into();
        let mut plan = ExecutionPlan::new();
        plan.add(Operation::DebitBalance {
            user: sender,
            amount,
        });
        plan.add(Operation::CreditEarnings {
            user: receiver,
            amount,
        });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                sender,
                TransactionKind::GiftSent,
                -(amount as i64),
                Some(receiver),
                memo.clone(),
                None,
            ),
        });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                receiver,
                TransactionKind::GiftReceived,
                amount as i64,
                Some(sender),
                memo,
                None,
            ),
        });

        self.execute(&plan).await?;

        self.emit(LedgerEvent::GiftReceived {
            from: sender,
            to: receiver,
            amount,
        })
        .await;

        Ok(self.store.get_wallet(sender).await?.balance)
    }

    /// Admin-issued credit. Grants manufacture coins, so there is no debit
    /// counterpart; only the non-negativity invariant applies. Returns the
    /// new balance.
    pub async fn grant(
        &self,
        admin: Uuid,
        user: Uuid,
        amount: u64,
        reason: impl Into<String>,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::CreditBalance { user, amount });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                user,
                TransactionKind::AdminGrant,
                amount as i64,
                Some(admin),
                reason.into(),
                None,
            ),
        });

        self.execute(&plan).await?;

        self.emit(LedgerEvent::CoinsGranted { user, amount }).await;

        Ok(self.store.get_wallet(user).await?.balance)
    }

    /// Store coin-pack settlement, idempotent on the external transaction id.
    /// Applying the same id twice fails with `DuplicateTransaction`.
    pub async fn top_up(
        &self,
        user: Uuid,
        amount: u64,
        external_tx: &str,
    ) -> Result<Wallet, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let key = hash_platform_tx(external_tx);

        // Advisory pre-flight — the unique key inside execute_plan is the
        // real guard against concurrent duplicates
        self.store.check_platform_tx(&key).await?;

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::CreditBalance { user, amount });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                user,
                TransactionKind::Purchase,
                amount as i64,
                None,
                "coin pack settlement".to_string(),
                Some(key),
            ),
        });

        self.execute(&plan).await?;

        self.emit(LedgerEvent::CoinsPurchased { user, amount }).await;

        self.store.get_wallet(user).await
    }

    /// Spend balance on a catalog item. The debit and the ownership grant
    /// span two aggregates: if recording ownership fails after the debit
    /// committed, the debit is compensated with a refund.
    pub async fn purchase(
        &self,
        user: Uuid,
        item_id: &str,
    ) -> Result<PurchaseOutcome, LedgerError> {
        let item = self.catalog.item(item_id).await?;
        if self.catalog.is_owned(user, item_id).await? {
            return Err(LedgerError::AlreadyOwned);
        }
        if item.exclusive {
            return Err(LedgerError::NotPurchasable);
        }
        if item.price == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let transaction = Transaction::new(
            user,
            TransactionKind::Purchase,
            -(item.price as i64),
            None,
            format!("item {}", item.id),
            None,
        );

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::DebitBalance {
            user,
            amount: item.price,
        });
        plan.add(Operation::RecordTransaction {
            transaction: transaction.clone(),
        });

        self.execute(&plan).await?;

        if let Err(cause) = self.catalog.grant_ownership(user, item_id).await {
            return Err(self.compensate_purchase(user, &transaction, cause).await);
        }

        self.emit(LedgerEvent::ItemPurchased {
            user,
            item_id: item.id,
            price: item.price,
        })
        .await;

        Ok(PurchaseOutcome {
            remaining_balance: self.store.get_wallet(user).await?.balance,
            transaction,
        })
    }

    /// The debit committed but the catalog rejected the ownership grant:
    /// refund the debit so the user is not charged without the item.
    async fn compensate_purchase(
        &self,
        user: Uuid,
        original: &Transaction,
        cause: LedgerError,
    ) -> LedgerError {
        let mut plan = ExecutionPlan::new();
        plan.add(Operation::MarkRefunded {
            transaction_id: original.id,
        });
        plan.add(Operation::CreditBalance {
            user,
            amount: original.amount.unsigned_abs(),
        });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                user,
                TransactionKind::Refund,
                -original.amount,
                None,
                format!("reversal of {}", original.id),
                None,
            ),
        });

        if let Err(compensation_err) = self.execute(&plan).await {
            // The one path where human intervention is the fallback: the user
            // is charged without the item and the refund did not land.
            error!(
                user = %user,
                transaction = %original.id,
                error = %compensation_err,
                "purchase compensation failed; manual reconciliation required"
            );
        }

        cause
    }

    /// Admin-issued reversal of a completed entry. Marks the original
    /// refunded, applies the opposite delta to the balance pool, and appends
    /// a compensating entry. One-way: refunds are themselves not refundable.
    pub async fn refund(&self, transaction_id: Uuid) -> Result<Transaction, LedgerError> {
        let original = self.store.get_transaction(transaction_id).await?;
        if original.kind == TransactionKind::Refund || !original.status.is_refundable() {
            return Err(LedgerError::NotRefundable);
        }

        let compensation = -original.amount;

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::MarkRefunded { transaction_id });
        if compensation > 0 {
            plan.add(Operation::CreditBalance {
                user: original.user,
                amount: compensation as u64,
            });
        } else {
            // Clawing back a credit; fails with InsufficientFunds if the
            // coins were already spent elsewhere.
            plan.add(Operation::DebitBalance {
                user: original.user,
                amount: compensation.unsigned_abs(),
            });
        }
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                original.user,
                TransactionKind::Refund,
                compensation,
                original.related_user,
                format!("reversal of {}", original.id),
                None,
            ),
        });

        self.execute(&plan).await?;

        self.emit(LedgerEvent::TransactionRefunded {
            user: original.user,
            transaction_id,
            amount: compensation,
        })
        .await;

        self.store.get_transaction(transaction_id).await
    }

    /// Cash accrued earnings out of the wallet. Returns the new earnings
    /// pool.
    pub async fn withdraw(
        &self,
        user: Uuid,
        amount: u64,
        memo: impl Into<String>,
    ) -> Result<u64, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::DebitEarnings { user, amount });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                user,
                TransactionKind::Withdrawal,
                -(amount as i64),
                None,
                memo.into(),
                None,
            ),
        });

        self.execute(&plan).await?;

        self.emit(LedgerEvent::EarningsWithdrawn { user, amount })
            .await;

        Ok(self.store.get_wallet(user).await?.earnings)
    }

    /// A user's ledger history, newest first, capped at the configured page
    /// size.
    pub async fn list_transactions(
        &self,
        user: Uuid,
        limit: usize,
    ) -> Result<Statement, LedgerError> {
        let limit = limit.min(self.config.max_page_size);
        let entries = self.store.transactions_for_user(user, limit).await?;
        Ok(Statement::new(entries))
    }

    /// Conflict-retry wrapper around the store's atomic executor. Only
    /// transient conflicts are retried; business rejections return
    /// immediately.
    async fn execute(&self, plan: &ExecutionPlan) -> Result<(), LedgerError> {
        let locks = plan.calculate_locks();

        for operation in plan.operations() {
            if let Operation::RecordTransaction { transaction } = operation {
                histogram!("wallet.transaction.amount", "kind" => transaction.kind.as_str())
                    .record(transaction.amount.unsigned_abs() as f64);
            }
        }

        let mut attempt = 0u32;
        let result = loop {
            match self.store.execute_plan(plan, &locks).await {
                Err(err) if err.is_transient() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "plan hit a write conflict, retrying");
                    tokio::time::sleep(self.config.conflict_backoff * attempt).await;
                }
                other => break other,
            }
        };

        counter!("wallet.plans.total",
            "status" => if result.is_ok() { "success" } else { "failed" }
        )
        .increment(1);

        result
    }

    async fn emit(&self, event: LedgerEvent) {
        if let Some(sink) = &self.notifier {
            if let Err(e) = sink.notify(event).await {
                warn!(error = %e, "notification sink rejected event");
            }
        }
    }
}
