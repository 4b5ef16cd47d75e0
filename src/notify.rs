// src/notify.rs
use crate::LedgerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Human-facing events pushed after a ledger mutation commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    GiftReceived {
        from: Uuid,
        to: Uuid,
        amount: u64,
    },
    CoinsGranted {
        user: Uuid,
        amount: u64,
    },
    CoinsPurchased {
        user: Uuid,
        amount: u64,
    },
    ItemPurchased {
        user: Uuid,
        item_id: String,
        price: u64,
    },
    EarningsWithdrawn {
        user: Uuid,
        amount: u64,
    },
    TransactionRefunded {
        user: Uuid,
        transaction_id: Uuid,
        amount: i64,
    },
}

/// Fire-and-forget notification channel. The service calls `notify` only
/// after the mutation committed; an `Err` here is logged and swallowed,
/// never rolled back into the ledger result.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: LedgerEvent) -> Result<(), LedgerError>;
}
