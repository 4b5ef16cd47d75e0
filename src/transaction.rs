// src/transaction.rs
use crate::Pool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cause of a ledger entry's balance delta.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Store coin-pack settlement (positive) or catalog item spend (negative)
    Purchase,
    GiftSent,
    GiftReceived,
    AdminGrant,
    Withdrawal,
    Refund,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::GiftSent => "gift_sent",
            Self::GiftReceived => "gift_received",
            Self::AdminGrant => "admin_grant",
            Self::Withdrawal => "withdrawal",
            Self::Refund => "refund",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(Self::Purchase),
            "gift_sent" => Some(Self::GiftSent),
            "gift_received" => Some(Self::GiftReceived),
            "admin_grant" => Some(Self::AdminGrant),
            "withdrawal" => Some(Self::Withdrawal),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }

    /// Which wallet pool this kind settles against.
    pub fn pool(&self) -> Pool {
        match self {
            Self::GiftReceived | Self::Withdrawal => Pool::Earnings,
            _ => Pool::Balance,
        }
    }
}

/// State of a ledger entry.
/// Transitions are one-way: the only mutation a completed entry ever sees
/// is `Completed -> Refunded`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        match (self, target) {
            (s1, s2) if s1 == &s2 => true,
            // Pending settles or fails
            (TransactionStatus::Pending, TransactionStatus::Completed) => true,
            (TransactionStatus::Pending, TransactionStatus::Failed) => true,
            // Completed can only be reversed
            (TransactionStatus::Completed, TransactionStatus::Refunded) => true,
            // Failed and Refunded are terminal
            _ => false,
        }
    }

    /// Did this entry's delta actually apply to a wallet? A refunded entry
    /// applied and was later compensated by a separate refund entry.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Completed | Self::Refunded)
    }

    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Immutable ledger entry recording one signed pool delta and its cause.
/// Created atomically with the balance mutation it records; append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user: Uuid,
    pub kind: TransactionKind,
    /// Positive for credits, negative for debits
    pub amount: i64,
    /// Counterparty, when one exists (gift peer, granting admin)
    pub related_user: Option<Uuid>,
    /// Hashed external platform transaction id, unique per store. Present
    /// only on top-up settlements.
    pub platform_tx: Option<String>,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user: Uuid,
        kind: TransactionKind,
        amount: i64,
        related_user: Option<Uuid>,
        description: String,
        platform_tx: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user,
            kind,
            amount,
            related_user,
            platform_tx,
            description,
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            TransactionKind::Purchase,
            TransactionKind::GiftSent,
            TransactionKind::GiftReceived,
            TransactionKind::AdminGrant,
            TransactionKind::Withdrawal,
            TransactionKind::Refund,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("unknown"), None);
    }

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;

        // Pending settles or fails
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        // Completed can only be reversed
        assert!(Completed.can_transition_to(Refunded));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        // Refunded is terminal - a refund is itself not reversible
        assert!(!Refunded.can_transition_to(Completed));
        assert!(!Refunded.can_transition_to(Pending));
        // Failed is terminal
        assert!(!Failed.can_transition_to(Completed));
        // Same state (always valid)
        assert!(Completed.can_transition_to(Completed));
        assert!(Refunded.can_transition_to(Refunded));
    }

    #[test]
    fn test_kind_pool_routing() {
        assert_eq!(TransactionKind::GiftReceived.pool(), Pool::Earnings);
        assert_eq!(TransactionKind::Withdrawal.pool(), Pool::Earnings);
        assert_eq!(TransactionKind::GiftSent.pool(), Pool::Balance);
        assert_eq!(TransactionKind::Purchase.pool(), Pool::Balance);
        assert_eq!(TransactionKind::AdminGrant.pool(), Pool::Balance);
        assert_eq!(TransactionKind::Refund.pool(), Pool::Balance);
    }

    #[test]
    fn test_entry_sign_helpers() {
        let user = Uuid::now_v7();
        let debit = Transaction::new(
            user,
            TransactionKind::GiftSent,
            -200,
            Some(Uuid::now_v7()),
            "tip".to_string(),
            None,
        );
        let credit = Transaction::new(
            user,
            TransactionKind::AdminGrant,
            500,
            None,
            "promo".to_string(),
            None,
        );

        assert!(debit.is_debit());
        assert!(!debit.is_credit());
        assert!(credit.is_credit());
        assert_eq!(debit.status, TransactionStatus::Completed);
    }
}
