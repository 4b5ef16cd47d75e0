// src/error.rs
use std::fmt;

#[derive(Debug)]
pub enum LedgerError {
    InvalidAmount,
    SelfTransfer,
    InsufficientFunds,
    WalletNotFound(uuid::Uuid),
    TransactionNotFound,
    ItemNotFound(String),
    AlreadyOwned,
    NotPurchasable,
    NotRefundable,
    DuplicateTransaction(String),
    Storage(String),
    Conflict(String),
}

impl LedgerError {
    /// Transient errors are retried by the service; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount => write!(f, "Invalid amount"),
            Self::SelfTransfer => write!(f, "Sender and receiver are the same wallet"),
            Self::InsufficientFunds => write!(f, "Insufficient funds"),
            Self::WalletNotFound(user) => write!(f, "Wallet not found for user: {}", user),
            Self::TransactionNotFound => write!(f, "Transaction not found"),
            Self::ItemNotFound(id) => write!(f, "Catalog item not found: {}", id),
            Self::AlreadyOwned => write!(f, "Item already owned"),
            Self::NotPurchasable => write!(f, "Item is not purchasable"),
            Self::NotRefundable => write!(f, "Transaction is not refundable"),
            Self::DuplicateTransaction(key) => {
                write!(f, "Duplicate platform transaction: {}", key)
            }
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}
