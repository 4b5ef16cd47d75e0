// src/wallet.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two pools a wallet holds. Spendable coins live in `Balance`; gift
/// receipts accrue to `Earnings` (creator income, not spend-ready coins).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Pool {
    Balance,
    Earnings,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Balance => "balance",
            Pool::Earnings => "earnings",
        }
    }
}

/// Per-user coin record. Created lazily on first access, never deleted.
///
/// Invariants:
/// - `balance >= 0` and `earnings >= 0` at all times (u64 plus floor checks
///   before any decrement commits)
/// - mutated only through `WalletStore::execute_plan`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user: Uuid,
    pub balance: u64,
    pub earnings: u64,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user: Uuid) -> Self {
        Self {
            user,
            balance: 0,
            earnings: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn pool(&self, pool: Pool) -> u64 {
        match pool {
            Pool::Balance => self.balance,
            Pool::Earnings => self.earnings,
        }
    }

    /// Coins held across both pools.
    pub fn total(&self) -> u64 {
        self.balance + self.earnings
    }
}
