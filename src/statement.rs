// src/statement.rs
use crate::{Pool, Transaction};

/// A user's ledger history viewed as an auditable statement, newest first.
///
/// Replaying a statement's applied entries reproduces the wallet's pools by
/// summation; `balance_delta`/`earnings_delta` compute that replay.
#[derive(Debug, Clone)]
pub struct Statement {
    entries: Vec<Transaction>,
}

impl Statement {
    pub fn new(entries: Vec<Transaction>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Net replayed delta against one pool. Pending and failed entries never
    /// applied, so they contribute nothing; refunded entries did apply and
    /// are offset by their separate refund entry.
    fn pool_delta(&self, pool: Pool) -> i64 {
        self.entries
            .iter()
            .filter(|t| t.status.is_applied() && t.kind.pool() == pool)
            .map(|t| t.amount)
            .sum()
    }

    pub fn balance_delta(&self) -> i64 {
        self.pool_delta(Pool::Balance)
    }

    pub fn earnings_delta(&self) -> i64 {
        self.pool_delta(Pool::Earnings)
    }

    /// Sum of all credits across both pools.
    pub fn total_credited(&self) -> u64 {
        self.entries
            .iter()
            .filter(|t| t.status.is_applied() && t.is_credit())
            .map(|t| t.amount as u64)
            .sum()
    }

    /// Sum of all debits across both pools, as a positive number.
    pub fn total_debited(&self) -> u64 {
        self.entries
            .iter()
            .filter(|t| t.status.is_applied() && t.is_debit())
            .map(|t| t.amount.unsigned_abs())
            .sum()
    }
}

impl From<Vec<Transaction>> for Statement {
    fn from(entries: Vec<Transaction>) -> Self {
        Self::new(entries)
    }
}

impl IntoIterator for Statement {
    type Item = Transaction;
    type IntoIter = std::vec::IntoIter<Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
