// src/ops.rs
use crate::{Pool, Transaction};
use uuid::Uuid;

/// Primitive mutations a plan is composed of. Debits are floor-checked by the
/// adapter inside its lock; credits never fail on amount.
#[derive(Debug, Clone)]
pub enum Operation {
    DebitBalance {
        user: Uuid,
        amount: u64,
    },
    CreditBalance {
        user: Uuid,
        amount: u64,
    },
    DebitEarnings {
        user: Uuid,
        amount: u64,
    },
    CreditEarnings {
        user: Uuid,
        amount: u64,
    },
    RecordTransaction {
        transaction: Transaction,
    },
    /// Transition an entry Completed -> Refunded; fails the whole plan with
    /// NotRefundable if the entry is in any other state.
    MarkRefunded {
        transaction_id: Uuid,
    },
}

#[derive(Clone, Default)]
pub struct ExecutionPlan {
    operations: Vec<Operation>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    pub fn add(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Pools this plan debits, summed per (user, pool). The adapter must lock
    /// each and verify the pool covers the summed amount before applying
    /// anything.
    pub fn calculate_locks(&self) -> Vec<(Uuid, Pool, u64)> {
        use std::collections::HashMap;
        let mut locks: HashMap<(Uuid, Pool), u64> = HashMap::new();

        for op in &self.operations {
            match op {
                Operation::DebitBalance { user, amount } => {
                    *locks.entry((*user, Pool::Balance)).or_insert(0) += amount;
                }
                Operation::DebitEarnings { user, amount } => {
                    *locks.entry((*user, Pool::Earnings)).or_insert(0) += amount;
                }
                _ => {}
            }
        }

        locks
            .into_iter()
            .map(|((user, pool), amount)| (user, pool, amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionKind;

    #[test]
    fn test_locks_sum_debits_per_pool() {
        let user = Uuid::now_v7();
        let other = Uuid::now_v7();

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::DebitBalance { user, amount: 80 });
        plan.add(Operation::DebitBalance { user, amount: 20 });
        plan.add(Operation::DebitEarnings { user, amount: 50 });
        plan.add(Operation::CreditEarnings {
            user: other,
            amount: 100,
        });

        let mut locks = plan.calculate_locks();
        locks.sort_by_key(|(_, pool, _)| pool.as_str());

        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0], (user, Pool::Balance, 100));
        assert_eq!(locks[1], (user, Pool::Earnings, 50));
    }

    #[test]
    fn test_credits_and_records_take_no_locks() {
        let user = Uuid::now_v7();

        let mut plan = ExecutionPlan::new();
        plan.add(Operation::CreditBalance { user, amount: 500 });
        plan.add(Operation::RecordTransaction {
            transaction: Transaction::new(
                user,
                TransactionKind::AdminGrant,
                500,
                None,
                "promo".to_string(),
                None,
            ),
        });

        assert!(plan.calculate_locks().is_empty());
    }
}
