//! The algorithm that computes the payments needed to settle all debts.

use std::cmp::{min, Reverse};
use std::collections::{BinaryHeap, HashMap};

use log::{debug, warn};

use crate::error::ConsistencyError;
use crate::types::{Amount, Balance, Transaction, UserId};

/// Remainders below one cent are considered settled.
pub const SETTLED_THRESHOLD: Amount = 1;

/// A creditor or a debtor still waiting to be settled.
///
/// The derived ordering makes the largest amount the greatest element; among equal
/// amounts the party that came first in the input wins.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Party {
    amount: Amount,
    position: Reverse<usize>,
    user_id: UserId,
}

/// Get a list of payments which settle all the given balances.
///
/// The algorithm works as follows:
/// - split users into creditors (positive balance) and debtors (negative balance,
///   taken as the positive amount they owe)
/// - pick the largest creditor and the largest debtor
/// - let the debtor pay the smaller of the two amounts to the creditor and subtract
///   it from both
/// - whoever is left with less than a cent is done, the other goes back in the pool
/// - stop when there are no more debtors or creditors
///
/// Each round settles at least one party, so `n` parties need at most `n - 1`
/// payments. The solution is not necessarily the one with the fewest payments
/// (finding that one is NP-complete), but it is deterministic.
///
/// The total credit must equal the total debt; when it does not, the ledger is
/// corrupt and an error is returned instead of a partial plan.
pub fn plan_settlements(balances: &[Balance]) -> Result<Vec<Transaction>, ConsistencyError> {
    let mut creditors = BinaryHeap::new();
    let mut debtors = BinaryHeap::new();

    for (position, (user_id, net_balance)) in merge_by_user(balances).into_iter().enumerate() {
        let position = Reverse(position);
        if net_balance > 0 {
            creditors.push(Party {
                amount: net_balance,
                position,
                user_id,
            });
        } else if net_balance < 0 {
            debtors.push(Party {
                amount: -net_balance,
                position,
                user_id,
            });
        }
    }

    let credit: Amount = creditors.iter().map(|p| p.amount).sum();
    let debt: Amount = debtors.iter().map(|p| p.amount).sum();
    if credit != debt {
        warn!("Refusing to plan settlements: credit is {credit} but debt is {debt}");
        return Err(ConsistencyError::UnbalancedLedger { credit, debt });
    }

    debug!(
        "Planning settlements for {} creditors and {} debtors, {credit} cents in total",
        creditors.len(),
        debtors.len()
    );

    let mut result = vec![];

    // Credit and debt are equal, so both pools run out in the same round.
    while let (Some(mut creditor), Some(mut debtor)) = (creditors.pop(), debtors.pop()) {
        let amount = min(creditor.amount, debtor.amount);
        result.push(Transaction::new(debtor.user_id, creditor.user_id, amount));

        creditor.amount -= amount;
        debtor.amount -= amount;

        if creditor.amount >= SETTLED_THRESHOLD {
            creditors.push(creditor);
        }
        if debtor.amount >= SETTLED_THRESHOLD {
            debtors.push(debtor);
        }
    }

    Ok(result)
}

/// Sum the balances of each user, keeping the order of first appearance.
fn merge_by_user(balances: &[Balance]) -> Vec<(UserId, Amount)> {
    let mut positions: HashMap<UserId, usize> = HashMap::new();
    let mut merged: Vec<(UserId, Amount)> = vec![];

    for balance in balances {
        match positions.get(&balance.user_id) {
            Some(&position) => {
                if let Some(entry) = merged.get_mut(position) {
                    entry.1 += balance.net_balance;
                }
            }
            None => {
                positions.insert(balance.user_id, merged.len());
                merged.push((balance.user_id, balance.net_balance));
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn balance(user_id: UserId, net_balance: Amount) -> Balance {
        Balance {
            user_id,
            total_paid: net_balance.max(0),
            total_owed: (-net_balance).max(0),
            net_balance,
        }
    }

    #[test]
    fn test_largest_debtor_first() -> anyhow::Result<()> {
        let balances = vec![balance(1, 5000), balance(2, -2000), balance(3, -3000)];

        let plan = plan_settlements(&balances)?;

        assert_eq!(
            plan,
            vec![Transaction::new(3, 1, 3000), Transaction::new(2, 1, 2000)]
        );
        Ok(())
    }

    #[test]
    fn test_nothing_to_settle() -> anyhow::Result<()> {
        assert!(plan_settlements(&[])?.is_empty());
        assert!(plan_settlements(&[balance(1, 0), balance(2, 0)])?.is_empty());
        Ok(())
    }

    #[test]
    fn test_two_parties() -> anyhow::Result<()> {
        let plan = plan_settlements(&[balance(1, 3000), balance(2, -3000)])?;
        assert_eq!(plan, vec![Transaction::new(2, 1, 3000)]);

        let plan = plan_settlements(&[balance(1, 0), balance(2, 0)])?;
        assert!(plan.is_empty());
        Ok(())
    }

    #[test]
    fn test_ties_follow_input_order() -> anyhow::Result<()> {
        let balances = vec![balance(4, 1000), balance(2, 1000), balance(3, -2000)];

        let plan = plan_settlements(&balances)?;

        assert_eq!(
            plan,
            vec![Transaction::new(3, 4, 1000), Transaction::new(3, 2, 1000)]
        );
        Ok(())
    }

    #[test]
    fn test_many_parties() -> anyhow::Result<()> {
        let balances = vec![
            balance(1, -3140),
            balance(2, -1300),
            balance(3, -550),
            balance(4, 2200),
            balance(5, 1790),
            balance(6, 1000),
        ];

        let plan = plan_settlements(&balances)?;

        assert_eq!(
            plan,
            vec![
                Transaction::new(1, 4, 2200),
                Transaction::new(2, 5, 1300),
                Transaction::new(1, 6, 940),
                Transaction::new(3, 5, 490),
                Transaction::new(3, 6, 60),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_unbalanced_ledger() {
        let result = plan_settlements(&[balance(1, 3000), balance(2, -2000)]);
        assert_eq!(
            result,
            Err(ConsistencyError::UnbalancedLedger {
                credit: 3000,
                debt: 2000
            })
        );
    }

    #[test]
    fn test_repeated_user_is_merged() -> anyhow::Result<()> {
        let balances = vec![
            balance(1, 1000),
            balance(2, -1000),
            balance(1, -1000),
            balance(3, 1000),
        ];
        let plan = plan_settlements(&balances)?;
        assert_eq!(plan, vec![Transaction::new(2, 3, 1000)]);
        Ok(())
    }

    fn balanced_ledger() -> impl Strategy<Value = Vec<Balance>> {
        prop::collection::vec(-100_000i64..100_000, 1..12).prop_map(|mut amounts| {
            let total: Amount = amounts.iter().sum();
            amounts.push(-total);
            amounts
                .into_iter()
                .enumerate()
                .map(|(i, a)| balance(i as UserId + 1, a))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_plan_clears_all_balances(balances in balanced_ledger()) {
            let plan = plan_settlements(&balances).expect("balanced input");

            let positive: Amount = balances.iter().map(|b| b.net_balance.max(0)).sum();
            let transacted: Amount = plan.iter().map(|t| t.amount).sum();
            prop_assert_eq!(transacted, positive);

            let parties = balances.iter().filter(|b| b.net_balance != 0).count();
            prop_assert!(plan.len() <= parties.saturating_sub(1));

            let mut remaining: HashMap<UserId, Amount> =
                balances.iter().map(|b| (b.user_id, b.net_balance)).collect();
            for t in &plan {
                prop_assert_ne!(t.from, t.to);
                prop_assert!(t.amount > 0);
                *remaining.entry(t.from).or_default() += t.amount;
                *remaining.entry(t.to).or_default() -= t.amount;
            }
            prop_assert!(remaining.values().all(|&a| a == 0));
        }

        #[test]
        fn prop_plan_is_deterministic(balances in balanced_ledger()) {
            prop_assert_eq!(plan_settlements(&balances), plan_settlements(&balances));
        }
    }
}
