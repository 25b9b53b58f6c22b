//! Debt settlement: matching debtors with creditors.

use serde::{Deserialize, Serialize};

/// Tolerance under which a balance counts as settled.
///
/// Inputs are integer currency units, but balances go through floating-point
/// sums; one hundredth of a unit absorbs that noise.
const EPSILON: f64 = 0.01;

/// A single directed transfer between two participants, by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: usize,
    pub to: usize,
    pub amount: i64,
}

#[derive(Clone, Copy, Debug)]
struct Party {
    index: usize,
    balance: f64,
}

/// Computes transfers that settle all outstanding balances.
///
/// For each participant, `balance = paid - owed`; a missing `paid` entry
/// means nothing was recorded yet and counts as 0. The algorithm repeatedly
/// matches the largest debtor with the largest creditor and transfers the
/// smaller of the two outstanding amounts, which fully settles at least one
/// side per step and therefore terminates within `n - 1` transfers.
///
/// The greedy pairing is deterministic (stable sorts over total orderings)
/// but not guaranteed to be minimal in transfer count. If total debt and
/// total credit disagree (possible for fixed/even-mode allocations whose sum
/// undershoots the total), the leftover side is silently left unmatched.
#[must_use]
pub fn settle(details: &[i64], paid: &[Option<f64>]) -> Vec<Transfer> {
    let balances = details
        .iter()
        .enumerate()
        .map(|(i, owed)| Party {
            index: i,
            balance: paid.get(i).copied().flatten().unwrap_or(0.0) - *owed as f64,
        })
        .collect::<Vec<_>>();

    let mut debtors: Vec<Party> = balances
        .iter()
        .copied()
        .filter(|p| p.balance < -EPSILON)
        .collect();
    debtors.sort_by(|a, b| a.balance.total_cmp(&b.balance));

    let mut creditors: Vec<Party> = balances
        .iter()
        .copied()
        .filter(|p| p.balance > EPSILON)
        .collect();
    creditors.sort_by(|a, b| b.balance.total_cmp(&a.balance));

    let mut transfers = Vec::new();
    let (mut d, mut c) = (0, 0);
    while d < debtors.len() && c < creditors.len() {
        let amount = (-debtors[d].balance).min(creditors[c].balance);
        transfers.push(Transfer {
            from: debtors[d].index,
            to: creditors[c].index,
            amount: amount.round() as i64,
        });

        debtors[d].balance += amount;
        creditors[c].balance -= amount;
        if debtors[d].balance.abs() < EPSILON {
            d += 1;
        }
        if creditors[c].balance.abs() < EPSILON {
            c += 1;
        }
    }

    transfers
}
