//! Share allocation: turning a total into per-participant owed amounts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Rounding;

/// Result of [`allocate`].
///
/// Amounts are integer currency units. `details` always has one entry per
/// participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// The per-head amount in an even split.
    ///
    /// In weighted mode this aliases `details[0]` (including any absorbed
    /// rounding remainder), so it is only a meaningful "per person" figure
    /// when all weights are equal. Kept for compatibility with existing
    /// stored results.
    pub per_share: i64,
    /// Owed amount of each participant, by index.
    pub details: Vec<i64>,
}

/// Allocates `total` across `people` participants.
///
/// Two modes, selected by `weights`:
///
/// - **Weighted** (`weights` non-empty): each participant owes
///   `total * weight / total_weight`, rounded per `rounding`. Independent
///   rounding can leave a discrepancy against `total`; the whole difference
///   is added to participant 0 so that `sum(details) == total` always holds.
/// - **Fixed/even** (`weights` empty): participants with a positive entry in
///   `fixed` owe exactly that amount; the remaining total is divided evenly
///   among the rest. No remainder correction happens in this mode, so
///   `sum(details)` can undershoot `total` when the even share does not
///   divide exactly.
///
/// Degenerate inputs never fail: `people == 0` yields an empty allocation
/// and an all-zero weight map yields all-zero details.
#[must_use]
pub fn allocate(
    total: i64,
    people: usize,
    rounding: Rounding,
    fixed: &[Option<i64>],
    weights: &BTreeMap<usize, f64>,
) -> Allocation {
    if people == 0 {
        return Allocation::default();
    }

    if !weights.is_empty() {
        return allocate_weighted(total, people, rounding, weights);
    }

    let fixed_entry = |i: usize| fixed.get(i).copied().flatten().filter(|v| *v > 0);

    let fixed_total: i64 = (0..people).filter_map(fixed_entry).sum();
    let fixed_count = (0..people).filter(|i| fixed_entry(*i).is_some()).count();

    let rest_people = people - fixed_count;
    let rest_total = total - fixed_total;
    let per = if rest_people > 0 {
        rounding.apply(rest_total as f64 / rest_people as f64)
    } else {
        0
    };

    let details = (0..people)
        .map(|i| fixed_entry(i).unwrap_or(per))
        .collect();

    Allocation { per_share: per, details }
}

fn allocate_weighted(
    total: i64,
    people: usize,
    rounding: Rounding,
    weights: &BTreeMap<usize, f64>,
) -> Allocation {
    let total_weight: f64 = weights.values().sum();
    if total_weight == 0.0 {
        return Allocation {
            per_share: 0,
            details: vec![0; people],
        };
    }

    let mut details: Vec<i64> = (0..people)
        .map(|i| {
            let weight = weights.get(&i).copied().unwrap_or(0.0);
            rounding.apply(total as f64 * weight / total_weight)
        })
        .collect();

    // Participant 0 absorbs the whole rounding discrepancy. Policy, not an
    // approximation: it is what keeps the sum invariant exact.
    let allocated: i64 = details.iter().sum();
    if allocated != total {
        details[0] += total - allocated;
    }

    Allocation {
        per_share: details[0],
        details,
    }
}

/// Gratuity on top of a total, rounded to the nearest unit.
///
/// Callers add this to the total before allocating.
#[must_use]
pub fn tip_amount(total: i64, rate: f64) -> i64 {
    (total as f64 * rate).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_fixed(people: usize) -> Vec<Option<i64>> {
        vec![None; people]
    }

    #[test]
    fn even_split_exact() {
        let allocation = allocate(9000, 3, Rounding::Nearest, &no_fixed(3), &BTreeMap::new());
        assert_eq!(allocation.per_share, 3000);
        assert_eq!(allocation.details, vec![3000, 3000, 3000]);
    }

    #[test]
    fn even_split_documents_remainder_gap() {
        // 1000 / 3 rounds to 333 per head; the missing unit is deliberately
        // not redistributed in fixed/even mode.
        let allocation = allocate(1000, 3, Rounding::Nearest, &no_fixed(3), &BTreeMap::new());
        assert_eq!(allocation.per_share, 333);
        assert_eq!(allocation.details, vec![333, 333, 333]);
        assert_eq!(allocation.details.iter().sum::<i64>(), 999);
    }

    #[test]
    fn even_split_rounding_modes() {
        let floor = allocate(1000, 3, Rounding::Floor, &no_fixed(3), &BTreeMap::new());
        assert_eq!(floor.per_share, 333);
        let ceil = allocate(1000, 3, Rounding::Ceil, &no_fixed(3), &BTreeMap::new());
        assert_eq!(ceil.per_share, 334);
    }

    #[test]
    fn fixed_amounts_override_even_share() {
        let fixed = vec![Some(5000), None, None];
        let allocation = allocate(9000, 3, Rounding::Nearest, &fixed, &BTreeMap::new());
        assert_eq!(allocation.per_share, 2000);
        assert_eq!(allocation.details, vec![5000, 2000, 2000]);
    }

    #[test]
    fn non_positive_fixed_entries_are_ignored() {
        let fixed = vec![Some(0), Some(-100), None];
        let allocation = allocate(9000, 3, Rounding::Nearest, &fixed, &BTreeMap::new());
        assert_eq!(allocation.details, vec![3000, 3000, 3000]);
    }

    #[test]
    fn all_fixed_leaves_zero_per_share() {
        let fixed = vec![Some(400), Some(600)];
        let allocation = allocate(1000, 2, Rounding::Nearest, &fixed, &BTreeMap::new());
        assert_eq!(allocation.per_share, 0);
        assert_eq!(allocation.details, vec![400, 600]);
    }

    #[test]
    fn zero_people_yields_empty_allocation() {
        let allocation = allocate(1234, 0, Rounding::Nearest, &[], &BTreeMap::new());
        assert_eq!(allocation, Allocation::default());
    }

    #[test]
    fn weighted_split_keeps_sum_invariant() {
        let weights = BTreeMap::from([(0, 50.0), (1, 50.0)]);
        let allocation = allocate(1000, 2, Rounding::Nearest, &[], &weights);
        assert_eq!(allocation.details, vec![500, 500]);
        assert_eq!(allocation.details.iter().sum::<i64>(), 1000);
    }

    #[test]
    fn weighted_remainder_goes_to_first_participant() {
        let weights = BTreeMap::from([(0, 1.0), (1, 1.0), (2, 1.0)]);
        let allocation = allocate(1000, 3, Rounding::Nearest, &[], &weights);
        assert_eq!(allocation.details.iter().sum::<i64>(), 1000);
        assert_eq!(allocation.details, vec![334, 333, 333]);
        assert_eq!(allocation.per_share, 334);
    }

    #[test]
    fn weighted_single_payer() {
        let weights = BTreeMap::from([(0, 100.0), (1, 0.0), (2, 0.0)]);
        let allocation = allocate(100, 3, Rounding::Nearest, &[], &weights);
        assert_eq!(allocation.details, vec![100, 0, 0]);
    }

    #[test]
    fn weighted_zero_total_weight_is_degenerate() {
        let weights = BTreeMap::from([(0, 0.0), (1, 0.0)]);
        let allocation = allocate(1000, 2, Rounding::Nearest, &[], &weights);
        assert_eq!(allocation.per_share, 0);
        assert_eq!(allocation.details, vec![0, 0]);
    }

    #[test]
    fn weighted_sum_invariant_across_modes() {
        let weights = BTreeMap::from([(0, 1.0), (1, 2.0), (2, 4.0)]);
        for mode in [Rounding::Floor, Rounding::Ceil, Rounding::Nearest] {
            let allocation = allocate(1003, 3, mode, &[], &weights);
            assert_eq!(allocation.details.iter().sum::<i64>(), 1003, "{mode}");
        }
    }

    #[test]
    fn negative_total_is_taken_literally() {
        let allocation = allocate(-900, 3, Rounding::Nearest, &no_fixed(3), &BTreeMap::new());
        assert_eq!(allocation.details, vec![-300, -300, -300]);
    }

    #[test]
    fn tip_rounds_to_nearest_unit() {
        assert_eq!(tip_amount(9000, 0.1), 900);
        assert_eq!(tip_amount(333, 0.15), 50);
        assert_eq!(tip_amount(9000, 0.0), 0);
    }
}
