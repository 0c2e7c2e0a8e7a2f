//! Interchangeable allocation strategies
//!
//! Both strategies solve one [`CategoryProblem`] at a time. Callers never
//! depend on which one ran; the optimizer records it on the plan.

pub mod greedy;
pub mod relaxation;
pub mod simplex;

pub use greedy::PriorityGreedy;
pub use relaxation::Relaxation;

use std::cmp::Reverse;
use std::collections::BTreeMap;

use worldgame_common::{AllocationError, StrategyKind, Urgency, ALLOCATION_EPSILON};

use crate::problem::{CategoryProblem, CategorySolution};

/// Upper bound on water-filling rounds
const MAX_FILL_ROUNDS: usize = 64;

/// Solver for a single category problem
pub trait AllocationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Solve one category; returned flows never exceed any supply ceiling or
    /// demand requirement
    fn solve(&self, problem: &CategoryProblem) -> Result<CategorySolution, AllocationError>;
}

/// Demands grouped by urgency level, most urgent level first
pub(crate) fn urgency_levels(
    problem: &CategoryProblem,
    demands: impl IntoIterator<Item = usize>,
) -> Vec<(Urgency, Vec<usize>)> {
    let mut levels: BTreeMap<Reverse<Urgency>, Vec<usize>> = BTreeMap::new();
    for d in demands {
        levels.entry(Reverse(problem.demands[d].urgency)).or_default().push(d);
    }
    levels.into_iter().map(|(Reverse(u), group)| (u, group)).collect()
}

/// Water-fill `available` over a group pro-rata by `weights`
///
/// Each member takes at most its `room`, which is reduced in place; capacity
/// a capped member cannot take flows on to the rest. Returns the quantity
/// placed per member.
pub(crate) fn spread_pro_rata(available: f64, weights: &[f64], room: &mut [f64]) -> Vec<f64> {
    let mut placed = vec![0.0; weights.len()];
    let mut left = available.max(0.0);
    for _ in 0..MAX_FILL_ROUNDS {
        if left <= ALLOCATION_EPSILON {
            break;
        }
        let total_weight: f64 = (0..weights.len())
            .filter(|&i| room[i] > ALLOCATION_EPSILON)
            .map(|i| weights[i].max(0.0))
            .sum();
        if total_weight <= 0.0 {
            break;
        }
        let round = left;
        for i in 0..weights.len() {
            if room[i] <= ALLOCATION_EPSILON {
                continue;
            }
            let take = (round * weights[i].max(0.0) / total_weight).min(room[i]).min(left);
            placed[i] += take;
            room[i] -= take;
            left -= take;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_redistributes_past_capped_members() {
        let mut room = vec![20.0, 100.0];
        let placed = spread_pro_rata(90.0, &[0.8, 0.4], &mut room);
        assert!((placed[0] - 20.0).abs() < 1e-9);
        assert!((placed[1] - 70.0).abs() < 1e-9);
        assert!(room[0].abs() < 1e-9);
    }

    #[test]
    fn test_spread_equal_weights_split_evenly() {
        let mut room = vec![600.0, 600.0];
        let placed = spread_pro_rata(800.0, &[1.0, 1.0], &mut room);
        assert_eq!(placed, vec![400.0, 400.0]);
    }

    #[test]
    fn test_spread_zero_weights_place_nothing() {
        let mut room = vec![10.0];
        assert_eq!(spread_pro_rata(5.0, &[0.0], &mut room), vec![0.0]);
    }
}
