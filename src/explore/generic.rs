use crate::{Error, RandomSource, Result};

use super::{ActionCount, Decision, ExplorerPolicy};

/// Draws one action from an arbitrary distribution over actions.
///
/// Weights do not need to sum to one; they are normalized by their sum. The probability recorded
/// in the decision is the normalized weight of the chosen action.
///
/// The explorer always samples. [`ExplorerPolicy::enable_explore`] only records the flag, which
/// wrapping explorers forward to it.
#[derive(Debug, Clone)]
pub struct GenericExplorer {
    explore: bool,
}

impl GenericExplorer {
    pub fn new() -> GenericExplorer {
        GenericExplorer::default()
    }
}

impl Default for GenericExplorer {
    fn default() -> GenericExplorer {
        GenericExplorer { explore: true }
    }
}

impl ExplorerPolicy for GenericExplorer {
    type Action = u32;

    fn map_context(
        &self,
        random: &mut dyn RandomSource,
        weights: &[f64],
        action_count: ActionCount,
    ) -> Result<Decision<u32>> {
        let probabilities = normalize(weights, action_count)?;

        let draw = random.uniform_unit_interval();
        let index = sample_index(&probabilities, draw);

        Ok(Decision {
            action: action_id(index),
            probability: probabilities[index],
            is_exploring: true,
        })
    }

    fn enable_explore(&mut self, explore: bool) {
        self.explore = explore;
    }

    fn is_explore_enabled(&self) -> bool {
        self.explore
    }
}

/// Validate `weights` against `action_count` and normalize them into probabilities.
pub(super) fn normalize(weights: &[f64], action_count: ActionCount) -> Result<Vec<f64>> {
    if let ActionCount::Fixed(expected) = action_count {
        if expected != weights.len() {
            return Err(Error::ActionCountMismatch {
                expected,
                actual: weights.len(),
            });
        }
    }

    let mut max = 0.0_f64;
    for (index, &weight) in weights.iter().enumerate() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight { index, weight });
        }
        max = max.max(weight);
    }

    if max == 0.0 {
        return Err(Error::ZeroTotalWeight);
    }

    // Scaled weights are at most 1, so their sum stays finite even for huge inputs.
    let scaled: Vec<f64> = weights.iter().map(|weight| weight / max).collect();
    let total: f64 = scaled.iter().sum();

    Ok(scaled.into_iter().map(|weight| weight / total).collect())
}

/// Find the first action whose cumulative probability reaches `draw`.
///
/// Zero-probability actions are never selected. If floating-point rounding leaves the cumulative
/// sum short of `draw`, the last action with non-zero probability is selected.
pub(super) fn sample_index(probabilities: &[f64], draw: f64) -> usize {
    let mut sum = 0.0;
    for (index, &probability) in probabilities.iter().enumerate() {
        sum += probability;
        // Must be `>=`: when draw is close to 1.0 the sum may never exceed it.
        if probability > 0.0 && sum >= draw {
            return index;
        }
    }

    probabilities
        .iter()
        .rposition(|&probability| probability > 0.0)
        .unwrap_or(probabilities.len().saturating_sub(1))
}

pub(super) fn action_id(index: usize) -> u32 {
    index as u32 + 1
}
