use crate::{RandomSource, Result};

use super::{
    generic::{action_id, normalize},
    ActionCount, Decision, ExplorerPolicy, GenericExplorer,
};

/// Produces a full ranking of actions by sampling without replacement.
///
/// Each step draws one action from the remaining ones using [`GenericExplorer`], removes it and
/// renormalizes the rest. The recorded probability is the product of the per-step probabilities,
/// i.e. the probability of the exact ranking. Zero-weight actions end up at the bottom of the
/// ranking, ordered uniformly at random.
///
/// Like [`GenericExplorer`], it always samples. The explore flag is forwarded to the inner
/// explorer.
#[derive(Debug, Clone, Default)]
pub struct GenericExplorerWithoutReplacement {
    explorer: GenericExplorer,
}

impl GenericExplorerWithoutReplacement {
    pub fn new() -> GenericExplorerWithoutReplacement {
        GenericExplorerWithoutReplacement::default()
    }
}

impl ExplorerPolicy for GenericExplorerWithoutReplacement {
    type Action = Vec<u32>;

    fn map_context(
        &self,
        random: &mut dyn RandomSource,
        weights: &[f64],
        action_count: ActionCount,
    ) -> Result<Decision<Vec<u32>>> {
        let probabilities = normalize(weights, action_count)?;

        let mut remaining: Vec<usize> = (0..probabilities.len()).collect();
        let mut ranking = Vec::with_capacity(remaining.len());
        let mut probability = 1.0;

        while !remaining.is_empty() {
            let mut step_weights: Vec<f64> =
                remaining.iter().map(|&index| probabilities[index]).collect();
            if step_weights.iter().all(|&weight| weight == 0.0) {
                step_weights.fill(1.0);
            }

            let step = self.explorer.map_context(
                random,
                &step_weights,
                ActionCount::Fixed(remaining.len()),
            )?;

            probability *= step.probability;
            let chosen = remaining.remove(step.action as usize - 1);
            ranking.push(action_id(chosen));
        }

        Ok(Decision {
            action: ranking,
            probability,
            is_exploring: true,
        })
    }

    fn enable_explore(&mut self, explore: bool) {
        self.explorer.enable_explore(explore);
    }

    fn is_explore_enabled(&self) -> bool {
        self.explorer.is_explore_enabled()
    }
}
