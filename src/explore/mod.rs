//! Exploration policies that turn a weight vector into a randomized decision.
//!
//! Every policy implements [`ExplorerPolicy`]. [`GenericExplorer`] draws a single action from an
//! arbitrary non-negative weight vector, and [`GenericExplorerWithoutReplacement`] produces a full
//! ranking by repeated draws. The probability recorded in a [`Decision`] is always the probability
//! of the outcome that was actually drawn, as offline policy evaluation depends on it.
//!
//! Action ids are 1-based.
use serde::{Deserialize, Serialize};

use crate::{random::SeededRandom, RandomSource, Result};

mod generic;
mod without_replacement;

pub use generic::GenericExplorer;
pub use without_replacement::GenericExplorerWithoutReplacement;

/// Number of actions a weight vector is expected to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCount {
    /// The weight vector must have exactly this many entries.
    Fixed(usize),
    /// The number of actions is not known in advance. Any length is accepted.
    Unbounded,
}

impl From<usize> for ActionCount {
    fn from(value: usize) -> Self {
        ActionCount::Fixed(value)
    }
}

/// Outcome of a policy invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision<A> {
    /// Chosen action (1-based) or ranking of actions.
    pub action: A,
    /// Probability of choosing exactly `action`. Always in `(0, 1]`.
    pub probability: f64,
    /// Whether the action was drawn at random. The generic explorers always draw.
    pub is_exploring: bool,
}

impl<A> Decision<A> {
    /// Exploration metadata to record alongside the interaction.
    pub fn explorer_state(&self) -> ExplorerState {
        ExplorerState::Probability {
            probability: self.probability,
        }
    }
}

/// Distribution metadata stored with an interaction.
///
/// Serialized compactly as `{"p": 0.25}` or `{"ps": [0.5, 0.25, 0.25]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExplorerState {
    /// Probability of the chosen action (or ranking).
    Probability {
        #[serde(rename = "p")]
        probability: f64,
    },
    /// Probability of every action, for explorers that record the whole distribution.
    Probabilities {
        #[serde(rename = "ps")]
        probabilities: Vec<f64>,
    },
}

/// A policy mapping a weight vector to a decision.
pub trait ExplorerPolicy {
    /// Type of the chosen action: a single action id or a ranking.
    type Action;

    /// Choose an action from `weights`, drawing randomness from `random`.
    ///
    /// # Errors
    ///
    /// - [`Error::ActionCountMismatch`](crate::Error::ActionCountMismatch) if `action_count` is
    ///   fixed and differs from `weights.len()`.
    /// - [`Error::InvalidWeight`](crate::Error::InvalidWeight) if any weight is negative.
    /// - [`Error::ZeroTotalWeight`](crate::Error::ZeroTotalWeight) if all weights are zero.
    fn map_context(
        &self,
        random: &mut dyn RandomSource,
        weights: &[f64],
        action_count: ActionCount,
    ) -> Result<Decision<Self::Action>>;

    /// Enable or disable exploration. Explorers that wrap others must forward the flag.
    fn enable_explore(&mut self, explore: bool);

    fn is_explore_enabled(&self) -> bool;
}

/// Entry point for making decisions for experimental units.
///
/// Each call seeds a fresh generator from the application id and the experimental unit key, so
/// the same key always gets the same draw for a given application.
///
/// # Examples
/// ```
/// # use mwt::{ActionCount, GenericExplorer, MwtExplorer};
/// let explorer = MwtExplorer::new("my-app", GenericExplorer::new());
/// let decision = explorer
///     .choose_action("user-1", &[0.2, 0.3, 0.5], ActionCount::Fixed(3))
///     .unwrap();
/// assert!((1..=3).contains(&decision.action));
/// ```
#[derive(Debug, Clone)]
pub struct MwtExplorer<P> {
    app_id: String,
    policy: P,
}

impl<P: ExplorerPolicy> MwtExplorer<P> {
    pub fn new(app_id: impl Into<String>, policy: P) -> MwtExplorer<P> {
        MwtExplorer {
            app_id: app_id.into(),
            policy,
        }
    }

    /// Choose an action for the experimental unit identified by `key`.
    pub fn choose_action(
        &self,
        key: &str,
        weights: &[f64],
        action_count: ActionCount,
    ) -> Result<Decision<P::Action>> {
        let mut random = SeededRandom::from_key(&self.app_id, key);
        self.policy.map_context(&mut random, weights, action_count)
    }

    pub fn enable_explore(&mut self, explore: bool) {
        self.policy.enable_explore(explore);
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}


#[cfg(test)]
mod tests {
    use super::{
        ActionCount, Decision, ExplorerPolicy, ExplorerState, GenericExplorer,
        GenericExplorerWithoutReplacement, MwtExplorer,
    };

    #[test]
    fn explorer_state_is_compact() {
        let decision = Decision {
            action: 2u32,
            probability: 0.25,
            is_exploring: true,
        };

        assert_eq!(
            serde_json::to_string(&decision.explorer_state()).unwrap(),
            r#"{"p":0.25}"#
        );
        assert_eq!(
            serde_json::to_string(&ExplorerState::Probabilities {
                probabilities: vec![0.5, 0.5]
            })
            .unwrap(),
            r#"{"ps":[0.5,0.5]}"#
        );
    }

    #[test]
    fn same_key_same_decision() {
        let explorer = MwtExplorer::new("app", GenericExplorer::new());
        let weights = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        for key in ["a", "b", "c", "d"] {
            let first = explorer
                .choose_action(key, &weights, ActionCount::Fixed(8))
                .unwrap();
            let second = explorer
                .choose_action(key, &weights, ActionCount::Fixed(8))
                .unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn disabling_explore_on_facade_reaches_policy() {
        let mut explorer = MwtExplorer::new("app", GenericExplorerWithoutReplacement::new());
        explorer.enable_explore(false);
        assert!(!explorer.policy().is_explore_enabled());

        let decision = explorer
            .choose_action("key", &[0.1, 0.7, 0.2], ActionCount::Unbounded)
            .unwrap();

        assert_eq!(decision.action.len(), 3);
        assert!(decision.is_exploring);

        explorer.enable_explore(true);
        assert!(explorer.policy().is_explore_enabled());
    }
}
