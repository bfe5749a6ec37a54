//! Records moved by the upload pipeline.
use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::{Decision, ExplorerState, Result};

/// Action recorded for an interaction: a single action id or a list of ids (ranking or slots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum ActionValue {
    Single(u32),
    Multiple(Vec<u32>),
}

/// A recorded decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Experimental unit id. Observations with the same key are joined to this interaction.
    pub key: String,
    pub value: ActionValue,
    /// Context the decision was made in. Opaque to the pipeline.
    pub context: serde_json::Value,
    pub explorer_state: ExplorerState,
}

impl Interaction {
    /// Build an interaction record from an explorer decision.
    pub fn from_decision<A: Into<ActionValue>>(
        key: impl Into<String>,
        decision: Decision<A>,
        context: serde_json::Value,
    ) -> Interaction {
        let explorer_state = decision.explorer_state();
        Interaction {
            key: key.into(),
            value: decision.action.into(),
            context,
            explorer_state,
        }
    }
}

/// A recorded outcome for an experimental unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub key: String,
    pub value: serde_json::Value,
}

/// An event accepted by [`EventUploader::upload`](crate::EventUploader::upload).
#[derive(Debug, Clone, PartialEq, From)]
pub enum Event {
    Interaction(Interaction),
    Observation(Observation),
}

#[derive(Serialize)]
struct InteractionBody<'a> {
    #[serde(rename = "a")]
    action: &'a ActionValue,
    #[serde(rename = "c")]
    context: &'a serde_json::Value,
    #[serde(flatten)]
    explorer_state: &'a ExplorerState,
}

#[derive(Serialize)]
struct ObservationBody<'a> {
    #[serde(rename = "v")]
    value: &'a serde_json::Value,
}

impl Event {
    /// Experimental unit id of the event.
    pub fn key(&self) -> &str {
        match self {
            Event::Interaction(interaction) => &interaction.key,
            Event::Observation(observation) => &observation.key,
        }
    }

    /// Serialize the event into a fragment.
    pub fn to_fragment(&self) -> Result<Fragment> {
        let value = match self {
            Event::Interaction(interaction) => serde_json::to_string(&InteractionBody {
                action: &interaction.value,
                context: &interaction.context,
                explorer_state: &interaction.explorer_state,
            })?,
            Event::Observation(observation) => serde_json::to_string(&ObservationBody {
                value: &observation.value,
            })?,
        };

        Ok(Fragment {
            id: self.key().to_owned(),
            value,
        })
    }
}

/// One serialized event, keyed by its experimental unit id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub value: String,
}

impl Fragment {
    /// Approximate size in bytes, used for batch size limits.
    pub fn size(&self) -> usize {
        self.id.len() + self.value.len()
    }
}

/// Fragments sent to the join service in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub fragments: Vec<Fragment>,
}

impl EventBatch {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
