//! Client-side pipeline for multi-world testing: randomized decisions with exact probability
//! accounting, and reliable upload of the resulting records for offline policy evaluation.
//!
//! # Overview
//!
//! At decision time, an [`ExplorerPolicy`] turns a caller-supplied weight vector into a
//! [`Decision`]. [`GenericExplorer`] draws a single action and
//! [`GenericExplorerWithoutReplacement`] draws a full ranking. Every decision carries the
//! probability of the outcome that was actually drawn. [`MwtExplorer`] seeds the randomness from
//! the experimental unit key, so decisions are reproducible.
//!
//! Decisions are recorded as [`Interaction`]s and outcomes as [`Observation`]s, both keyed by the
//! experimental unit id. An [`EventUploader`] buffers them, sends batches to the join service on
//! a background thread, and writes batches the join service did not accept to an
//! [`OverflowStore`]. A [`PackageListener`] is notified exactly once per batch.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. Invalid arguments and calls in the wrong state
//! fail immediately. Failures that happen while sending batches are never returned to the caller
//! of [`EventUploader::upload`]; they are reported through
//! [`Notification::PackageSendFailed`].
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with the `mwt` target.
//! Consider integrating a `log`-compatible logger implementation for better visibility into
//! upload failures.

#![warn(rustdoc::missing_crate_level_docs)]

mod batch;
mod config;
mod error;
mod event;
mod explore;
mod flush_thread;
mod listener;
mod overflow;
mod random;
mod settings;
mod transport;
mod uploader;

pub use batch::{BatchAccumulator, BatchConfig};
pub use config::UploaderConfig;
pub use error::{Error, Result};
pub use event::{ActionValue, Event, EventBatch, Fragment, Interaction, Observation};
pub use explore::{
    ActionCount, Decision, ExplorerPolicy, ExplorerState, GenericExplorer,
    GenericExplorerWithoutReplacement, MwtExplorer,
};
pub use listener::{Notification, PackageListener};
pub use overflow::{FileOverflowStore, OverflowStore, StoredBatch};
pub use random::{RandomSource, SeededRandom};
pub use settings::{
    HttpSettingsResolver, ResolvedSettings, ServerCredentials, SettingsResolver,
    DEFAULT_EXPERIMENTAL_UNIT_DURATION,
};
pub use transport::{HttpTransport, Transport, STORAGE_CONNECTION_HEADER};
pub use uploader::{EventUploader, UploaderState};
