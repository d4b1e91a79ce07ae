//! patchfleet core library — domain types, config/context loading, errors.
//!
//! - [`types`] — newtypes, descriptors, task results, history records
//! - [`error`] — [`ConfigError`]
//! - [`config`] — load `config.yaml` and context files

pub mod config;
pub mod error;
pub mod types;

pub use error::ConfigError;
pub use types::{
    CommitIdentity, Context, HistoryRecord, Invocation, PatchDescriptor, PrAction, PrLiveStatus,
    PrState, PrStatusOutcome, PrStatusResult, RepoId, RunConfig, TaskOutcome, TaskResult,
};
