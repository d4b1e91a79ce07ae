//! # patchfleet-engine
//!
//! Concurrent patch application and pull-request tracking.
//!
//! Build an [`Engine`] from a [`RunConfig`](patchfleet_core::RunConfig), the
//! shared [`Context`](patchfleet_core::Context), a
//! [`Patch`](patchfleet_patch::Patch) and a [`Forge`], then call
//! [`Engine::apply_patch`] to run every repository and record the resulting
//! pull requests. [`collect_status`] reports on what was recorded.

pub mod detect;
pub mod error;
pub mod fakes;
pub mod forge;
pub mod git;
pub mod history;
pub mod orchestrator;
pub mod reconcile;
pub mod scripts;
pub mod status;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ApplyError, EngineError, ForgeError, GitCommandError, HistoryError};
pub use forge::{Forge, GithubForge};
pub use history::{HistoryStore, DEFAULT_HISTORY_FILE};
pub use orchestrator::{Engine, RunReport};
pub use status::collect_status;
