//! # patchfleet-patch
//!
//! Turns a patch plus shared context into a validated
//! [`PatchDescriptor`](patchfleet_core::PatchDescriptor) for each repository.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use patchfleet_core::{Context, Invocation, RepoId};
//! use patchfleet_patch::{resolve_descriptor, TemplatePatch};
//!
//! fn describe(context: &Context) {
//!     if let Ok(patch) = TemplatePatch::load(Path::new("patches/add-metadata.yaml")) {
//!         let invocation = Invocation { repo: RepoId::from("org/app"), dry_run: true };
//!         match resolve_descriptor(&patch, &invocation, context) {
//!             Ok(d) => println!("{} → branch {}", invocation.repo, d.branch),
//!             Err(e) => eprintln!("{e}"),
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod descriptor;
pub mod error;
pub mod patch;
pub mod registry;
pub mod template;

pub use context::TemplateContext;
pub use error::DescriptorError;
pub use patch::{resolve_descriptor, FnPatch, Patch};
pub use registry::PatchRegistry;
pub use template::TemplatePatch;
