//! The patch capability: anything that can describe a change for one repository.

use serde_json::Value;

use patchfleet_core::{Context, Invocation, PatchDescriptor};

use crate::descriptor;
use crate::error::DescriptorError;

/// A named patch. `resolve` is called once per repository, possibly from
/// several tasks at once, and must not keep mutable state between calls.
pub trait Patch: Send + Sync {
    /// Name recorded in the history store.
    fn name(&self) -> &str;

    /// Produce the raw, unvalidated descriptor for `invocation.repo`.
    fn resolve(&self, invocation: &Invocation, context: &Context)
        -> Result<Value, DescriptorError>;
}

/// Resolve `patch` for one repository and validate the result.
pub fn resolve_descriptor(
    patch: &dyn Patch,
    invocation: &Invocation,
    context: &Context,
) -> Result<PatchDescriptor, DescriptorError> {
    let raw = patch.resolve(invocation, context)?;
    descriptor::validate(raw)
}

/// A patch backed by a closure, for patches compiled into the binary.
pub struct FnPatch<F> {
    name: String,
    f: F,
}

impl<F> FnPatch<F>
where
    F: Fn(&Invocation, &Context) -> Result<Value, DescriptorError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Patch for FnPatch<F>
where
    F: Fn(&Invocation, &Context) -> Result<Value, DescriptorError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(
        &self,
        invocation: &Invocation,
        context: &Context,
    ) -> Result<Value, DescriptorError> {
        (self.f)(invocation, context)
    }
}
