//! Buildpack execution: run an ordered group of buildpacks against an
//! application directory and merge what they produce.
//!
//! This crate owns *how* buildpacks are invoked and reconciled. It does not
//! own image export or detection; those are separate phases with their own
//! inputs.

mod builder;
mod descriptor;
mod error;
mod executor;
mod ports;
mod store;

pub use builder::Builder;
pub use descriptor::BuildpackDescriptor;
pub use error::BuildError;
pub use executor::{BuildConfig, BuildContext, BuildResult, CNB_BUILDPACK_DIR};
pub use ports::{CancellationToken, Invocation, ProcessExecutor, StdProcessExecutor};
pub use store::BuildpackStore;
