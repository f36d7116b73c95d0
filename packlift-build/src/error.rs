//! Error types for packlift-build.
//!
//! The variants separate who is at fault: the platform handed over bad
//! inputs, the buildpack process failed, the buildpack wrote output that
//! violates its contract, or the filesystem misbehaved.

use packlift_env::EnvError;
use packlift_types::buildpack::BuildpackId;
use thiserror::Error;

/// The top-level error type for running buildpacks.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Missing or malformed inputs, including plans that cannot be encoded.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The buildpack's `bin/build` exited non-zero. The child's exit code is
    /// preserved.
    #[error("buildpack '{buildpack}' failed with exit code {code}")]
    Buildpack { buildpack: BuildpackId, code: i32 },

    /// A buildpack exited cleanly but wrote output files that violate its
    /// contract.
    #[error("buildpack '{buildpack}': {message}")]
    Validation {
        buildpack: BuildpackId,
        message: String,
    },

    /// Environment directive files could not be read or parsed.
    #[error("compose environment: {0}")]
    Env(#[from] EnvError),

    /// Filesystem reads/writes under the provided directories failed.
    #[error(transparent)]
    Io(#[from] anyhow::Error),

    /// The caller cancelled the build.
    #[error("build cancelled")]
    Cancelled,
}

impl BuildError {
    /// True only for a buildpack process failure; everything else is the
    /// lifecycle's own failure.
    pub fn is_buildpack_failure(&self) -> bool {
        matches!(self, BuildError::Buildpack { .. })
    }

    /// The recommended process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::InvalidInput(_) => 3,
            BuildError::Buildpack { code, .. } => *code,
            BuildError::Validation { .. } | BuildError::Env(_) | BuildError::Io(_) => 1,
            BuildError::Cancelled => 130,
        }
    }
}
