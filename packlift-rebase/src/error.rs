//! Error types for packlift-rebase.

use packlift_types::metadata::LabelCodecError;
use packlift_types::report::SavedImage;
use thiserror::Error;

/// The top-level error type for rebasing. The source image is left untouched
/// by every variant except [`RebaseError::Save`], which records how far the
/// saves got.
#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("stack not defined on image '{image}'")]
    StackUndefined { image: String },

    #[error("incompatible stack: '{new_base}' is not compatible with '{app}'")]
    IncompatibleStack { app: String, new_base: String },

    #[error("metadata label on image '{image}': {source}")]
    Metadata {
        image: String,
        #[source]
        source: LabelCodecError,
    },

    #[error("access image '{image}': {source}")]
    Image {
        image: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("swap base layers of '{image}': {source}")]
    Swap {
        image: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("missing run image metadata")]
    MissingRunImage,

    #[error("failed to find accessible run image")]
    NoAccessibleRunImage,

    /// A destination tag failed to write. Tags saved before the failure
    /// stay written; `saved` records them.
    #[error("save image as '{tag}': {source}")]
    Save {
        tag: String,
        #[source]
        source: anyhow::Error,
        saved: Vec<SavedImage>,
    },
}

impl RebaseError {
    /// Destination tags that were written before the failure, if any.
    pub fn saved_images(&self) -> &[SavedImage] {
        match self {
            RebaseError::Save { saved, .. } => saved,
            _ => &[],
        }
    }
}
