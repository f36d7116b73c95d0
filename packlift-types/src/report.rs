//! Result records handed back to the platform after a rebase.

use serde::{Deserialize, Serialize};

/// One record per destination tag that was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    pub tag: String,
    pub digest: String,
}

/// The rebase report, serialized as TOML by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseReport {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<SavedImage>,
}
