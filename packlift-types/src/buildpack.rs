//! Buildpack identity and descriptor data.

use crate::api::ApiVersion;
use serde::{Deserialize, Serialize};

/// Bare identity of a buildpack. This is the only buildpack information
/// attributed onto bill-of-materials entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildpackId {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
}

impl BuildpackId {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.version.is_empty()
    }
}

impl std::fmt::Display for BuildpackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// The `[buildpack]` table of `buildpack.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackInfo {
    pub id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, rename = "clear-env")]
    pub clear_env: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

/// One buildpack of a resolved group, as recorded in `group.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBuildpack {
    pub id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl GroupBuildpack {
    pub fn identity(&self) -> BuildpackId {
        BuildpackId::new(&self.id, &self.version)
    }
}

/// The ordered group of buildpacks selected by detection (`group.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackGroup {
    #[serde(default)]
    pub group: Vec<GroupBuildpack>,
}

/// An entry of a meta-buildpack's `order` table. Transparent to the build
/// executor; carried so descriptors round-trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    #[serde(default)]
    pub group: Vec<OrderBuildpack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBuildpack {
    pub id: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Escape a buildpack id into a filesystem-safe directory token.
pub fn escape_id(id: &str) -> String {
    id.replace('/', "_")
}
