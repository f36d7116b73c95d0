//! On-disk TOML files exchanged with buildpack processes.

use crate::plan::{BomEntry, Unmet};
use crate::process::{Label, Process, Slice};
use serde::{Deserialize, Serialize};

/// `launch.toml`, written by a buildpack into its layers directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bom: Vec<BomEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<Process>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<Slice>,
}

/// `build.toml`, written by API 0.5+ buildpacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildFile {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bom: Vec<BomEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<Unmet>,
}
