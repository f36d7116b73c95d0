//! Dependency plans and bills of materials.
//!
//! Detection produces a group-level [`BuildPlan`]; each buildpack receives
//! the [`BuildpackPlan`] slice it provides and reports back which entry
//! names it met.

use crate::buildpack::BuildpackId;
use serde::{Deserialize, Serialize};

/// A single named dependency requirement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Require {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,
}

impl Require {
    /// The `version` key of the metadata table, rendered as a string.
    pub fn metadata_version(&self) -> Option<String> {
        self.metadata.get("version").map(|v| match v {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Compatibility shim for API 0.2 buildpacks: surface the metadata
    /// version as the top-level version before the plan is serialized.
    pub fn convert_metadata_to_version(&mut self) {
        if self.version.is_none() {
            if let Some(v) = self.metadata_version() {
                self.version = Some(v);
            }
        }
    }
}

/// The plan slice handed to (and, pre-0.5, rewritten by) one buildpack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackPlan {
    #[serde(default)]
    pub entries: Vec<Require>,
}

impl BuildpackPlan {
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Drop entries claimed unmet by the buildpack.
    pub fn filter(&self, unmet: &[Unmet]) -> BuildpackPlan {
        BuildpackPlan {
            entries: self
                .entries
                .iter()
                .filter(|e| !unmet.iter().any(|u| u.name == e.name))
                .cloned()
                .collect(),
        }
    }

    /// Bill-of-materials entries for every plan entry, with no buildpack
    /// attribution yet.
    pub fn to_bom(&self) -> Vec<BomEntry> {
        self.entries.iter().cloned().map(BomEntry::from).collect()
    }
}

/// A buildpack's claim that a named input requirement went unsatisfied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unmet {
    #[serde(default)]
    pub name: String,
}

/// One bill-of-materials record: a requirement plus the identity of the
/// buildpack that provided it. API and homepage are deliberately absent from
/// the attribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BomEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,

    #[serde(default, skip_serializing_if = "BuildpackId::is_empty")]
    pub buildpack: BuildpackId,
}

impl BomEntry {
    /// The requirement this record was built from.
    pub fn require(&self) -> Require {
        Require {
            name: self.name.clone(),
            version: self.version.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// The `version` key of the metadata table, rendered as a string.
    pub fn metadata_version(&self) -> Option<String> {
        self.require().metadata_version()
    }
}

impl From<Require> for BomEntry {
    fn from(require: Require) -> Self {
        BomEntry {
            name: require.name,
            version: require.version,
            metadata: require.metadata,
            buildpack: BuildpackId::default(),
        }
    }
}

/// Stamp buildpack identity onto a set of BOM entries.
pub fn with_buildpack(buildpack: BuildpackId, bom: Vec<BomEntry>) -> Vec<BomEntry> {
    bom.into_iter()
        .map(|mut entry| {
            entry.buildpack = buildpack.clone();
            entry
        })
        .collect()
}

/// The group-level dependency plan produced by detection (`plan.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub entries: Vec<BuildPlanEntry>,
}

/// One plan entry: the requirements, and the buildpacks able to provide
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlanEntry {
    #[serde(default)]
    pub providers: Vec<BuildpackId>,

    #[serde(default)]
    pub requires: Vec<Require>,
}

impl BuildPlan {
    /// Flatten the requirements of every entry naming `bp_id` as a provider
    /// into that buildpack's input plan.
    pub fn find(&self, bp_id: &str) -> BuildpackPlan {
        let mut entries = Vec::new();
        for entry in &self.entries {
            if entry.providers.iter().any(|p| p.id == bp_id) {
                entries.extend(entry.requires.iter().cloned());
            }
        }
        BuildpackPlan { entries }
    }

    /// Drop entries whose requirements were all met, leaving entries with
    /// outstanding work for later providers.
    pub fn filter(&self, met: &[String]) -> BuildPlan {
        BuildPlan {
            entries: self
                .entries
                .iter()
                .filter(|entry| {
                    !entry
                        .requires
                        .iter()
                        .all(|req| met.iter().any(|m| *m == req.name))
                })
                .cloned()
                .collect(),
        }
    }
}
