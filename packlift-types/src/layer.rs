//! Layer directive files (`<layer>.toml` beside a layer directory).

use crate::api::ApiVersion;
use serde::{Deserialize, Serialize};

/// The three lifecycle flags of a layer: persist into the image, contribute
/// to later build environments, survive across builds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerTypes {
    #[serde(default)]
    pub launch: bool,

    #[serde(default)]
    pub build: bool,

    #[serde(default)]
    pub cache: bool,
}

/// Contents of a layer directive file. Before API 0.6 the flags sit at the
/// top level; from 0.6 they live under `[types]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerDirective {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<LayerTypes>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub launch: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub build: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub cache: bool,

    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub metadata: toml::Table,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl LayerDirective {
    /// Effective flags for a buildpack speaking `api`.
    pub fn types_for(&self, api: ApiVersion) -> LayerTypes {
        if api.nested_layer_types() {
            self.types.unwrap_or_default()
        } else {
            LayerTypes {
                launch: self.launch,
                build: self.build,
                cache: self.cache,
            }
        }
    }
}
