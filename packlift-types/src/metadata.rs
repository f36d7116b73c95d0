//! Image-label payloads and the merged build result.
//!
//! Labels are JSON on the wire; the build metadata file under
//! `<layers>/config/metadata.toml` is TOML. Field names follow the label
//! schema, not Rust convention.

use crate::buildpack::GroupBuildpack;
use crate::plan::BomEntry;
use crate::process::{Label, Process, Slice};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single content-addressed layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMetadata {
    #[serde(default)]
    pub sha: String,
}

impl LayerMetadata {
    pub fn is_empty(&self) -> bool {
        self.sha.is_empty()
    }
}

/// Layers contributed by one buildpack, keyed by layer name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackLayersMetadata {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layers: BTreeMap<String, BuildpackLayerMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildpackLayerMetadata {
    #[serde(default)]
    pub sha: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub launch: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub build: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub cache: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Where the base layers of an image came from, and where they end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunImageMetadata {
    /// Digest of the topmost base layer; everything at or below it belongs
    /// to the run image and is replaced wholesale on rebase.
    #[serde(default, rename = "topLayer", skip_serializing_if = "String::is_empty")]
    pub top_layer: String,

    /// Resolved reference of the run image the layers were taken from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
}

impl RunImageMetadata {
    pub fn is_empty(&self) -> bool {
        self.top_layer.is_empty() && self.reference.is_empty()
    }
}

/// The stack record stored on the app image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackMetadata {
    #[serde(default, rename = "runImage", skip_serializing_if = "StackRunImage::is_empty")]
    pub run_image: StackRunImage,
}

impl StackMetadata {
    pub fn is_empty(&self) -> bool {
        self.run_image.is_empty()
    }
}

/// The canonical run image for a stack plus its registry mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackRunImage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
}

impl StackRunImage {
    pub fn is_empty(&self) -> bool {
        self.image.is_empty() && self.mirrors.is_empty()
    }
}

/// Payload of the `io.buildpacks.lifecycle.metadata` label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayersMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub app: Vec<LayerMetadata>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<BuildpackLayersMetadata>,

    #[serde(default, skip_serializing_if = "LayerMetadata::is_empty")]
    pub config: LayerMetadata,

    #[serde(default, skip_serializing_if = "LayerMetadata::is_empty")]
    pub launcher: LayerMetadata,

    #[serde(default, rename = "runImage", skip_serializing_if = "RunImageMetadata::is_empty")]
    pub run_image: RunImageMetadata,

    #[serde(default, skip_serializing_if = "StackMetadata::is_empty")]
    pub stack: StackMetadata,
}

/// The merged result of running a group of buildpacks, written to
/// `<layers>/config/metadata.toml` for the exporter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bom: Vec<BomEntry>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<GroupBuildpack>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub met: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processes: Vec<Process>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slices: Vec<Slice>,
}

/// Codec failure for a label payload.
#[derive(Debug, Error)]
#[error("label codec: {source}")]
pub struct LabelCodecError {
    #[from]
    source: serde_json::Error,
}

/// Encode a label payload as JSON.
pub fn encode_label<T: Serialize>(value: &T) -> Result<String, LabelCodecError> {
    Ok(serde_json::to_string(value)?)
}

/// Decode a label payload from JSON. An empty payload decodes to defaults,
/// matching an image that never carried the label.
pub fn decode_label<T: DeserializeOwned + Default>(raw: &str) -> Result<T, LabelCodecError> {
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(raw)?)
}
