//! Buildpack self-description (`buildpack.toml`).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use packlift_types::api::ApiVersion;
use packlift_types::buildpack::{BuildpackId, BuildpackInfo, OrderEntry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DescriptorFile {
    api: ApiVersion,
    buildpack: BuildpackInfo,
    #[serde(default)]
    order: Vec<OrderEntry>,
}

/// A parsed `buildpack.toml` anchored at the buildpack's root directory.
#[derive(Debug, Clone)]
pub struct BuildpackDescriptor {
    pub api: ApiVersion,
    pub buildpack: BuildpackInfo,
    pub order: Vec<OrderEntry>,
    root: Utf8PathBuf,
}

impl BuildpackDescriptor {
    /// Load a descriptor from a `buildpack.toml` path. The buildpack root is
    /// the file's directory.
    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path))?;
        let file: DescriptorFile =
            toml::from_str(&contents).with_context(|| format!("parse {}", path))?;
        let root = path
            .parent()
            .unwrap_or_else(|| Utf8Path::new("."))
            .to_path_buf();
        Ok(Self {
            api: file.api,
            buildpack: file.buildpack,
            order: file.order,
            root,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Path of the executable the build phase spawns.
    pub fn bin_build(&self) -> Utf8PathBuf {
        self.root.join("bin").join("build")
    }

    pub fn identity(&self) -> BuildpackId {
        BuildpackId::new(&self.buildpack.id, &self.buildpack.version)
    }

    /// Meta-buildpacks carry an order and no build executable of their own.
    pub fn is_meta(&self) -> bool {
        !self.order.is_empty()
    }
}

impl std::fmt::Display for BuildpackDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.buildpack.name.is_empty() {
            write!(f, "{}", self.identity())
        } else {
            write!(f, "{} {}", self.buildpack.name, self.buildpack.version)
        }
    }
}
