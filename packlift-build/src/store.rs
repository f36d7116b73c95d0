//! Lookup of buildpack descriptors by identity.

use crate::descriptor::BuildpackDescriptor;
use crate::error::BuildError;
use camino::Utf8PathBuf;
use packlift_types::buildpack::escape_id;
use tracing::debug;

/// Buildpacks unpacked under `<dir>/<escaped-id>/<version>/`.
#[derive(Debug, Clone)]
pub struct BuildpackStore {
    dir: Utf8PathBuf,
}

impl BuildpackStore {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn lookup(&self, id: &str, version: &str) -> Result<BuildpackDescriptor, BuildError> {
        let path = self
            .dir
            .join(escape_id(id))
            .join(version)
            .join("buildpack.toml");
        if !path.is_file() {
            return Err(BuildError::InvalidInput(format!(
                "buildpack '{id}@{version}' not found at {path}"
            )));
        }
        debug!(%path, "loading buildpack descriptor");
        Ok(BuildpackDescriptor::load(&path)?)
    }
}
