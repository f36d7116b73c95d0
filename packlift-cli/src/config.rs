//! Input resolution for the packlift CLI.
//!
//! Discovers and loads `packlift.toml` from the layers directory and merges
//! it with CLI arguments and `CNB_*` environment variables. Precedence, most
//! binding first: CLI argument, environment variable, config file, built-in
//! default.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The config file name to search for, inside the layers directory.
pub const CONFIG_FILE_NAME: &str = "packlift.toml";

/// Top-level configuration from packlift.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PackliftConfig {
    /// Directory defaults for the build subcommand.
    pub build: BuildSection,
}

/// The `[build]` section of the config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub app: Option<Utf8PathBuf>,
    pub platform: Option<Utf8PathBuf>,
    pub buildpacks: Option<Utf8PathBuf>,
    pub group: Option<Utf8PathBuf>,
    pub plan: Option<Utf8PathBuf>,
    pub plan_dir: Option<Utf8PathBuf>,
}

/// Load and parse a packlift.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<PackliftConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<PackliftConfig> {
    let config: PackliftConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from the layers directory, or return defaults if not found.
pub fn load_or_default(layers_dir: &Utf8Path) -> anyhow::Result<PackliftConfig> {
    let path = layers_dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        debug!("found config file at {}", path);
        load_config(&path)
    } else {
        debug!("no config file found at {}", path);
        Ok(PackliftConfig::default())
    }
}

/// The fully resolved directories and files one build run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    pub app: Utf8PathBuf,
    pub layers: Utf8PathBuf,
    pub platform: Utf8PathBuf,
    pub buildpacks: Utf8PathBuf,
    pub group: Utf8PathBuf,
    pub plan: Utf8PathBuf,
    pub plan_dir: Utf8PathBuf,
}

/// CLI arguments before resolution; `None` means the flag was not given.
#[derive(Debug, Clone, Default)]
pub struct InputArgs {
    pub app: Option<Utf8PathBuf>,
    pub layers: Option<Utf8PathBuf>,
    pub platform: Option<Utf8PathBuf>,
    pub buildpacks: Option<Utf8PathBuf>,
    pub group: Option<Utf8PathBuf>,
    pub plan: Option<Utf8PathBuf>,
    pub plan_dir: Option<Utf8PathBuf>,
}

/// Merges CLI arguments with environment variables and the config file.
pub struct ConfigMerger {
    config: PackliftConfig,
    env: BTreeMap<String, String>,
}

impl ConfigMerger {
    pub fn new(config: PackliftConfig, env: BTreeMap<String, String>) -> Self {
        Self { config, env }
    }

    /// Capture the `CNB_*` variables of the current process environment.
    pub fn from_process_env(config: PackliftConfig) -> Self {
        let env = std::env::vars()
            .filter(|(k, _)| k.starts_with("CNB_"))
            .collect();
        Self::new(config, env)
    }

    fn env_path(&self, key: &str) -> Option<Utf8PathBuf> {
        self.env
            .get(key)
            .filter(|v| !v.is_empty())
            .map(Utf8PathBuf::from)
    }

    /// Resolve the build inputs. The layers directory resolves first; file
    /// defaults derive from it.
    pub fn resolve(&self, args: InputArgs) -> ResolvedInputs {
        let layers = args
            .layers
            .or_else(|| self.env_path("CNB_LAYERS_DIR"))
            .unwrap_or_else(|| Utf8PathBuf::from("/layers"));

        let pick = |arg: Option<Utf8PathBuf>,
                    env_key: &str,
                    file: Option<&Utf8PathBuf>,
                    default: Utf8PathBuf| {
            arg.or_else(|| self.env_path(env_key))
                .or_else(|| file.cloned())
                .unwrap_or(default)
        };

        ResolvedInputs {
            app: pick(
                args.app,
                "CNB_APP_DIR",
                self.config.build.app.as_ref(),
                Utf8PathBuf::from("."),
            ),
            platform: pick(
                args.platform,
                "CNB_PLATFORM_DIR",
                self.config.build.platform.as_ref(),
                Utf8PathBuf::from("/platform"),
            ),
            buildpacks: pick(
                args.buildpacks,
                "CNB_BUILDPACKS_DIR",
                self.config.build.buildpacks.as_ref(),
                Utf8PathBuf::from("/cnb/buildpacks"),
            ),
            group: pick(
                args.group,
                "CNB_GROUP_PATH",
                self.config.build.group.as_ref(),
                layers.join("group.toml"),
            ),
            plan: pick(
                args.plan,
                "CNB_PLAN_PATH",
                self.config.build.plan.as_ref(),
                layers.join("plan.toml"),
            ),
            plan_dir: pick(
                args.plan_dir,
                "CNB_PLAN_DIR",
                self.config.build.plan_dir.as_ref(),
                layers.join("plan"),
            ),
            layers,
        }
    }
}
