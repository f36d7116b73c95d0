//! Per-buildpack execution: prepare directories, hand over the plan, spawn
//! `bin/build`, fold new build layers into the environment, and read the
//! output files back.

use crate::descriptor::BuildpackDescriptor;
use crate::error::BuildError;
use crate::ports::{CancellationToken, Invocation, ProcessExecutor};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use packlift_env::BuildEnv;
use packlift_types::api::ApiVersion;
use packlift_types::buildpack::escape_id;
use packlift_types::files::{BuildFile, LaunchFile};
use packlift_types::layer::LayerDirective;
use packlift_types::plan::{with_buildpack, BomEntry, BuildpackPlan, Unmet};
use packlift_types::process::{Label, Process, Slice};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Appended to every child environment so the buildpack can find its own
/// root directory.
pub const CNB_BUILDPACK_DIR: &str = "CNB_BUILDPACK_DIR";

/// The directories one group build operates on.
#[derive(Debug, Clone, Copy)]
pub struct BuildConfig<'a> {
    pub layers_dir: &'a Utf8Path,
    pub plan_dir: &'a Utf8Path,
    pub app_dir: &'a Utf8Path,
    pub platform_dir: &'a Utf8Path,
}

/// Everything an invocation needs besides the buildpack itself: the
/// directories, the spawner, the output sinks, and the cancellation flag.
pub struct BuildContext<'a> {
    pub config: BuildConfig<'a>,
    pub executor: &'a dyn ProcessExecutor,
    pub out: &'a mut dyn std::io::Write,
    pub err: &'a mut dyn std::io::Write,
    pub cancel: &'a CancellationToken,
}

/// What one buildpack contributed to the build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildResult {
    pub bom: Vec<BomEntry>,
    pub labels: Vec<Label>,
    pub met: Vec<String>,
    pub processes: Vec<Process>,
    pub slices: Vec<Slice>,
}

impl BuildpackDescriptor {
    /// Run this buildpack's `bin/build` against the plan slice it provides
    /// and collect its outputs.
    ///
    /// On success the environment has already ingested every layer the
    /// buildpack marked `build = true`, so the next buildpack of the group
    /// observes them.
    pub fn build(
        &self,
        plan: BuildpackPlan,
        ctx: &mut BuildContext<'_>,
        env: &mut BuildEnv,
    ) -> Result<BuildResult, BuildError> {
        let mut plan = plan;
        if self.api == ApiVersion::V0_2 {
            for entry in &mut plan.entries {
                entry.convert_metadata_to_version();
            }
        }

        let bp_dir = escape_id(&self.buildpack.id);
        let bp_layers_dir = ctx.config.layers_dir.join(&bp_dir);
        let bp_plan_dir = ctx.config.plan_dir.join(&bp_dir);
        fs::create_dir_all(&bp_layers_dir)
            .with_context(|| format!("create {}", bp_layers_dir))?;
        fs::create_dir_all(&bp_plan_dir).with_context(|| format!("create {}", bp_plan_dir))?;

        let plan_path = bp_plan_dir.join("plan.toml");
        let encoded = toml::to_string(&plan)
            .map_err(|e| BuildError::InvalidInput(format!("encode {}: {}", plan_path, e)))?;
        fs::write(&plan_path, encoded).with_context(|| format!("write {}", plan_path))?;

        self.run_build_cmd(&bp_layers_dir, &plan_path, ctx, env)?;
        self.setup_env(&bp_layers_dir, env)?;
        self.read_output_files(&bp_layers_dir, &plan_path, &plan)
    }

    fn run_build_cmd(
        &self,
        bp_layers_dir: &Utf8Path,
        plan_path: &Utf8Path,
        ctx: &mut BuildContext<'_>,
        env: &BuildEnv,
    ) -> Result<(), BuildError> {
        let mut child_env = if self.buildpack.clear_env {
            env.list()
        } else {
            env.with_platform(ctx.config.platform_dir)?
        };
        child_env.push((CNB_BUILDPACK_DIR.to_string(), self.root().to_string()));

        let invocation = Invocation {
            program: self.bin_build(),
            args: vec![
                bp_layers_dir.to_string(),
                ctx.config.platform_dir.to_string(),
                plan_path.to_string(),
            ],
            cwd: ctx.config.app_dir.to_path_buf(),
            env: child_env,
        };
        debug!(buildpack = %self.identity(), program = %invocation.program, "running bin/build");

        let code = ctx
            .executor
            .run(&invocation, ctx.out, ctx.err, ctx.cancel)
            .map_err(|e| {
                if ctx.cancel.is_cancelled() {
                    BuildError::Cancelled
                } else {
                    BuildError::Io(e.context(format!("run {}", invocation.program)))
                }
            })?;
        if code != 0 {
            return Err(BuildError::Buildpack {
                buildpack: self.identity(),
                code,
            });
        }
        Ok(())
    }

    /// Fold every `build = true` layer into the environment: conventional
    /// root dirs first, then the layer's `env/` and `env.build/` directives.
    /// Layer directories apply in lexical order, which is observable through
    /// the composed environment.
    fn setup_env(&self, bp_layers_dir: &Utf8Path, env: &mut BuildEnv) -> Result<(), BuildError> {
        for layer_dir in layer_dirs_sorted(bp_layers_dir)? {
            let directive_path = Utf8PathBuf::from(format!("{layer_dir}.toml"));
            if !self.is_build_layer(&directive_path) {
                continue;
            }
            debug!(layer = %layer_dir, "ingesting build layer");
            env.add_root_dir(&layer_dir)?;
            env.add_env_dir(&layer_dir.join("env"), self.api)?;
            env.add_env_dir(&layer_dir.join("env.build"), self.api)?;
        }
        Ok(())
    }

    fn is_build_layer(&self, directive_path: &Utf8Path) -> bool {
        let contents = match fs::read_to_string(directive_path) {
            Ok(contents) => contents,
            Err(_) => return false,
        };
        match toml::from_str::<LayerDirective>(&contents) {
            Ok(directive) => directive.types_for(self.api).build,
            Err(e) => {
                debug!(path = %directive_path, error = %e, "ignoring unparsable layer directive");
                false
            }
        }
    }

    fn read_output_files(
        &self,
        bp_layers_dir: &Utf8Path,
        plan_path: &Utf8Path,
        plan_in: &BuildpackPlan,
    ) -> Result<BuildResult, BuildError> {
        let launch: LaunchFile = read_optional_toml(&bp_layers_dir.join("launch.toml"))?;

        let mut result = BuildResult::default();
        if self.api.rewrites_plan() {
            // The buildpack may have rewritten its plan; the rewritten plan
            // is the source of both the BOM and the met set.
            let plan_out: BuildpackPlan = read_optional_toml(plan_path)?;
            let bom = plan_out.to_bom();
            self.validate_bom(&bom)?;
            result.bom = with_buildpack(self.identity(), bom);
            result.met = plan_out.names();
        } else {
            let build_file: BuildFile = read_optional_toml(&bp_layers_dir.join("build.toml"))?;
            self.validate_bom(&launch.bom)?;
            self.validate_bom(&build_file.bom)?;
            self.validate_unmet(&build_file.unmet, plan_in)?;
            result.met = plan_in.filter(&build_file.unmet).names();
            result.bom = with_buildpack(self.identity(), launch.bom);
        }

        result.labels = launch.labels;
        result.processes = launch
            .processes
            .into_iter()
            .map(|mut p| {
                p.buildpack_id = self.buildpack.id.clone();
                p
            })
            .collect();
        result.slices = launch.slices;
        Ok(result)
    }

    fn validate_bom(&self, bom: &[BomEntry]) -> Result<(), BuildError> {
        let fail = |message: String| {
            Err(BuildError::Validation {
                buildpack: self.identity(),
                message,
            })
        };
        for entry in bom {
            let top_level = entry.version.as_deref().filter(|v| !v.is_empty());
            if self.api.rewrites_plan() {
                if let (Some(version), Some(md_version)) = (top_level, entry.metadata_version()) {
                    if version != md_version {
                        return fail(
                            "top level version does not match metadata version".to_string(),
                        );
                    }
                }
            } else if top_level.is_some() {
                return fail(format!(
                    "bom entry '{}' has a top level version which is deprecated",
                    entry.name
                ));
            }
        }
        Ok(())
    }

    fn validate_unmet(&self, unmet: &[Unmet], plan_in: &BuildpackPlan) -> Result<(), BuildError> {
        for claim in unmet {
            if claim.name.is_empty() {
                return Err(BuildError::Validation {
                    buildpack: self.identity(),
                    message: "unmet.name is required".to_string(),
                });
            }
            if !plan_in.entries.iter().any(|e| e.name == claim.name) {
                return Err(BuildError::Validation {
                    buildpack: self.identity(),
                    message: format!(
                        "unmet.name '{}' must match a requested dependency",
                        claim.name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Subdirectories of `dir`, lexical by name. Empty when `dir` is missing.
fn layer_dirs_sorted(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, BuildError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(anyhow::Error::new(e).context(format!("scan {}", dir)).into()),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| anyhow::Error::new(e).context(format!("scan {}", dir)))?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|p| anyhow::anyhow!("non-utf8 path {}", p.display()))?;
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Decode a TOML file that a buildpack may legitimately not have written.
fn read_optional_toml<T: DeserializeOwned + Default>(path: &Utf8Path) -> Result<T, BuildError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(anyhow::Error::new(e).context(format!("read {}", path)).into()),
    };
    toml::from_str(&contents)
        .map_err(|e| BuildError::InvalidInput(format!("parse {}: {}", path, e)))
}
