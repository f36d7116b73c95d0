mod config;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use config::{ConfigMerger, InputArgs};
use fs_err as fs;
use packlift_build::{
    BuildConfig, BuildContext, BuildError, Builder, BuildpackStore, CancellationToken,
    StdProcessExecutor,
};
use packlift_env::BuildEnv;
use packlift_types::buildpack::BuildpackGroup;
use packlift_types::plan::BuildPlan;
use serde::de::DeserializeOwned;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "packlift",
    version,
    about = "Run a detected buildpack group against an app and produce export metadata."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the ordered buildpack group against the application directory.
    Build(BuildArgs),
}

#[derive(Debug, Parser)]
struct BuildArgs {
    /// Application source directory (default: CNB_APP_DIR or ".").
    #[arg(long)]
    app: Option<Utf8PathBuf>,

    /// Layers output directory (default: CNB_LAYERS_DIR or "/layers").
    #[arg(long)]
    layers: Option<Utf8PathBuf>,

    /// Platform inputs directory (default: CNB_PLATFORM_DIR or "/platform").
    #[arg(long)]
    platform: Option<Utf8PathBuf>,

    /// Root of the unpacked buildpacks (default: CNB_BUILDPACKS_DIR or "/cnb/buildpacks").
    #[arg(long)]
    buildpacks: Option<Utf8PathBuf>,

    /// group.toml from detection (default: <layers>/group.toml).
    #[arg(long)]
    group: Option<Utf8PathBuf>,

    /// plan.toml from detection (default: <layers>/plan.toml).
    #[arg(long)]
    plan: Option<Utf8PathBuf>,

    /// Directory for the per-buildpack plan files (default: <layers>/plan).
    #[arg(long)]
    plan_dir: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Build(args) => match cmd_build(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e:#}");
                exit_code_for(&e)
            }
        },
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<BuildError>() {
        Some(build_err) => {
            ExitCode::from(u8::try_from(build_err.exit_code()).unwrap_or(1))
        }
        None => ExitCode::from(1),
    }
}

fn cmd_build(args: BuildArgs) -> anyhow::Result<()> {
    let layers_hint = args
        .layers
        .clone()
        .or_else(|| std::env::var("CNB_LAYERS_DIR").ok().map(Utf8PathBuf::from))
        .unwrap_or_else(|| Utf8PathBuf::from("/layers"));
    let file_config =
        config::load_or_default(&layers_hint).context("load packlift.toml config")?;
    let inputs = ConfigMerger::from_process_env(file_config).resolve(InputArgs {
        app: args.app,
        layers: args.layers,
        platform: args.platform,
        buildpacks: args.buildpacks,
        group: args.group,
        plan: args.plan,
        plan_dir: args.plan_dir,
    });

    let group: BuildpackGroup = read_toml(&inputs.group)?;
    let plan: BuildPlan = read_toml(&inputs.plan)?;
    info!(
        buildpacks = group.group.len(),
        layers = %inputs.layers,
        "starting build"
    );

    let store = BuildpackStore::new(inputs.buildpacks.clone());
    let executor = StdProcessExecutor::new();
    let cancel = CancellationToken::new();
    let mut env = BuildEnv::new(std::env::vars());

    let mut out = std::io::stdout();
    let mut err = std::io::stderr();
    let metadata = {
        let mut ctx = BuildContext {
            config: BuildConfig {
                layers_dir: &inputs.layers,
                plan_dir: &inputs.plan_dir,
                app_dir: &inputs.app,
                platform_dir: &inputs.platform,
            },
            executor: &executor,
            out: &mut out,
            err: &mut err,
            cancel: &cancel,
        };
        Builder {
            group: &group,
            plan,
            store: &store,
        }
        .build(&mut ctx, &mut env)?
    };

    let config_dir = inputs.layers.join("config");
    fs::create_dir_all(&config_dir).with_context(|| format!("create {}", config_dir))?;
    let metadata_path = config_dir.join("metadata.toml");
    let encoded = toml::to_string(&metadata)
        .with_context(|| format!("encode {}", metadata_path))?;
    fs::write(&metadata_path, encoded).with_context(|| format!("write {}", metadata_path))?;
    info!(path = %metadata_path, "wrote build metadata");

    Ok(())
}

fn read_toml<T: DeserializeOwned>(path: &Utf8Path) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path))
}
