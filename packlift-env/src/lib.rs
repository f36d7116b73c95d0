//! The layered build environment seen by buildpack processes.
//!
//! Responsibilities:
//! - Seed a filtered environment from the caller's process environment.
//! - Fold layer root directories (`bin/`, `lib/`, ...) into the path-list
//!   variables they conventionally extend.
//! - Apply env-directive files (`VAR.override`, `VAR.default`, `VAR.prepend`,
//!   `VAR.append`, `VAR.delim`) from a layer's `env*/` directories.
//! - Render the composed variable set, with or without the platform
//!   directory's contributions.
//!
//! Composition is deterministic: directives within one directory apply in
//! precedence classes (override, then default, then prepend/append), lexical
//! by filename within a class, and callers apply directories in a fixed
//! order.

use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use packlift_types::api::ApiVersion;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Variables inherited from the caller's environment verbatim.
pub const BUILD_ENV_ALLOWLIST: &[&str] = &["CNB_STACK_ID", "HOSTNAME", "HOME"];

/// Layer subdirectory basenames and the path-list variables they extend.
pub const POSIX_ROOT_DIR_MAP: &[(&str, &[&str])] = &[
    ("bin", &["PATH"]),
    ("include", &["CPATH"]),
    ("lib", &["LD_LIBRARY_PATH", "LIBRARY_PATH"]),
    ("pkgconfig", &["PKG_CONFIG_PATH"]),
];

#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: &str = ":";

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("read env directive {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("env directive {path} has unknown operation '{op}'")]
    UnknownOperation { path: Utf8PathBuf, op: String },

    #[error("env directive path {0} is not valid UTF-8")]
    NonUtf8Path(std::path::PathBuf),
}

/// The accumulating variable set for one group build.
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
    vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Seed from the caller's environment, keeping only allowlisted
    /// variables and the path-list variables of the root-dir map.
    pub fn new<I>(environ: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = environ
            .into_iter()
            .filter(|(k, _)| is_allowlisted(k))
            .collect();
        Self { vars }
    }

    /// Seed directly from an explicit variable set.
    pub fn from_vars(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Fold a layer directory's conventional subdirectories into the
    /// path-list variables they extend. Missing subdirectories are skipped.
    pub fn add_root_dir(&mut self, layer_dir: &Utf8Path) -> Result<(), EnvError> {
        for (base, var_names) in POSIX_ROOT_DIR_MAP {
            let child = layer_dir.join(base);
            if !child.is_dir() {
                continue;
            }
            debug!(dir = %child, "adding layer root dir");
            for name in *var_names {
                let joined = match self.vars.get(*name) {
                    Some(existing) => format!("{child}{PATH_LIST_SEPARATOR}{existing}"),
                    None => child.to_string(),
                };
                self.vars.insert((*name).to_string(), joined);
            }
        }
        Ok(())
    }

    /// Apply every directive file directly inside `dir`. A missing directory
    /// is not an error; an unreadable file or unknown operator suffix is.
    ///
    /// The buildpack API decides what a bare filename means: an override for
    /// 0.5 and later, a path-separated prepend before that.
    pub fn add_env_dir(&mut self, dir: &Utf8Path, api: ApiVersion) -> Result<(), EnvError> {
        let directives = match read_directives(dir)? {
            Some(d) => d,
            None => return Ok(()),
        };
        debug!(dir = %dir, count = directives.files.len(), "applying env directives");

        // Precedence classes keep composition within one directory
        // commutative per variable name; files stay lexical within a class.
        for file in directives.of_class(api, Op::Override) {
            self.vars.insert(file.name.clone(), file.value.clone());
        }
        for file in directives.of_class(api, Op::Default) {
            if !self.vars.contains_key(&file.name) {
                self.vars.insert(file.name.clone(), file.value.clone());
            }
        }
        for file in &directives.files {
            match file.op.effective(api) {
                Op::Prepend => {
                    let delim = directives.delim(&file.name, file.op == Op::Bare);
                    let rest = self.vars.get(&file.name).cloned().unwrap_or_default();
                    self.vars
                        .insert(file.name.clone(), format!("{}{}{}", file.value, delim, rest));
                }
                Op::Append => {
                    let delim = directives.delim(&file.name, false);
                    let front = self.vars.get(&file.name).cloned().unwrap_or_default();
                    self.vars
                        .insert(file.name.clone(), format!("{}{}{}", front, delim, file.value));
                }
                Op::Override | Op::Default | Op::Bare | Op::Delim => {}
            }
        }
        Ok(())
    }

    /// The composed variables plus everything under `platform_dir/env/`,
    /// rendered for a child process. A platform file wins over an
    /// accumulated variable of the same name.
    pub fn with_platform(&self, platform_dir: &Utf8Path) -> Result<Vec<(String, String)>, EnvError> {
        let mut vars = self.vars.clone();
        let env_dir = platform_dir.join("env");
        for entry in read_dir_sorted(&env_dir)? {
            let contents = fs::read_to_string(&entry.path).map_err(|source| EnvError::Io {
                path: entry.path.clone(),
                source,
            })?;
            vars.insert(entry.file_name, contents);
        }
        Ok(vars.into_iter().collect())
    }

    /// The composed variables alone, for buildpacks that cleared their
    /// environment.
    pub fn list(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn is_allowlisted(key: &str) -> bool {
    BUILD_ENV_ALLOWLIST.contains(&key)
        || POSIX_ROOT_DIR_MAP
            .iter()
            .any(|(_, vars)| vars.contains(&key))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Override,
    Default,
    Prepend,
    Append,
    Delim,
    Bare,
}

impl Op {
    fn parse(suffix: &str) -> Option<Op> {
        match suffix {
            "override" => Some(Op::Override),
            "default" => Some(Op::Default),
            "prepend" => Some(Op::Prepend),
            "append" => Some(Op::Append),
            "delim" => Some(Op::Delim),
            _ => None,
        }
    }

    /// Bare filenames changed meaning at API 0.5: they became overrides
    /// instead of path-separated prepends.
    fn effective(self, api: ApiVersion) -> Op {
        match self {
            Op::Bare if api >= ApiVersion::V0_5 => Op::Override,
            Op::Bare => Op::Prepend,
            other => other,
        }
    }
}

/// One parsed directive file. The containing `Directives.files` list is
/// lexical by filename, which fixes application order within a class.
#[derive(Debug)]
struct DirectiveFile {
    name: String,
    op: Op,
    value: String,
}

#[derive(Debug)]
struct Directives {
    files: Vec<DirectiveFile>,
    delims: BTreeMap<String, String>,
}

impl Directives {
    /// Files whose effective class under `api` matches, lexical by filename.
    fn of_class(&self, api: ApiVersion, op: Op) -> impl Iterator<Item = &DirectiveFile> {
        self.files.iter().filter(move |f| f.op.effective(api) == op)
    }

    /// The delimiter for prepend/append on `name`. Bare-file prepends always
    /// use the OS separator; everything else honors a sibling `.delim` file.
    fn delim(&self, name: &str, bare: bool) -> &str {
        if bare {
            return PATH_LIST_SEPARATOR;
        }
        self.delims
            .get(name)
            .map(String::as_str)
            .unwrap_or(PATH_LIST_SEPARATOR)
    }
}

struct DirEntry {
    file_name: String,
    path: Utf8PathBuf,
}

/// Regular files directly inside `dir`, lexical by name. `Ok(empty)` when
/// the directory does not exist.
fn read_dir_sorted(dir: &Utf8Path) -> Result<Vec<DirEntry>, EnvError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(EnvError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| EnvError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(EnvError::NonUtf8Path)?;
        if !path.is_file() {
            continue;
        }
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string();
        out.push(DirEntry { file_name, path });
    }
    out.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(out)
}

fn read_directives(dir: &Utf8Path) -> Result<Option<Directives>, EnvError> {
    let entries = read_dir_sorted(dir)?;
    if entries.is_empty() {
        return Ok(None);
    }

    let mut files = Vec::new();
    let mut delims = BTreeMap::new();
    for entry in entries {
        let value = fs::read_to_string(&entry.path).map_err(|source| EnvError::Io {
            path: entry.path.clone(),
            source,
        })?;
        let (name, op) = match entry.file_name.split_once('.') {
            None => (entry.file_name.clone(), Op::Bare),
            Some((base, suffix)) => match Op::parse(suffix) {
                Some(op) => (base.to_string(), op),
                None => {
                    return Err(EnvError::UnknownOperation {
                        path: entry.path,
                        op: suffix.to_string(),
                    })
                }
            },
        };
        if op == Op::Delim {
            delims.insert(name, value);
            continue;
        }
        files.push(DirectiveFile { name, op, value });
    }
    Ok(Some(Directives { files, delims }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    fn write(dir: &Utf8Path, name: &str, contents: &str) {
        fs::create_dir_all(dir).expect("create dir");
        fs::write(dir.join(name), contents).expect("write directive");
    }

    #[test]
    fn new_filters_to_allowlist_and_root_dir_vars() {
        let env = BuildEnv::new(vec![
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("HOME".to_string(), "/home/dev".to_string()),
            ("SECRET_TOKEN".to_string(), "hunter2".to_string()),
        ]);
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.get("HOME"), Some("/home/dev"));
        assert_eq!(env.get("SECRET_TOKEN"), None);
    }

    #[test]
    fn add_root_dir_prepends_existing_subdirs() {
        let temp = TempDir::new().expect("temp dir");
        let layer = utf8(&temp);
        fs::create_dir_all(layer.join("bin")).expect("mkdir bin");
        fs::create_dir_all(layer.join("lib")).expect("mkdir lib");

        let mut env = BuildEnv::from_vars(BTreeMap::from([(
            "PATH".to_string(),
            "/usr/bin".to_string(),
        )]));
        env.add_root_dir(&layer).expect("add root dir");

        assert_eq!(
            env.get("PATH"),
            Some(format!("{}/bin:/usr/bin", layer).as_str())
        );
        assert_eq!(env.get("LD_LIBRARY_PATH"), Some(format!("{}/lib", layer).as_str()));
        assert_eq!(env.get("LIBRARY_PATH"), Some(format!("{}/lib", layer).as_str()));
        assert_eq!(env.get("CPATH"), None);
    }

    #[test]
    fn add_env_dir_applies_operator_suffixes() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "A.override", "set");
        write(&dir, "B.default", "fallback");
        write(&dir, "C.prepend", "/new");
        write(&dir, "D.append", "tail");

        let mut env = BuildEnv::from_vars(BTreeMap::from([
            ("A".to_string(), "old".to_string()),
            ("C".to_string(), "/old".to_string()),
            ("D".to_string(), "head".to_string()),
        ]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");

        assert_eq!(env.get("A"), Some("set"));
        assert_eq!(env.get("B"), Some("fallback"));
        assert_eq!(env.get("C"), Some("/new:/old"));
        assert_eq!(env.get("D"), Some("head:tail"));
    }

    #[test]
    fn default_does_not_replace_set_values() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "A.default", "fallback");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("A".to_string(), "kept".to_string())]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");
        assert_eq!(env.get("A"), Some("kept"));
    }

    #[test]
    fn default_keys_off_presence_not_emptiness() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "A.default", "fallback");

        // A variable deliberately set to the empty string stays empty.
        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("A".to_string(), String::new())]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");
        assert_eq!(env.get("A"), Some(""));
    }

    #[test]
    fn delim_file_parameterizes_prepend_and_append() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "FLAGS.prepend", "-O2");
        write(&dir, "FLAGS.delim", " ");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("FLAGS".to_string(), "-Wall".to_string())]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");
        assert_eq!(env.get("FLAGS"), Some("-O2 -Wall"));
    }

    #[test]
    fn empty_delim_is_legal() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "JOINED.append", "b");
        write(&dir, "JOINED.delim", "");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("JOINED".to_string(), "a".to_string())]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");
        assert_eq!(env.get("JOINED"), Some("ab"));
    }

    #[test]
    fn bare_name_overrides_on_current_api() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "VAR", "new");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("VAR".to_string(), "old".to_string())]));
        env.add_env_dir(&dir, ApiVersion::V0_5).expect("apply");
        assert_eq!(env.get("VAR"), Some("new"));
    }

    #[test]
    fn bare_name_prepends_on_legacy_api() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "VAR", "new");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("VAR".to_string(), "old".to_string())]));
        env.add_env_dir(&dir, ApiVersion::new(0, 4)).expect("apply");
        assert_eq!(env.get("VAR"), Some("new:old"));
    }

    #[test]
    fn layers_compose_in_application_order() {
        // Two layers each prepend to PATH; the later layer ends up in front.
        let temp1 = TempDir::new().expect("temp dir");
        let temp2 = TempDir::new().expect("temp dir");
        let dir1 = utf8(&temp1);
        let dir2 = utf8(&temp2);
        write(&dir1, "PATH.prepend", "/x");
        write(&dir1, "PATH.delim", ":");
        write(&dir2, "PATH.prepend", "/y");

        let mut env =
            BuildEnv::from_vars(BTreeMap::from([("PATH".to_string(), "/usr/bin".to_string())]));
        env.add_env_dir(&dir1, ApiVersion::V0_5).expect("layer1");
        env.add_env_dir(&dir2, ApiVersion::V0_5).expect("layer2");
        assert_eq!(env.get("PATH"), Some("/y:/x:/usr/bin"));
    }

    #[test]
    fn unknown_suffix_is_fatal() {
        let temp = TempDir::new().expect("temp dir");
        let dir = utf8(&temp);
        write(&dir, "VAR.bogus", "x");

        let mut env = BuildEnv::default();
        let err = env
            .add_env_dir(&dir, ApiVersion::V0_5)
            .expect_err("must fail");
        assert!(err.to_string().contains("unknown operation 'bogus'"));
    }

    #[test]
    fn missing_env_dir_is_skipped() {
        let mut env = BuildEnv::default();
        env.add_env_dir(Utf8Path::new("/does/not/exist"), ApiVersion::V0_5)
            .expect("missing dir is fine");
    }

    #[test]
    fn with_platform_merges_platform_files_over_vars() {
        let temp = TempDir::new().expect("temp dir");
        let platform = utf8(&temp);
        write(&platform.join("env"), "SOME_VAR", "some-data");
        write(&platform.join("env"), "PATH", "/platform/bin");

        let env = BuildEnv::from_vars(BTreeMap::from([
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("HOME".to_string(), "/home/dev".to_string()),
        ]));
        let rendered = env.with_platform(&platform).expect("render");
        let map: BTreeMap<_, _> = rendered.into_iter().collect();
        assert_eq!(map.get("SOME_VAR").map(String::as_str), Some("some-data"));
        assert_eq!(map.get("PATH").map(String::as_str), Some("/platform/bin"));
        assert_eq!(map.get("HOME").map(String::as_str), Some("/home/dev"));
    }

    #[test]
    fn list_renders_vars_alone() {
        let temp = TempDir::new().expect("temp dir");
        let platform = utf8(&temp);
        write(&platform.join("env"), "SOME_VAR", "some-data");

        let env = BuildEnv::from_vars(BTreeMap::from([(
            "HOME".to_string(),
            "/home/dev".to_string(),
        )]));
        assert_eq!(env.list(), vec![("HOME".to_string(), "/home/dev".to_string())]);
    }
}
