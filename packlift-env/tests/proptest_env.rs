//! Property-based tests for deterministic env composition.
//!
//! These tests verify that:
//! - Applying the same directive directory twice to identical seeds yields
//!   identical variable sets.
//! - The order files were created in has no bearing on the outcome; only
//!   names and contents matter.

use camino::Utf8PathBuf;
use fs_err as fs;
use packlift_env::BuildEnv;
use packlift_types::api::ApiVersion;
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Directive {
    var: String,
    op: &'static str,
    value: String,
}

fn arb_directive() -> impl Strategy<Value = Directive> {
    (
        prop::sample::select(vec!["ALPHA", "BETA", "GAMMA", "DELTA"]),
        prop::sample::select(vec!["override", "default", "prepend", "append"]),
        "[a-z/]{0,8}",
    )
        .prop_map(|(var, op, value)| Directive {
            var: var.to_string(),
            op,
            value,
        })
}

fn arb_directives() -> impl Strategy<Value = Vec<Directive>> {
    prop::collection::vec(arb_directive(), 0..12).prop_map(|mut ds| {
        // One file per (var, op); later duplicates would overwrite earlier
        // ones on disk anyway.
        let mut seen = std::collections::BTreeSet::new();
        ds.retain(|d| seen.insert((d.var.clone(), d.op)));
        ds
    })
}

fn write_directives(directives: &[Directive]) -> (TempDir, Utf8PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
    for d in directives {
        fs::write(dir.join(format!("{}.{}", d.var, d.op)), &d.value).expect("write");
    }
    (temp, dir)
}

fn seed() -> BuildEnv {
    BuildEnv::from_vars(BTreeMap::from([
        ("ALPHA".to_string(), "a0".to_string()),
        ("GAMMA".to_string(), "g0".to_string()),
    ]))
}

proptest! {
    /// The same directory applied to the same seed composes identically.
    #[test]
    fn composition_is_deterministic(directives in arb_directives()) {
        let (_keep, dir) = write_directives(&directives);

        let mut env1 = seed();
        let mut env2 = seed();
        env1.add_env_dir(&dir, ApiVersion::V0_5).expect("apply 1");
        env2.add_env_dir(&dir, ApiVersion::V0_5).expect("apply 2");

        prop_assert_eq!(env1.list(), env2.list());
    }

    /// File creation order is irrelevant; only names and contents count.
    #[test]
    fn creation_order_is_irrelevant(directives in arb_directives()) {
        let (_keep_fwd, forward) = write_directives(&directives);
        let reversed: Vec<Directive> = directives.iter().rev().cloned().collect();
        let (_keep_rev, backward) = write_directives(&reversed);

        let mut env1 = seed();
        let mut env2 = seed();
        env1.add_env_dir(&forward, ApiVersion::V0_5).expect("apply forward");
        env2.add_env_dir(&backward, ApiVersion::V0_5).expect("apply backward");

        prop_assert_eq!(env1.list(), env2.list());
    }
}
