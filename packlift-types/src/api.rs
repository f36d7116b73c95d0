//! Buildpack API versions.
//!
//! Buildpack API versions look like semver but only ever carry two
//! components (`0.4`, `0.5`), so they get their own ordinal type instead of a
//! full semver dependency.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A buildpack API version, compared ordinally by `(major, minor)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl ApiVersion {
    pub const V0_2: ApiVersion = ApiVersion { major: 0, minor: 2 };
    pub const V0_5: ApiVersion = ApiVersion { major: 0, minor: 5 };
    pub const V0_6: ApiVersion = ApiVersion { major: 0, minor: 6 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// APIs before 0.5 may rewrite `plan.toml` in place; the rewritten plan
    /// is then the source of the bill of materials.
    pub fn rewrites_plan(&self) -> bool {
        *self < Self::V0_5
    }

    /// Starting with 0.6 the layer directive booleans live under a `[types]`
    /// table instead of at the top level.
    pub fn nested_layer_types(&self) -> bool {
        *self >= Self::V0_6
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid buildpack api version '{0}'")]
pub struct ParseApiVersionError(pub String);

impl FromStr for ApiVersion {
    type Err = ParseApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseApiVersionError(s.to_string());
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, "0"),
        };
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;
        Ok(ApiVersion { major, minor })
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ParseApiVersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(v: ApiVersion) -> String {
        v.to_string()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_component_versions() {
        let v: ApiVersion = "0.4".parse().expect("parse");
        assert_eq!(v, ApiVersion::new(0, 4));
    }

    #[test]
    fn single_component_implies_minor_zero() {
        let v: ApiVersion = "1".parse().expect("parse");
        assert_eq!(v, ApiVersion::new(1, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<ApiVersion>().is_err());
        assert!("0.4.1".parse::<ApiVersion>().is_err());
        assert!("v0.4".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn orders_ordinally() {
        let a: ApiVersion = "0.4".parse().unwrap();
        let b: ApiVersion = "0.5".parse().unwrap();
        let c: ApiVersion = "0.10".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
        assert!(a.rewrites_plan());
        assert!(!b.rewrites_plan());
    }

    #[test]
    fn round_trips_through_toml() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Doc {
            api: ApiVersion,
        }
        let doc: Doc = toml::from_str("api = \"0.6\"").expect("decode");
        assert_eq!(doc.api, ApiVersion::V0_6);
        let out = toml::to_string(&doc).expect("encode");
        assert!(out.contains("\"0.6\""));
    }
}
