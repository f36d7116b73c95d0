//! Launch-time artefacts a buildpack may declare.

use serde::{Deserialize, Serialize};

/// A process type the final image can be launched with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Process {
    #[serde(rename = "type")]
    pub r#type: String,

    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub direct: bool,

    /// Stamped by the executor from the producing buildpack; buildpacks do
    /// not write this themselves.
    #[serde(default, rename = "buildpack-id", skip_serializing_if = "String::is_empty")]
    pub buildpack_id: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// An arbitrary key/value pair to set on the output image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

/// Glob patterns the exporter packs into a dedicated application layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(default)]
    pub paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_round_trips_with_stamped_buildpack() {
        let process = Process {
            r#type: "web".into(),
            command: "server".into(),
            args: vec!["--port".into(), "8080".into()],
            direct: true,
            buildpack_id: "example/a".into(),
        };
        let encoded = toml::to_string(&process).expect("encode");
        let decoded: Process = toml::from_str(&encoded).expect("decode");
        assert_eq!(process, decoded);
    }

    #[test]
    fn minimal_process_omits_optional_keys() {
        let process = Process {
            r#type: "worker".into(),
            command: "run".into(),
            ..Process::default()
        };
        let encoded = toml::to_string(&process).expect("encode");
        assert!(!encoded.contains("args"));
        assert!(!encoded.contains("direct"));
        assert!(!encoded.contains("buildpack-id"));
    }
}
