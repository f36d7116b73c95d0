//! Run-image mirror selection.

use crate::error::RebaseError;
use crate::ports::RegistryHandler;
use packlift_types::metadata::StackRunImage;
use tracing::debug;

const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Pick the run image to rebase onto: prefer a reference on the same
/// registry as the target (in list order), otherwise the first reference the
/// probe can read.
pub fn best_run_image_mirror(
    target_registry: &str,
    run_image: &StackRunImage,
    registry: &dyn RegistryHandler,
) -> Result<String, RebaseError> {
    if run_image.image.is_empty() {
        return Err(RebaseError::MissingRunImage);
    }

    let candidates: Vec<&str> = std::iter::once(run_image.image.as_str())
        .chain(run_image.mirrors.iter().map(String::as_str))
        .collect();

    for candidate in &candidates {
        if registry_of(candidate) == target_registry && registry.ensure_read_access(candidate) {
            debug!(run_image = candidate, "selected run image on target registry");
            return Ok((*candidate).to_string());
        }
    }
    for candidate in &candidates {
        if registry.ensure_read_access(candidate) {
            debug!(run_image = candidate, "selected first accessible run image");
            return Ok((*candidate).to_string());
        }
    }
    Err(RebaseError::NoAccessibleRunImage)
}

/// The registry component of an image reference, following container
/// reference convention: the first path segment counts as a registry only
/// when it contains a dot or port, or is `localhost`.
pub fn registry_of(image_ref: &str) -> &str {
    match image_ref.split_once('/') {
        Some((first, _))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            first
        }
        _ => DEFAULT_REGISTRY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    struct Probe {
        readable: BTreeSet<String>,
    }

    impl Probe {
        fn allowing(refs: &[&str]) -> Self {
            Self {
                readable: refs.iter().map(|r| r.to_string()).collect(),
            }
        }
    }

    impl RegistryHandler for Probe {
        fn ensure_read_access(&self, image_ref: &str) -> bool {
            self.readable.contains(image_ref)
        }
    }

    fn run_image(image: &str, mirrors: &[&str]) -> StackRunImage {
        StackRunImage {
            image: image.to_string(),
            mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
        }
    }

    #[test]
    fn registry_of_follows_reference_convention() {
        assert_eq!(registry_of("r.example/run"), "r.example");
        assert_eq!(registry_of("localhost/run"), "localhost");
        assert_eq!(registry_of("registry:5000/run"), "registry:5000");
        assert_eq!(registry_of("library/run"), "index.docker.io");
        assert_eq!(registry_of("run"), "index.docker.io");
    }

    #[test]
    fn prefers_target_registry_over_list_order() {
        let md = run_image("main.example/run", &["other.example/run", "r.example/run"]);
        let probe = Probe::allowing(&["main.example/run", "other.example/run", "r.example/run"]);
        let chosen = best_run_image_mirror("r.example", &md, &probe).expect("select");
        assert_eq!(chosen, "r.example/run");
    }

    #[test]
    fn falls_back_to_first_accessible_reference() {
        let md = run_image("main.example/run", &["other.example/run"]);
        let probe = Probe::allowing(&["other.example/run"]);
        let chosen = best_run_image_mirror("r.example", &md, &probe).expect("select");
        assert_eq!(chosen, "other.example/run");
    }

    #[test]
    fn inaccessible_target_registry_entry_is_skipped() {
        let md = run_image("r.example/stale", &["other.example/run"]);
        let probe = Probe::allowing(&["other.example/run"]);
        let chosen = best_run_image_mirror("r.example", &md, &probe).expect("select");
        assert_eq!(chosen, "other.example/run");
    }

    #[test]
    fn no_accessible_reference_is_fatal() {
        let md = run_image("main.example/run", &["other.example/run"]);
        let probe = Probe::allowing(&[]);
        let err = best_run_image_mirror("r.example", &md, &probe).expect_err("must fail");
        assert!(err.to_string().contains("failed to find accessible run image"));
    }

    #[test]
    fn missing_image_is_fatal() {
        let md = run_image("", &["other.example/run"]);
        let probe = Probe::allowing(&["other.example/run"]);
        let err = best_run_image_mirror("r.example", &md, &probe).expect_err("must fail");
        assert!(err.to_string().contains("missing run image metadata"));
    }
}
