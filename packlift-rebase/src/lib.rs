//! Rebase a built application image onto an updated run image.
//!
//! Responsibilities:
//! - Validate that the app image and the new base share a stack.
//! - Swap the base layers through the transport's [`Image`] capability while
//!   every application layer stays bit-identical.
//! - Rewrite the layers-metadata label to point at the new base.
//! - Save to each destination tag and report what was written.
//!
//! Label rewriting happens only after a successful swap, and the report only
//! records tags whose save succeeded.

mod error;
mod mirror;
mod ports;

pub use error::RebaseError;
pub use mirror::{best_run_image_mirror, registry_of};
pub use ports::{Image, RegistryHandler};

use packlift_types::labels;
use packlift_types::metadata::{decode_label, encode_label, LayersMetadata};
use packlift_types::report::{RebaseReport, SavedImage};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct Rebaser;

impl Rebaser {
    /// Rebase `app` onto `new_base`, then save to the app image's own
    /// reference plus each additional tag.
    pub fn rebase(
        &self,
        app: &mut dyn Image,
        new_base: &dyn Image,
        additional_tags: &[String],
    ) -> Result<RebaseReport, RebaseError> {
        let app_name = app.name();
        let mut metadata: LayersMetadata = read_label(app, labels::LAYER_METADATA)?;

        let app_stack = required_label(app, labels::STACK_ID)?;
        let base_stack = required_label(new_base, labels::STACK_ID)?;
        if app_stack != base_stack {
            return Err(RebaseError::IncompatibleStack {
                app: app_stack,
                new_base: base_stack,
            });
        }
        debug!(stack = %app_stack, "stacks are compatible");

        app.rebase(&metadata.run_image.top_layer, new_base)
            .map_err(|source| RebaseError::Swap {
                image: app_name.clone(),
                source,
            })?;

        metadata.run_image.top_layer =
            new_base.top_layer().map_err(|source| RebaseError::Image {
                image: new_base.name(),
                source,
            })?;
        metadata.run_image.reference =
            new_base.digest().map_err(|source| RebaseError::Image {
                image: new_base.name(),
                source,
            })?;
        metadata.stack.run_image.image = new_base.name();

        let encoded =
            encode_label(&metadata).map_err(|source| RebaseError::Metadata {
                image: app_name.clone(),
                source,
            })?;
        app.set_label(labels::LAYER_METADATA, &encoded)
            .map_err(|source| RebaseError::Image {
                image: app_name.clone(),
                source,
            })?;

        let mut report = RebaseReport::default();
        let tags = std::iter::once(app_name).chain(additional_tags.iter().cloned());
        for tag in tags {
            let digest = app.save_as(&tag).map_err(|source| RebaseError::Save {
                tag: tag.clone(),
                source,
                saved: report.images.clone(),
            })?;
            info!(%tag, %digest, "saved rebased image");
            report.images.push(SavedImage { tag, digest });
        }
        Ok(report)
    }
}

fn read_label<T>(image: &dyn Image, name: &str) -> Result<T, RebaseError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let raw = image.label(name).map_err(|source| RebaseError::Image {
        image: image.name(),
        source,
    })?;
    decode_label(raw.as_deref().unwrap_or_default()).map_err(|source| RebaseError::Metadata {
        image: image.name(),
        source,
    })
}

fn required_label(image: &dyn Image, name: &str) -> Result<String, RebaseError> {
    let value = image.label(name).map_err(|source| RebaseError::Image {
        image: image.name(),
        source,
    })?;
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RebaseError::StackUndefined {
            image: image.name(),
        }),
    }
}
