//! Port traits abstracting image transport away from the rebaser.
//!
//! The transport (daemon client, registry client, OCI layout) owns auth and
//! byte movement; the rebaser only performs metadata surgery through this
//! interface.

/// Mutable handle to an image held by the transport layer.
pub trait Image {
    /// The primary reference this handle was opened with.
    fn name(&self) -> String;

    fn label(&self, name: &str) -> anyhow::Result<Option<String>>;

    fn set_label(&mut self, name: &str, value: &str) -> anyhow::Result<()>;

    /// Layer digests, bottom-most first.
    fn layers(&self) -> anyhow::Result<Vec<String>>;

    /// Digest of the image's topmost layer.
    fn top_layer(&self) -> anyhow::Result<String>;

    /// Content digest of the image as currently constituted.
    fn digest(&self) -> anyhow::Result<String>;

    /// Replace every layer up to and including `top_layer` with the layers
    /// of `new_base`, keeping the layers above it untouched.
    fn rebase(&mut self, top_layer: &str, new_base: &dyn Image) -> anyhow::Result<()>;

    /// Write the image to `tag` and return the digest it was saved under.
    fn save_as(&mut self, tag: &str) -> anyhow::Result<String>;
}

/// Registry access checks, injected so callers can probe mirrors without the
/// rebaser knowing about keychains.
pub trait RegistryHandler {
    fn ensure_read_access(&self, image_ref: &str) -> bool;
}
