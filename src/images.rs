//! Resolution of logical component images into pullable references.
//!
//! A reference is built from the registry (installation override or the component default),
//! the image name (optionally moved to a different path) and either the component version tag
//! or, when an [ImageSet] is in use, the pinned digest.

use crate::installation::InstallationSpec;
use serde::Deserialize;
use tracing::debug;

mod error;

pub use error::{ImageReferenceError, ResolveImagesError};

/// Registry every enterprise component is published to.
pub const TIGERA_REGISTRY: &str = "gcr.io/unique-caldron-775/cnx/";

/// A logical component image and the defaults used to build its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentImage {
    pub image: &'static str,
    pub version: &'static str,
    pub registry: &'static str,
}

pub const COMPONENT_DEX: ComponentImage = ComponentImage {
    image: "tigera/dex",
    version: "v3.10.0",
    registry: TIGERA_REGISTRY,
};

pub const COMPONENT_CSR_INIT_CONTAINER: ComponentImage = ComponentImage {
    image: "tigera/key-cert-provisioner",
    version: "v1.1.1",
    registry: TIGERA_REGISTRY,
};

/// Set of images pinned to exact digests.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ImageSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<PinnedImage>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PinnedImage {
    pub image: String,
    pub digest: String,
}

impl ImageSet {
    /// Returns the digest pinned for `image`, if any.
    pub fn digest_for(&self, image: &str) -> Option<&str> {
        self.images
            .iter()
            .find(|pinned| pinned.image == image)
            .map(|pinned| pinned.digest.as_str())
    }
}

/// Builds the reference `component` should be pulled from.
pub fn get_reference(
    component: &ComponentImage,
    registry: &str,
    image_path: &str,
    image_set: Option<&ImageSet>,
) -> Result<String, ImageReferenceError> {
    let registry = normalize_registry(registry, component.registry);
    let image = replace_image_path(component.image, image_path);

    let reference = match image_set {
        None => format!("{registry}{image}:{}", component.version),
        Some(image_set) => {
            let digest = image_set.digest_for(component.image).ok_or_else(|| {
                ImageReferenceError::NotInImageSet {
                    image_set: image_set.name.clone(),
                    image: component.image.to_string(),
                }
            })?;
            format!("{registry}{image}@{digest}")
        }
    };
    debug!(component = component.image, %reference, "image reference resolved");
    Ok(reference)
}

/// Resolves the image of the init container that provisions certificates through CSRs.
pub fn resolve_csr_init_image(
    installation: &InstallationSpec,
    image_set: Option<&ImageSet>,
) -> Result<String, ImageReferenceError> {
    get_reference(
        &COMPONENT_CSR_INIT_CONTAINER,
        &installation.registry,
        &installation.image_path,
        image_set,
    )
}

fn normalize_registry(registry: &str, default: &str) -> String {
    if registry.is_empty() {
        return default.to_string();
    }
    if registry.ends_with('/') {
        registry.to_string()
    } else {
        format!("{registry}/")
    }
}

fn replace_image_path(image: &str, image_path: &str) -> String {
    if image_path.is_empty() {
        return image.to_string();
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    format!("{}/{name}", image_path.trim_end_matches('/'))
}
