use thiserror::Error;

/// Error resolving a single image reference.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageReferenceError {
    #[error("ImageSet `{image_set}` did not contain image `{image}`")]
    NotInImageSet { image_set: String, image: String },
}

/// Every image resolution failure of a single `resolve_images` call.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", join_errors(.0))]
pub struct ResolveImagesError(pub Vec<ImageReferenceError>);

impl ResolveImagesError {
    pub fn errors(&self) -> &[ImageReferenceError] {
        &self.0
    }

    /// Returns `Ok` when no error was collected.
    pub fn from_errors(errors: Vec<ImageReferenceError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self(errors))
        }
    }
}

fn join_errors(errors: &[ImageReferenceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
