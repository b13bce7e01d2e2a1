//! The contract every renderable subsystem fulfils towards the reconciliation engine.

use crate::images::{ImageSet, ResolveImagesError};
use crate::meta::OsType;
use crate::object::RenderedObjects;
use tracing::{debug, info, warn};

/// A renderable subsystem.
///
/// [Component::resolve_images] must be called before [Component::objects] whenever image
/// references depend on an [ImageSet]. Rendering before that yields empty image references.
pub trait Component {
    /// Resolves every image the component needs. All lookups are attempted, and every failure
    /// is reported in the returned error.
    fn resolve_images(&mut self, image_set: Option<&ImageSet>) -> Result<(), ResolveImagesError>;

    fn supported_os_type(&self) -> OsType;

    /// Objects to create and to delete for the current configuration. Never fails.
    fn objects(&self) -> RenderedObjects;

    /// Whether the component's external prerequisites are in place.
    fn ready(&self) -> bool;
}

/// Resolves the images of `component` and renders its objects.
pub fn render<C>(
    component: &mut C,
    image_set: Option<&ImageSet>,
) -> Result<RenderedObjects, ResolveImagesError>
where
    C: Component + ?Sized,
{
    component.resolve_images(image_set).inspect_err(|err| {
        warn!(errors = err.errors().len(), "could not resolve component images: {err}");
    })?;

    if !component.ready() {
        debug!("component reports it is not ready yet");
    }

    let objects = component.objects();
    info!(
        os = %component.supported_os_type(),
        to_create = objects.to_create.len(),
        to_delete = objects.to_delete.len(),
        "component rendered"
    );
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageReferenceError;
    use assert_matches::assert_matches;
    use mockall::mock;
    use tracing_test::traced_test;

    mock! {
        pub ComponentMock {}

        impl Component for ComponentMock {
            fn resolve_images<'a>(&mut self, image_set: Option<&'a ImageSet>) -> Result<(), ResolveImagesError>;
            fn supported_os_type(&self) -> OsType;
            fn objects(&self) -> RenderedObjects;
            fn ready(&self) -> bool;
        }
    }

    #[test]
    #[traced_test]
    fn test_render_resolves_before_rendering() {
        let mut seq = mockall::Sequence::new();
        let mut component = MockComponentMock::new();
        component
            .expect_resolve_images()
            .once()
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        component.expect_ready().return_const(true);
        component
            .expect_objects()
            .once()
            .in_sequence(&mut seq)
            .returning(RenderedObjects::default);
        component
            .expect_supported_os_type()
            .return_const(OsType::Linux);

        let objects = render(&mut component, None).unwrap();
        assert!(objects.to_create.is_empty());
        assert!(logs_contain("component rendered"));
    }

    #[test]
    #[traced_test]
    fn test_render_stops_on_resolution_errors() {
        let mut component = MockComponentMock::new();
        component.expect_resolve_images().once().returning(|_| {
            Err(ResolveImagesError(vec![ImageReferenceError::NotInImageSet {
                image_set: "set".to_string(),
                image: "tigera/dex".to_string(),
            }]))
        });
        component.expect_objects().never();

        let result = render(&mut component, Some(&ImageSet::default()));
        assert_matches!(result, Err(err) => {
            assert_eq!(err.errors().len(), 1);
        });
        assert!(logs_contain("could not resolve component images"));
    }
}
