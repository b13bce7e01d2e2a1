//! Renderer for the Dex identity service.
//!
//! Dex runs as a single deployment in its own namespace, fronted by a service and configured
//! through a config map. What it authenticates against is decided by the injected
//! [IdentityProviderConfig].

use crate::certificate_management::csr_cluster_role_binding;
use crate::component::Component;
use crate::dns::DEFAULT_CLUSTER_DOMAIN;
use crate::identity_provider::IdentityProviderConfig;
use crate::images::{
    get_reference, resolve_csr_init_image, ImageSet, ResolveImagesError, COMPONENT_DEX,
};
use crate::installation::InstallationSpec;
use crate::meta::{OsType, DEFAULT_OPERATOR_NAMESPACE};
use crate::object::{RenderedObject, RenderedObjects};
use crate::secret;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::debug;

mod config_document;
mod workload;

pub use config_document::DexConfigDocument;

pub const DEX_NAMESPACE: &str = "tigera-dex";
pub const DEX_OBJECT_NAME: &str = "tigera-dex";
pub const DEX_PORT: i32 = 5556;
/// Secret holding only the certificate, mounted by clients that need to trust Dex.
pub const DEX_CERT_SECRET_NAME: &str = "tigera-dex-tls-crt";
/// Secret holding the key pair Dex serves TLS with.
pub const DEX_TLS_SECRET_NAME: &str = "tigera-dex-tls";
pub const DEX_CLIENT_ID: &str = "tigera-manager";
pub const DEX_CLIENT_NAME: &str = "Calico Enterprise Manager";
/// Environment variable Dex reads the manager client secret from.
pub const DEX_SECRET_ENV: &str = "DEX_SECRET";
/// Key of the configuration file in the Dex config map.
pub const DEX_CONFIG_KEY: &str = "config.yaml";
pub const DEFAULT_DEX_REPLICAS: i32 = 1;

/// Renders Dex for a given installation and identity provider.
pub struct DexComponent<I> {
    installation: InstallationSpec,
    identity_provider: I,
    connector: serde_yaml::Mapping,
    pull_secrets: Vec<Secret>,
    cluster_domain: String,
    operator_namespace: String,
    replicas: i32,
    image: String,
    csr_init_image: String,
}

impl<I: IdentityProviderConfig> DexComponent<I> {
    pub fn new(installation: InstallationSpec, identity_provider: I) -> Self {
        let connector = identity_provider.connector();
        Self {
            installation,
            identity_provider,
            connector,
            pull_secrets: Vec::new(),
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            replicas: DEFAULT_DEX_REPLICAS,
            image: String::new(),
            csr_init_image: String::new(),
        }
    }

    /// Secrets the Dex pods pull their images with. They are copied into the Dex namespace.
    pub fn with_pull_secrets(self, pull_secrets: Vec<Secret>) -> Self {
        Self {
            pull_secrets,
            ..self
        }
    }

    pub fn with_cluster_domain(self, cluster_domain: impl Into<String>) -> Self {
        Self {
            cluster_domain: cluster_domain.into(),
            ..self
        }
    }

    pub fn with_operator_namespace(self, operator_namespace: impl Into<String>) -> Self {
        Self {
            operator_namespace: operator_namespace.into(),
            ..self
        }
    }

    pub fn with_replicas(self, replicas: i32) -> Self {
        Self { replicas, ..self }
    }

    fn config_map(&self) -> ConfigMap {
        let document =
            DexConfigDocument::new(self.identity_provider.manager_uri(), self.connector.clone());
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(DEX_OBJECT_NAME.to_string()),
                namespace: Some(DEX_NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                DEX_CONFIG_KEY.to_string(),
                document.to_yaml(),
            )])),
            ..Default::default()
        }
    }
}

impl<I: IdentityProviderConfig> Component for DexComponent<I> {
    fn resolve_images(&mut self, image_set: Option<&ImageSet>) -> Result<(), ResolveImagesError> {
        let installation = &self.installation;
        let mut errors = Vec::new();

        match get_reference(
            &COMPONENT_DEX,
            &installation.registry,
            &installation.image_path,
            image_set,
        ) {
            Ok(image) => self.image = image,
            Err(err) => errors.push(err),
        }

        if installation.certificate_management_enabled() {
            match resolve_csr_init_image(installation, image_set) {
                Ok(image) => self.csr_init_image = image,
                Err(err) => errors.push(err),
            }
        }

        ResolveImagesError::from_errors(errors)
    }

    fn supported_os_type(&self) -> OsType {
        OsType::Linux
    }

    fn objects(&self) -> RenderedObjects {
        let mut objects: Vec<RenderedObject> = vec![
            self.service_account().into(),
            self.deployment().into(),
            self.service().into(),
            self.cluster_role().into(),
            self.cluster_role_binding().into(),
            self.config_map().into(),
        ];

        objects.extend(secret::to_rendered_objects(
            self.identity_provider
                .required_secrets(&self.operator_namespace),
        ));
        objects.extend(
            self.identity_provider
                .create_cert_secret()
                .map(RenderedObject::from),
        );
        objects.extend(secret::to_rendered_objects(
            self.identity_provider.required_secrets(DEX_NAMESPACE),
        ));
        objects.extend(secret::to_rendered_objects(secret::copy_to_namespace(
            DEX_NAMESPACE,
            &self.pull_secrets,
        )));

        if self.installation.certificate_management_enabled() {
            objects.push(csr_cluster_role_binding(DEX_OBJECT_NAME, DEX_NAMESPACE).into());
        }

        debug!(objects = objects.len(), "dex objects rendered");
        RenderedObjects::new(objects, Vec::new())
    }

    fn ready(&self) -> bool {
        true
    }
}
