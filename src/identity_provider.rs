//! The identity provider collaborator.
//!
//! Dex delegates authentication to an upstream identity provider. Everything that depends on
//! which provider is configured (connector settings, credentials, extra environment, volumes and
//! the public URI of the manager) is supplied through [IdentityProviderConfig], so the renderer
//! never needs to know the concrete provider.

use k8s_openapi::api::core::v1::{EnvVar, Secret, Volume, VolumeMount};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod oidc;

#[derive(Error, Debug, PartialEq)]
pub enum IdentityProviderError {
    #[error("secret `{secret}` is missing the required key `{key}`")]
    MissingSecretKey { secret: String, key: String },
    #[error("invalid identity provider configuration: {0}")]
    InvalidConfig(String),
}

/// Capabilities the Dex renderer needs from the configured identity provider.
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProviderConfig {
    /// Connector section of the Dex configuration. Passed through without interpretation.
    fn connector(&self) -> serde_yaml::Mapping;
    /// Secrets that must exist in `namespace`.
    fn required_secrets(&self, namespace: &str) -> Vec<Secret>;
    /// Environment of the Dex container, each name prefixed with `prefix`.
    fn required_env(&self, prefix: &str) -> Vec<EnvVar>;
    fn required_volumes(&self) -> Vec<Volume>;
    fn required_volume_mounts(&self) -> Vec<VolumeMount>;
    /// Pod annotations, typically hashes that roll the pods when credentials change.
    fn required_annotations(&self) -> BTreeMap<String, String>;
    /// Public URI the manager is reachable at. Empty when unknown.
    fn manager_uri(&self) -> String;
    /// Secret holding only the Dex certificate, for clients that need to trust Dex.
    fn create_cert_secret(&self) -> Option<Secret>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Identity provider returning fixed values.
    #[derive(Debug, Default, Clone)]
    pub struct StaticIdentityProvider {
        pub connector: serde_yaml::Mapping,
        pub secrets: Vec<Secret>,
        pub env: Vec<EnvVar>,
        pub volumes: Vec<Volume>,
        pub volume_mounts: Vec<VolumeMount>,
        pub annotations: BTreeMap<String, String>,
        pub manager_uri: String,
        pub cert_secret: Option<Secret>,
    }

    impl StaticIdentityProvider {
        pub fn with_manager_uri(manager_uri: &str) -> Self {
            Self {
                manager_uri: manager_uri.to_string(),
                ..Default::default()
            }
        }
    }

    impl IdentityProviderConfig for StaticIdentityProvider {
        fn connector(&self) -> serde_yaml::Mapping {
            self.connector.clone()
        }

        fn required_secrets(&self, namespace: &str) -> Vec<Secret> {
            crate::secret::copy_to_namespace(namespace, &self.secrets)
        }

        fn required_env(&self, prefix: &str) -> Vec<EnvVar> {
            self.env
                .iter()
                .cloned()
                .map(|mut var| {
                    var.name = format!("{prefix}{}", var.name);
                    var
                })
                .collect()
        }

        fn required_volumes(&self) -> Vec<Volume> {
            self.volumes.clone()
        }

        fn required_volume_mounts(&self) -> Vec<VolumeMount> {
            self.volume_mounts.clone()
        }

        fn required_annotations(&self) -> BTreeMap<String, String> {
            self.annotations.clone()
        }

        fn manager_uri(&self) -> String {
            self.manager_uri.clone()
        }

        fn create_cert_secret(&self) -> Option<Secret> {
            self.cert_secret.clone()
        }
    }
}
