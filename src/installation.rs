//! Installation wide settings consumed by the component renderers.

use k8s_openapi::api::core::v1::Toleration;
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_KEY_ALGORITHM: &str = "RSAWithSize2048";
const DEFAULT_SIGNATURE_ALGORITHM: &str = "SHA256WithRSA";

/// Cluster level installation settings. Owned by the caller and never modified by a renderer.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct InstallationSpec {
    /// Registry to pull images from. Empty means each component's default registry.
    #[serde(default)]
    pub registry: String,
    /// Replaces the path of every image name when not empty.
    #[serde(default)]
    pub image_path: String,
    /// When set, TLS key material is provisioned through certificate signing requests.
    #[serde(default)]
    pub certificate_management: Option<CertificateManagement>,
    #[serde(default)]
    pub control_plane_node_selector: BTreeMap<String, String>,
    #[serde(default)]
    pub control_plane_tolerations: Vec<Toleration>,
}

impl InstallationSpec {
    pub fn certificate_management_enabled(&self) -> bool {
        self.certificate_management.is_some()
    }
}

/// Parameters used to request certificates from the cluster signer.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CertificateManagement {
    pub signer_name: String,
    /// PEM encoded certificate of the signer.
    #[serde(default)]
    pub ca_cert: String,
    #[serde(default = "default_key_algorithm")]
    pub key_algorithm: String,
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,
}

impl CertificateManagement {
    pub fn new(signer_name: impl Into<String>, ca_cert: impl Into<String>) -> Self {
        Self {
            signer_name: signer_name.into(),
            ca_cert: ca_cert.into(),
            key_algorithm: default_key_algorithm(),
            signature_algorithm: default_signature_algorithm(),
        }
    }
}

fn default_key_algorithm() -> String {
    DEFAULT_KEY_ALGORITHM.to_string()
}

fn default_signature_algorithm() -> String {
    DEFAULT_SIGNATURE_ALGORITHM.to_string()
}
