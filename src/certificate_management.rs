//! Objects needed when TLS material is provisioned through certificate signing requests.

use crate::installation::CertificateManagement;
use crate::meta::base_security_context;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, VolumeMount,
};
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

pub const CSR_INIT_CONTAINER_NAME: &str = "key-cert-provisioner";
pub const CSR_MOUNT_PATH: &str = "/certs-share";
pub const CSR_CREATOR_CLUSTER_ROLE: &str = "tigera-csr-creator";

/// Parameters of a key/certificate provisioning init container.
#[derive(Debug, Clone)]
pub struct CsrInitContainer<'a> {
    pub certificate_management: &'a CertificateManagement,
    pub image: &'a str,
    /// Volume shared with the main container where the key pair is written.
    pub mount_name: &'a str,
    pub common_name: &'a str,
    pub key_name: &'a str,
    pub cert_name: &'a str,
    pub dns_names: Vec<String>,
    pub app_name: &'a str,
}

impl CsrInitContainer<'_> {
    pub fn build(self) -> Container {
        let cm = self.certificate_management;
        Container {
            name: CSR_INIT_CONTAINER_NAME.to_string(),
            image: Some(self.image.to_string()),
            volume_mounts: Some(vec![VolumeMount {
                name: self.mount_name.to_string(),
                mount_path: CSR_MOUNT_PATH.to_string(),
                read_only: Some(false),
                ..Default::default()
            }]),
            env: Some(vec![
                env_value("SIGNER", &cm.signer_name),
                env_value("COMMON_NAME", self.common_name),
                env_value("KEY_ALGORITHM", &cm.key_algorithm),
                env_value("SIGNATURE_ALGORITHM", &cm.signature_algorithm),
                env_value("CERTIFICATE_PATH", &format!("{CSR_MOUNT_PATH}/")),
                env_value("KEY_NAME", self.key_name),
                env_value("CERT_NAME", self.cert_name),
                env_value("CA_CERT", &cm.ca_cert),
                env_value("APP_NAME", self.app_name),
                env_value("DNS_NAMES", &self.dns_names.join(",")),
                env_field_ref("POD_IP", "status.podIP"),
                env_field_ref("POD_NAMESPACE", "metadata.namespace"),
            ]),
            security_context: Some(base_security_context()),
            ..Default::default()
        }
    }
}

/// Grants the service account `name` in `namespace` permission to create CSRs.
pub fn csr_cluster_role_binding(name: &str, namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(format!("{name}:csr-creator")),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: CSR_CREATOR_CLUSTER_ROLE.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    }
}

fn env_value(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn env_field_ref(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}
