use super::{DexComponent, DEX_NAMESPACE, DEX_OBJECT_NAME, DEX_PORT};
use crate::certificate_management::CsrInitContainer;
use crate::dns::service_dns_names;
use crate::identity_provider::IdentityProviderConfig;
use crate::meta::{base_security_context, tolerate_master};
use crate::secret::{self, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, HTTPGetAction, PodSpec, PodTemplateSpec, Probe, Service,
    ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use std::collections::BTreeMap;

const APP_LABEL_KEY: &str = "k8s-app";
const DEX_BINARY: &str = "/usr/local/bin/dex";
const DEX_CONFIG_PATH: &str = "/etc/dex/baseCfg/config.yaml";
const DISCOVERY_PATH: &str = "/dex/.well-known/openid-configuration";
const PROBE_INITIAL_DELAY_SECONDS: i32 = 90;
const PROBE_PERIOD_SECONDS: i32 = 10;
const TLS_VOLUME_NAME: &str = "tls";

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL_KEY.to_string(), DEX_OBJECT_NAME.to_string())])
}

fn namespaced_meta() -> ObjectMeta {
    ObjectMeta {
        name: Some(DEX_OBJECT_NAME.to_string()),
        namespace: Some(DEX_NAMESPACE.to_string()),
        ..Default::default()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

impl<I: IdentityProviderConfig> DexComponent<I> {
    pub(super) fn service_account(&self) -> ServiceAccount {
        ServiceAccount {
            metadata: namespaced_meta(),
            ..Default::default()
        }
    }

    pub(super) fn cluster_role(&self) -> ClusterRole {
        ClusterRole {
            metadata: ObjectMeta {
                name: Some(DEX_OBJECT_NAME.to_string()),
                ..Default::default()
            },
            rules: Some(vec![
                PolicyRule {
                    api_groups: Some(vec!["dex.coreos.com".to_string()]),
                    resources: Some(vec!["*".to_string()]),
                    verbs: vec!["*".to_string()],
                    ..Default::default()
                },
                PolicyRule {
                    api_groups: Some(vec!["apiextensions.k8s.io".to_string()]),
                    resources: Some(vec!["customresourcedefinitions".to_string()]),
                    verbs: vec!["create".to_string()],
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
    }

    pub(super) fn cluster_role_binding(&self) -> ClusterRoleBinding {
        ClusterRoleBinding {
            metadata: ObjectMeta {
                name: Some(DEX_OBJECT_NAME.to_string()),
                ..Default::default()
            },
            role_ref: RoleRef {
                api_group: "rbac.authorization.k8s.io".to_string(),
                kind: "ClusterRole".to_string(),
                name: DEX_OBJECT_NAME.to_string(),
            },
            subjects: Some(vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: DEX_OBJECT_NAME.to_string(),
                namespace: Some(DEX_NAMESPACE.to_string()),
                ..Default::default()
            }]),
        }
    }

    pub(super) fn service(&self) -> Service {
        Service {
            metadata: namespaced_meta(),
            spec: Some(ServiceSpec {
                selector: Some(labels()),
                ports: Some(vec![ServicePort {
                    name: Some(DEX_OBJECT_NAME.to_string()),
                    port: DEX_PORT,
                    target_port: Some(IntOrString::Int(DEX_PORT)),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(super) fn deployment(&self) -> Deployment {
        let installation = &self.installation;

        let init_containers = installation
            .certificate_management
            .as_ref()
            .map(|certificate_management| {
                vec![CsrInitContainer {
                    certificate_management,
                    image: &self.csr_init_image,
                    mount_name: TLS_VOLUME_NAME,
                    common_name: DEX_OBJECT_NAME,
                    key_name: TLS_PRIVATE_KEY_KEY,
                    cert_name: TLS_CERT_KEY,
                    dns_names: service_dns_names(
                        DEX_OBJECT_NAME,
                        DEX_NAMESPACE,
                        &self.cluster_domain,
                    ),
                    app_name: DEX_NAMESPACE,
                }
                .build()]
            });

        let mut tolerations = installation.control_plane_tolerations.clone();
        tolerations.push(tolerate_master());

        let annotations = self.identity_provider.required_annotations();
        let node_selector = installation.control_plane_node_selector.clone();

        Deployment {
            metadata: ObjectMeta {
                labels: Some(labels()),
                ..namespaced_meta()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(labels()),
                    ..Default::default()
                },
                replicas: Some(self.replicas),
                // Two Dex generations with diverging configuration must never serve together.
                strategy: Some(DeploymentStrategy {
                    type_: Some("Recreate".to_string()),
                    ..Default::default()
                }),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels()),
                        annotations: (!annotations.is_empty()).then_some(annotations),
                        ..namespaced_meta()
                    }),
                    spec: Some(PodSpec {
                        node_selector: (!node_selector.is_empty()).then_some(node_selector),
                        service_account_name: Some(DEX_OBJECT_NAME.to_string()),
                        tolerations: Some(tolerations),
                        image_pull_secrets: non_empty(secret::reference_list(&self.pull_secrets)),
                        init_containers,
                        containers: vec![self.container()],
                        volumes: non_empty(self.identity_provider.required_volumes()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container(&self) -> Container {
        Container {
            name: DEX_OBJECT_NAME.to_string(),
            image: Some(self.image.clone()),
            env: non_empty(self.identity_provider.required_env("")),
            liveness_probe: Some(probe()),
            security_context: Some(base_security_context()),
            command: Some(vec![
                DEX_BINARY.to_string(),
                "serve".to_string(),
                DEX_CONFIG_PATH.to_string(),
            ]),
            ports: Some(vec![ContainerPort {
                name: Some("https".to_string()),
                container_port: DEX_PORT,
                ..Default::default()
            }]),
            volume_mounts: non_empty(self.identity_provider.required_volume_mounts()),
            ..Default::default()
        }
    }
}

/// HTTPS GET against the discovery endpoint.
fn probe() -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(DISCOVERY_PATH.to_string()),
            port: IntOrString::Int(DEX_PORT),
            scheme: Some("HTTPS".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(PROBE_INITIAL_DELAY_SECONDS),
        period_seconds: Some(PROBE_PERIOD_SECONDS),
        ..Default::default()
    }
}
