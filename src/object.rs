//! Objects produced by component renderers.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{Metadata, Resource};
use kube::ResourceExt;
use serde::Serialize;

/// A typed Kubernetes object ready to be applied by the reconciliation engine.
///
/// Serializes as the wrapped object, `apiVersion` and `kind` included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderedObject {
    ServiceAccount(ServiceAccount),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
    Deployment(Deployment),
    Service(Service),
    ConfigMap(ConfigMap),
    Secret(Secret),
}

macro_rules! dispatch {
    ($self:ident, $obj:ident => $body:expr) => {
        match $self {
            RenderedObject::ServiceAccount($obj) => $body,
            RenderedObject::ClusterRole($obj) => $body,
            RenderedObject::ClusterRoleBinding($obj) => $body,
            RenderedObject::Deployment($obj) => $body,
            RenderedObject::Service($obj) => $body,
            RenderedObject::ConfigMap($obj) => $body,
            RenderedObject::Secret($obj) => $body,
        }
    };
}

impl RenderedObject {
    pub fn kind(&self) -> &'static str {
        fn kind_of<K: Resource>(_: &K) -> &'static str {
            K::KIND
        }
        dispatch!(self, obj => kind_of(obj))
    }

    pub fn api_version(&self) -> &'static str {
        fn api_version_of<K: Resource>(_: &K) -> &'static str {
            K::API_VERSION
        }
        dispatch!(self, obj => api_version_of(obj))
    }

    pub fn metadata(&self) -> &ObjectMeta {
        dispatch!(self, obj => obj.metadata())
    }

    pub fn name(&self) -> String {
        dispatch!(self, obj => obj.name_any())
    }

    pub fn namespace(&self) -> Option<String> {
        dispatch!(self, obj => obj.namespace())
    }
}

macro_rules! impl_from {
    ($($kind:ident),+) => {
        $(
            impl From<$kind> for RenderedObject {
                fn from(obj: $kind) -> Self {
                    RenderedObject::$kind(obj)
                }
            }
        )+
    };
}

impl_from!(
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    Deployment,
    Service,
    ConfigMap,
    Secret
);

/// Output of a render: what must exist in the cluster and what must be removed from it.
///
/// The two lists never share an object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedObjects {
    pub to_create: Vec<RenderedObject>,
    pub to_delete: Vec<RenderedObject>,
}

impl RenderedObjects {
    pub fn new(to_create: Vec<RenderedObject>, to_delete: Vec<RenderedObject>) -> Self {
        Self {
            to_create,
            to_delete,
        }
    }
}
