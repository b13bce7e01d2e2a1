//! Helpers to replicate secrets across namespaces and hand them to the renderers.

use crate::object::RenderedObject;
use k8s_openapi::api::core::v1::{LocalObjectReference, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// Returns copies of `secrets` living in `namespace`.
///
/// Only the name, type and payload are carried over; the originals are left untouched.
pub fn copy_to_namespace(namespace: &str, secrets: &[Secret]) -> Vec<Secret> {
    secrets
        .iter()
        .map(|secret| Secret {
            metadata: ObjectMeta {
                name: secret.metadata.name.clone(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: secret.data.clone(),
            string_data: secret.string_data.clone(),
            type_: secret.type_.clone(),
            immutable: secret.immutable,
        })
        .collect()
}

pub fn to_rendered_objects(secrets: Vec<Secret>) -> Vec<RenderedObject> {
    secrets.into_iter().map(RenderedObject::from).collect()
}

/// Image pull references for the given secrets, in the same order.
pub fn reference_list(secrets: &[Secret]) -> Vec<LocalObjectReference> {
    secrets
        .iter()
        .map(|secret| LocalObjectReference {
            name: secret.name_any(),
        })
        .collect()
}

/// Builds an opaque secret from string values.
pub fn new_secret(name: &str, namespace: &str, data: BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.into_iter()
                .map(|(key, value)| (key, ByteString(value.into_bytes())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Returns the value stored under `key`, looking at both `data` and `stringData`.
pub fn get_key(secret: &Secret, key: &str) -> Option<Vec<u8>> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.clone())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|value| value.clone().into_bytes())
        })
}
