//! [IdentityProviderConfig] for an upstream OpenID Connect provider.

use super::{IdentityProviderConfig, IdentityProviderError};
use crate::dex::{
    DEX_CERT_SECRET_NAME, DEX_CONFIG_KEY, DEX_OBJECT_NAME, DEX_SECRET_ENV, DEX_TLS_SECRET_NAME,
};
use crate::secret::{copy_to_namespace, get_key, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, EnvVar, EnvVarSource, KeyToPath, Secret,
    SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const CLIENT_ID_SECRET_FIELD: &str = "clientID";
pub const CLIENT_SECRET_SECRET_FIELD: &str = "clientSecret";

const CLIENT_ID_ENV: &str = "CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "CLIENT_SECRET";
const CONNECTOR_TYPE: &str = "oidc";
const ANNOTATION_HASH_PREFIX: &str = "hash.operator.tigera.io";
const CONFIG_VOLUME_NAME: &str = "config";
const TLS_VOLUME_NAME: &str = "tls";
const CONFIG_MOUNT_PATH: &str = "/etc/dex/baseCfg";
const TLS_MOUNT_PATH: &str = "/etc/dex/tls";
const DEFAULT_FILE_MODE: i32 = 0o644;

/// Authentication settings of the cluster.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AuthenticationSpec {
    /// Public URI of the manager, e.g. `https://manager.example.com`.
    #[serde(default)]
    pub manager_domain: String,
    pub oidc: OidcSpec,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OidcSpec {
    pub issuer_url: String,
    #[serde(default = "default_username_claim")]
    pub username_claim: String,
    #[serde(default)]
    pub groups_claim: String,
    #[serde(default = "default_requested_scopes")]
    pub requested_scopes: Vec<String>,
}

fn default_username_claim() -> String {
    "email".to_string()
}

fn default_requested_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

/// Credentials the OIDC provider depends on.
#[derive(Debug, Clone)]
pub struct OidcSecrets {
    /// Client id and secret registered at the upstream provider.
    pub idp: Secret,
    /// Secret shared between Dex and the manager.
    pub dex: Secret,
    /// Dex key pair. Not used when certificates are managed by the cluster signer.
    pub tls: Option<Secret>,
}

#[derive(Debug, Clone)]
pub struct OidcIdentityProvider {
    spec: AuthenticationSpec,
    secrets: OidcSecrets,
    operator_namespace: String,
    certificate_management: bool,
}

impl OidcIdentityProvider {
    pub fn try_new(
        spec: AuthenticationSpec,
        secrets: OidcSecrets,
        operator_namespace: impl Into<String>,
        certificate_management: bool,
    ) -> Result<Self, IdentityProviderError> {
        if spec.oidc.issuer_url.is_empty() {
            return Err(IdentityProviderError::InvalidConfig(
                "oidc issuer_url must not be empty".to_string(),
            ));
        }
        require_keys(
            &secrets.idp,
            &[CLIENT_ID_SECRET_FIELD, CLIENT_SECRET_SECRET_FIELD],
        )?;
        require_keys(&secrets.dex, &[CLIENT_SECRET_SECRET_FIELD])?;
        if !certificate_management {
            let tls = secrets.tls.as_ref().ok_or_else(|| {
                IdentityProviderError::InvalidConfig(format!(
                    "secret `{DEX_TLS_SECRET_NAME}` is required when certificate management is disabled"
                ))
            })?;
            require_keys(tls, &[TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY])?;
        }

        Ok(Self {
            spec,
            secrets,
            operator_namespace: operator_namespace.into(),
            certificate_management,
        })
    }

    fn tls_secret(&self) -> Option<&Secret> {
        if self.certificate_management {
            None
        } else {
            self.secrets.tls.as_ref()
        }
    }

    fn connector_config(&self) -> Mapping {
        let oidc = &self.spec.oidc;
        let mut config = Mapping::new();
        if !oidc.groups_claim.is_empty() {
            let mut claim_mapping = Mapping::new();
            claim_mapping.insert("groups".into(), oidc.groups_claim.clone().into());
            config.insert("claimMapping".into(), claim_mapping.into());
        }
        config.insert("clientID".into(), format!("${CLIENT_ID_ENV}").into());
        config.insert("clientSecret".into(), format!("${CLIENT_SECRET_ENV}").into());
        if !oidc.groups_claim.is_empty() {
            config.insert("insecureEnableGroups".into(), true.into());
        }
        config.insert("issuer".into(), oidc.issuer_url.clone().into());
        config.insert(
            "redirectURI".into(),
            format!("{}/dex/callback", self.spec.manager_domain).into(),
        );
        config.insert(
            "scopes".into(),
            Value::Sequence(
                oidc.requested_scopes
                    .iter()
                    .cloned()
                    .map(Value::from)
                    .collect(),
            ),
        );
        config.insert("userIDKey".into(), oidc.username_claim.clone().into());
        config.insert("userNameKey".into(), oidc.username_claim.clone().into());
        config
    }
}

impl IdentityProviderConfig for OidcIdentityProvider {
    fn connector(&self) -> Mapping {
        let mut connector = Mapping::new();
        connector.insert("config".into(), self.connector_config().into());
        connector.insert("id".into(), CONNECTOR_TYPE.into());
        connector.insert("name".into(), CONNECTOR_TYPE.into());
        connector.insert("type".into(), CONNECTOR_TYPE.into());
        connector
    }

    fn required_secrets(&self, namespace: &str) -> Vec<Secret> {
        let mut secrets = vec![self.secrets.idp.clone(), self.secrets.dex.clone()];
        secrets.extend(self.tls_secret().cloned());
        copy_to_namespace(namespace, &secrets)
    }

    fn required_env(&self, prefix: &str) -> Vec<EnvVar> {
        let idp = self.secrets.idp.name_any();
        let dex = self.secrets.dex.name_any();
        vec![
            env_from_secret(prefix, CLIENT_ID_ENV, &idp, CLIENT_ID_SECRET_FIELD),
            env_from_secret(prefix, CLIENT_SECRET_ENV, &idp, CLIENT_SECRET_SECRET_FIELD),
            env_from_secret(prefix, DEX_SECRET_ENV, &dex, CLIENT_SECRET_SECRET_FIELD),
        ]
    }

    fn required_volumes(&self) -> Vec<Volume> {
        let config = Volume {
            name: CONFIG_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: DEX_OBJECT_NAME.to_string(),
                items: Some(vec![key_to_path(DEX_CONFIG_KEY)]),
                default_mode: Some(DEFAULT_FILE_MODE),
                ..Default::default()
            }),
            ..Default::default()
        };

        let tls = match self.tls_secret() {
            // The CSR init container writes the key pair into the volume.
            None => Volume {
                name: TLS_VOLUME_NAME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            Some(secret) => Volume {
                name: TLS_VOLUME_NAME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret.name_any()),
                    items: Some(vec![
                        key_to_path(TLS_CERT_KEY),
                        key_to_path(TLS_PRIVATE_KEY_KEY),
                    ]),
                    default_mode: Some(DEFAULT_FILE_MODE),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };

        vec![config, tls]
    }

    fn required_volume_mounts(&self) -> Vec<VolumeMount> {
        vec![
            VolumeMount {
                name: CONFIG_VOLUME_NAME.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: TLS_VOLUME_NAME.to_string(),
                mount_path: TLS_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]
    }

    fn required_annotations(&self) -> BTreeMap<String, String> {
        let connector = serde_yaml::to_string(&self.connector()).unwrap_or_default();
        let mut annotations = BTreeMap::from([
            (
                hash_annotation("tigera-dex-auth"),
                hex::encode(Sha256::digest(connector.as_bytes())),
            ),
            (
                hash_annotation("tigera-idp-secret"),
                secret_hash(&self.secrets.idp),
            ),
            (
                hash_annotation("tigera-dex-secret"),
                secret_hash(&self.secrets.dex),
            ),
        ]);
        if let Some(tls) = self.tls_secret() {
            annotations.insert(hash_annotation("tigera-dex-tls-secret"), secret_hash(tls));
        }
        annotations
    }

    fn manager_uri(&self) -> String {
        self.spec.manager_domain.clone()
    }

    fn create_cert_secret(&self) -> Option<Secret> {
        let cert = get_key(self.tls_secret()?, TLS_CERT_KEY)?;
        Some(Secret {
            metadata: ObjectMeta {
                name: Some(DEX_CERT_SECRET_NAME.to_string()),
                namespace: Some(self.operator_namespace.clone()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                TLS_CERT_KEY.to_string(),
                ByteString(cert),
            )])),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        })
    }
}

fn require_keys(secret: &Secret, keys: &[&str]) -> Result<(), IdentityProviderError> {
    keys.iter()
        .find(|key| get_key(secret, key).is_none())
        .map_or(Ok(()), |key| {
            Err(IdentityProviderError::MissingSecretKey {
                secret: secret.name_any(),
                key: key.to_string(),
            })
        })
}

fn env_from_secret(prefix: &str, name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: format!("{prefix}{name}"),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn key_to_path(key: &str) -> KeyToPath {
    KeyToPath {
        key: key.to_string(),
        path: key.to_string(),
        ..Default::default()
    }
}

fn hash_annotation(name: &str) -> String {
    format!("{ANNOTATION_HASH_PREFIX}/{name}")
}

/// Hex encoded sha256 over every key and value of the secret payload.
fn secret_hash(secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in secret.data.iter().flatten() {
        hasher.update(key.as_bytes());
        hasher.update(&value.0);
    }
    for (key, value) in secret.string_data.iter().flatten() {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::secret::new_secret;
    use assert_matches::assert_matches;

    pub fn secret(name: &str, entries: &[(&str, &str)]) -> Secret {
        new_secret(
            name,
            "tigera-operator",
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    pub fn oidc_secrets() -> OidcSecrets {
        OidcSecrets {
            idp: secret(
                "tigera-oidc-credentials",
                &[("clientID", "id"), ("clientSecret", "idp-secret")],
            ),
            dex: secret("tigera-dex", &[("clientSecret", "dex-secret")]),
            tls: Some(secret(
                DEX_TLS_SECRET_NAME,
                &[("tls.crt", "cert"), ("tls.key", "key")],
            )),
        }
    }

    pub fn authentication_spec(manager_domain: &str) -> AuthenticationSpec {
        AuthenticationSpec {
            manager_domain: manager_domain.to_string(),
            oidc: OidcSpec {
                issuer_url: "https://accounts.example.com".to_string(),
                username_claim: default_username_claim(),
                groups_claim: "groups".to_string(),
                requested_scopes: default_requested_scopes(),
            },
        }
    }

    fn provider(certificate_management: bool) -> OidcIdentityProvider {
        OidcIdentityProvider::try_new(
            authentication_spec("https://manager.example.com"),
            oidc_secrets(),
            "tigera-operator",
            certificate_management,
        )
        .unwrap()
    }

    #[test]
    fn test_deserialize_spec_defaults() {
        let spec: AuthenticationSpec = serde_yaml::from_str(
            r#"
manager_domain: https://manager.example.com
oidc:
  issuer_url: https://accounts.example.com
"#,
        )
        .unwrap();
        assert_eq!(spec.oidc.username_claim, "email");
        assert_eq!(spec.oidc.requested_scopes, default_requested_scopes());
        assert!(spec.oidc.groups_claim.is_empty());
    }

    #[test]
    fn test_connector() {
        let connector = Value::Mapping(provider(false).connector());
        assert_eq!(connector["id"], "oidc");
        assert_eq!(connector["type"], "oidc");
        assert_eq!(connector["config"]["clientID"], "$CLIENT_ID");
        assert_eq!(connector["config"]["clientSecret"], "$CLIENT_SECRET");
        assert_eq!(connector["config"]["issuer"], "https://accounts.example.com");
        assert_eq!(
            connector["config"]["redirectURI"],
            "https://manager.example.com/dex/callback"
        );
        assert_eq!(connector["config"]["userNameKey"], "email");
        assert_eq!(connector["config"]["insecureEnableGroups"], true);
        assert_eq!(connector["config"]["claimMapping"]["groups"], "groups");
    }

    #[test]
    fn test_connector_without_groups_claim() {
        let mut spec = authentication_spec("https://manager.example.com");
        spec.oidc.groups_claim = String::new();
        let provider =
            OidcIdentityProvider::try_new(spec, oidc_secrets(), "tigera-operator", false).unwrap();
        let connector = Value::Mapping(provider.connector());
        assert!(connector["config"].get("claimMapping").is_none());
        assert!(connector["config"].get("insecureEnableGroups").is_none());
    }

    #[test]
    fn test_required_secrets_are_copied() {
        let secrets = provider(false).required_secrets("tigera-dex");
        let names = secrets.iter().map(|s| s.name_any()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["tigera-oidc-credentials", "tigera-dex", DEX_TLS_SECRET_NAME]
        );
        assert!(secrets
            .iter()
            .all(|s| s.namespace().as_deref() == Some("tigera-dex")));
    }

    #[test]
    fn test_required_secrets_with_certificate_management() {
        let secrets = provider(true).required_secrets("tigera-dex");
        assert_eq!(secrets.len(), 2);
    }

    #[test]
    fn test_required_env_is_prefixed() {
        let env = provider(false).required_env("DEX_");
        let names = env.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["DEX_CLIENT_ID", "DEX_CLIENT_SECRET", "DEX_DEX_SECRET"]);
        let selector = env[0]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(selector.name, "tigera-oidc-credentials");
        assert_eq!(selector.key, CLIENT_ID_SECRET_FIELD);
    }

    #[test]
    fn test_tls_volume_depends_on_certificate_management() {
        let volumes = provider(false).required_volumes();
        assert_eq!(volumes.len(), 2);
        assert_eq!(
            volumes[1]
                .secret
                .as_ref()
                .and_then(|s| s.secret_name.as_deref()),
            Some(DEX_TLS_SECRET_NAME)
        );

        let volumes = provider(true).required_volumes();
        assert!(volumes[1].secret.is_none());
        assert!(volumes[1].empty_dir.is_some());
    }

    #[test]
    fn test_annotations_follow_secret_data() {
        let annotations = provider(false).required_annotations();
        assert_eq!(annotations.len(), 4);

        let mut secrets = oidc_secrets();
        secrets.dex = secret("tigera-dex", &[("clientSecret", "rotated")]);
        let rotated = OidcIdentityProvider::try_new(
            authentication_spec("https://manager.example.com"),
            secrets,
            "tigera-operator",
            false,
        )
        .unwrap()
        .required_annotations();

        let key = hash_annotation("tigera-dex-secret");
        assert_ne!(annotations.get(&key), rotated.get(&key));
        let key = hash_annotation("tigera-idp-secret");
        assert_eq!(annotations.get(&key), rotated.get(&key));
    }

    #[test]
    fn test_create_cert_secret() {
        let cert_secret = provider(false).create_cert_secret().unwrap();
        assert_eq!(cert_secret.name_any(), DEX_CERT_SECRET_NAME);
        assert_eq!(cert_secret.namespace().as_deref(), Some("tigera-operator"));
        let data = cert_secret.data.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.get(TLS_CERT_KEY), Some(&ByteString(b"cert".to_vec())));

        assert!(provider(true).create_cert_secret().is_none());
    }

    #[test]
    fn test_missing_secret_key() {
        let mut secrets = oidc_secrets();
        secrets.idp = secret("tigera-oidc-credentials", &[("clientID", "id")]);
        let result = OidcIdentityProvider::try_new(
            authentication_spec(""),
            secrets,
            "tigera-operator",
            false,
        );
        assert_matches!(result, Err(IdentityProviderError::MissingSecretKey { secret, key }) => {
            assert_eq!(secret, "tigera-oidc-credentials");
            assert_eq!(key, CLIENT_SECRET_SECRET_FIELD);
        });
    }

    #[test]
    fn test_missing_tls_secret() {
        let mut secrets = oidc_secrets();
        secrets.tls = None;
        let result = OidcIdentityProvider::try_new(
            authentication_spec(""),
            secrets.clone(),
            "tigera-operator",
            false,
        );
        assert_matches!(result, Err(IdentityProviderError::InvalidConfig(_)));

        assert!(
            OidcIdentityProvider::try_new(authentication_spec(""), secrets, "tigera-operator", true)
                .is_ok()
        );
    }

    #[test]
    fn test_empty_issuer() {
        let mut spec = authentication_spec("");
        spec.oidc.issuer_url = String::new();
        let result = OidcIdentityProvider::try_new(spec, oidc_secrets(), "tigera-operator", false);
        assert_matches!(result, Err(IdentityProviderError::InvalidConfig(_)));
    }
}
