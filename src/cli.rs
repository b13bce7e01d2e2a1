//! Command line entry point of the `dex-render` binary.
//!
//! Reads a render configuration, renders Dex with the OIDC identity provider and prints the
//! objects to create.

use crate::component::{render, Component};
use crate::dex::DexComponent;
use crate::dns::DEFAULT_CLUSTER_DOMAIN;
use crate::identity_provider::oidc::{AuthenticationSpec, OidcIdentityProvider, OidcSecrets};
use crate::identity_provider::IdentityProviderError;
use crate::images::{ImageSet, ResolveImagesError};
use crate::installation::InstallationSpec;
use crate::logging::{LoggingConfig, LoggingError};
use crate::meta::DEFAULT_OPERATOR_NAMESPACE;
use crate::object::{RenderedObject, RenderedObjects};
use clap::{Parser, ValueEnum};
use config::{Config, File, FileFormat};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not read render config: `{0}`")]
    ConfigRead(#[from] config::ConfigError),
    #[error("could not initialize logging: `{0}`")]
    LoggingInit(#[from] LoggingError),
    #[error("invalid identity provider: `{0}`")]
    IdentityProvider(#[from] IdentityProviderError),
    #[error("could not resolve images: `{0}`")]
    ResolveImages(#[from] ResolveImagesError),
    #[error("could not serialize rendered objects: `{0}`")]
    Output(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Multi-document YAML stream.
    #[default]
    Yaml,
    /// JSON array.
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Cli {
    /// Path of the YAML render configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output_format: OutputFormat,

    /// Overrides the operator namespace of the render configuration.
    #[arg(long, env = "OPERATOR_NAMESPACE")]
    pub operator_namespace: Option<String>,
}

/// Everything needed to render Dex for a cluster.
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default)]
    pub installation: InstallationSpec,
    #[serde(default)]
    pub image_set: Option<ImageSet>,
    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,
    #[serde(default = "default_operator_namespace")]
    pub operator_namespace: String,
    #[serde(default)]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub pull_secrets: Vec<SecretSource>,
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub log: LoggingConfig,
}

fn default_cluster_domain() -> String {
    DEFAULT_CLUSTER_DOMAIN.to_string()
}

fn default_operator_namespace() -> String {
    DEFAULT_OPERATOR_NAMESPACE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthenticationConfig {
    pub spec: AuthenticationSpec,
    pub secrets: OidcSecretSources,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OidcSecretSources {
    pub idp: SecretSource,
    pub dex: SecretSource,
    #[serde(default)]
    pub tls: Option<SecretSource>,
}

/// A secret as written in the render configuration. Data is given as `key`/`value` entries.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SecretSource {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub data: Vec<SecretEntry>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SecretEntry {
    pub key: String,
    pub value: String,
}

impl SecretSource {
    pub fn to_secret(&self, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                self.data
                    .iter()
                    .map(|entry| {
                        (
                            entry.key.clone(),
                            ByteString(entry.value.clone().into_bytes()),
                        )
                    })
                    .collect(),
            ),
            type_: Some(self.type_.clone().unwrap_or_else(|| "Opaque".to_string())),
            ..Default::default()
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let config = Config::builder()
            .add_source(File::new(path.to_string_lossy().as_ref(), FileFormat::Yaml))
            .build()?
            .try_deserialize::<RenderConfig>()?;
        debug!(path = %path.display(), "render config loaded");
        Ok(config)
    }

    /// Builds the Dex component described by this configuration.
    pub fn dex_component(&self) -> Result<DexComponent<OidcIdentityProvider>, CliError> {
        let namespace = self.operator_namespace.as_str();
        let secrets = &self.authentication.secrets;
        let identity_provider = OidcIdentityProvider::try_new(
            self.authentication.spec.clone(),
            OidcSecrets {
                idp: secrets.idp.to_secret(namespace),
                dex: secrets.dex.to_secret(namespace),
                tls: secrets.tls.as_ref().map(|tls| tls.to_secret(namespace)),
            },
            namespace,
            self.installation.certificate_management_enabled(),
        )?;

        let pull_secrets = self
            .pull_secrets
            .iter()
            .map(|source| source.to_secret(namespace))
            .collect();

        let component = DexComponent::new(self.installation.clone(), identity_provider)
            .with_cluster_domain(self.cluster_domain.clone())
            .with_operator_namespace(namespace)
            .with_pull_secrets(pull_secrets);
        Ok(match self.replicas {
            Some(replicas) => component.with_replicas(replicas),
            None => component,
        })
    }
}

impl Cli {
    /// Loads the configuration and applies the command line overrides.
    pub fn render_config(&self) -> Result<RenderConfig, CliError> {
        let mut config = RenderConfig::load(&self.config)?;
        if let Some(namespace) = &self.operator_namespace {
            config.operator_namespace = namespace.clone();
        }
        Ok(config)
    }
}

/// Renders Dex from `config`, resolving images against the configured image set.
pub fn render_dex(config: &RenderConfig) -> Result<RenderedObjects, CliError> {
    let mut component = config.dex_component()?;
    info!(
        os = %component.supported_os_type(),
        operator_namespace = %config.operator_namespace,
        "rendering dex"
    );
    Ok(render(&mut component, config.image_set.as_ref())?)
}

/// Serializes `objects` in the requested format.
pub fn format_objects(
    objects: &[RenderedObject],
    format: OutputFormat,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Yaml => objects
            .iter()
            .map(|object| {
                serde_yaml::to_string(object)
                    .map(|doc| format!("---\n{doc}"))
                    .map_err(|err| CliError::Output(err.to_string()))
            })
            .collect(),
        OutputFormat::Json => serde_json::to_string_pretty(objects)
            .map(|json| format!("{json}\n"))
            .map_err(|err| CliError::Output(err.to_string())),
    }
}
