//! The Dex configuration file, built as an untyped YAML tree.
//!
//! Keys are inserted in lexical order on every level so the serialized text is stable.

use super::{DEX_CLIENT_ID, DEX_CLIENT_NAME, DEX_PORT, DEX_SECRET_ENV};
use serde_yaml::{Mapping, Value};

const LOGIN_CALLBACK_PATH: &str = "/login/oidc/callback";
const KIBANA_CALLBACK_PATH: &str = "/tigera-kibana/api/security/oidc/callback";
const LOCAL_ORIGINS: [&str; 2] = ["https://localhost:9443", "https://127.0.0.1:9443"];
const TLS_CERT_PATH: &str = "/etc/dex/tls/tls.crt";
const TLS_KEY_PATH: &str = "/etc/dex/tls/tls.key";
const RESPONSE_TYPES: [&str; 3] = ["id_token", "code", "token"];

#[derive(Debug, Clone, PartialEq)]
pub struct DexConfigDocument {
    manager_uri: String,
    connector: Mapping,
}

impl DexConfigDocument {
    pub fn new(manager_uri: impl Into<String>, connector: Mapping) -> Self {
        Self {
            manager_uri: manager_uri.into(),
            connector,
        }
    }

    /// Callbacks the manager client may be redirected to.
    ///
    /// The local callbacks are always allowed; the manager URI adds its own pair unless it
    /// already points at the local host.
    pub fn redirect_uris(&self) -> Vec<String> {
        let mut uris = [LOGIN_CALLBACK_PATH, KIBANA_CALLBACK_PATH]
            .iter()
            .flat_map(|path| LOCAL_ORIGINS.iter().map(move |origin| format!("{origin}{path}")))
            .collect::<Vec<_>>();

        let host = self.manager_uri.as_str();
        if !host.is_empty() && !host.contains("localhost") && !host.contains("127.0.0.1") {
            uris.push(format!("{host}{LOGIN_CALLBACK_PATH}"));
            uris.push(format!("{host}{KIBANA_CALLBACK_PATH}"));
        }
        uris
    }

    pub fn issuer(&self) -> String {
        format!("{}/dex", self.manager_uri)
    }

    pub fn to_value(&self) -> Value {
        let mut doc = Mapping::new();
        doc.insert(
            "connectors".into(),
            Value::Sequence(vec![Value::Mapping(self.connector.clone())]),
        );
        doc.insert("issuer".into(), self.issuer().into());
        doc.insert("oauth2".into(), oauth2().into());
        doc.insert(
            "staticClients".into(),
            Value::Sequence(vec![self.static_client().into()]),
        );
        doc.insert("storage".into(), storage().into());
        doc.insert("web".into(), web().into());
        Value::Mapping(doc)
    }

    /// Serializes the document.
    ///
    /// # Panics
    /// The tree only holds strings, booleans, sequences and mappings with string keys, which
    /// always serialize. A failure here is a bug, not a runtime condition.
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(&self.to_value())
            .unwrap_or_else(|err| panic!("dex configuration document is not serializable: {err}"))
    }

    fn static_client(&self) -> Mapping {
        let mut client = Mapping::new();
        client.insert("id".into(), DEX_CLIENT_ID.into());
        client.insert("name".into(), DEX_CLIENT_NAME.into());
        client.insert("redirectURIs".into(), string_sequence(self.redirect_uris()));
        client.insert("secretEnv".into(), DEX_SECRET_ENV.into());
        client
    }
}

fn oauth2() -> Mapping {
    let mut oauth2 = Mapping::new();
    oauth2.insert("responseTypes".into(), string_sequence(RESPONSE_TYPES));
    oauth2.insert("skipApprovalScreen".into(), true.into());
    oauth2
}

fn storage() -> Mapping {
    let mut config = Mapping::new();
    config.insert("inCluster".into(), true.into());

    let mut storage = Mapping::new();
    storage.insert("config".into(), config.into());
    storage.insert("type".into(), "kubernetes".into());
    storage
}

fn web() -> Mapping {
    let mut web = Mapping::new();
    web.insert("allowedOrigins".into(), string_sequence(["*"]));
    web.insert("discoveryAllowedOrigins".into(), string_sequence(["*"]));
    web.insert("https".into(), format!("0.0.0.0:{DEX_PORT}").into());
    web.insert("tlsCert".into(), TLS_CERT_PATH.into());
    web.insert("tlsKey".into(), TLS_KEY_PATH.into());
    web
}

fn string_sequence<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Sequence(
        items
            .into_iter()
            .map(|item| Value::String(item.into()))
            .collect(),
    )
}
