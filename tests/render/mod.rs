use assert_cmd::Command;
use predicates::prelude::*;
use serde::Deserialize;
use serde_yaml::Value;
use std::io::Write;

const BIN: &str = "dex-render";
const ASSETS: &str = "tests/render/assets";

fn documents(stdout: &[u8]) -> Vec<Value> {
    let text = String::from_utf8_lossy(stdout);
    serde_yaml::Deserializer::from_str(&text)
        .map(|doc| Value::deserialize(doc).unwrap())
        .collect()
}

fn kind_and_name(doc: &Value) -> (String, String) {
    (
        doc["kind"].as_str().unwrap().to_string(),
        doc["metadata"]["name"].as_str().unwrap().to_string(),
    )
}

#[test]
fn renders_oidc_manifest() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.env_remove("OPERATOR_NAMESPACE")
        .arg("--config")
        .arg(format!("{ASSETS}/oidc.yaml"));
    let output = cmd.assert().success().get_output().stdout.clone();

    let docs = documents(&output);
    let objects = docs.iter().map(kind_and_name).collect::<Vec<_>>();
    let expected = [
        ("ServiceAccount", "tigera-dex"),
        ("Deployment", "tigera-dex"),
        ("Service", "tigera-dex"),
        ("ClusterRole", "tigera-dex"),
        ("ClusterRoleBinding", "tigera-dex"),
        ("ConfigMap", "tigera-dex"),
        ("Secret", "tigera-oidc-credentials"),
        ("Secret", "tigera-dex"),
        ("Secret", "tigera-dex-tls"),
        ("Secret", "tigera-dex-tls-crt"),
        ("Secret", "tigera-oidc-credentials"),
        ("Secret", "tigera-dex"),
        ("Secret", "tigera-dex-tls"),
        ("Secret", "tigera-pull-secret"),
    ]
    .map(|(kind, name)| (kind.to_string(), name.to_string()));
    assert_eq!(objects, expected);

    let deployment = &docs[1];
    let pod = &deployment["spec"]["template"]["spec"];
    assert_eq!(
        pod["containers"][0]["image"],
        "quay.io/tigera/dex:v3.10.0"
    );
    assert_eq!(pod["nodeSelector"]["kubernetes.io/os"], "linux");
    assert_eq!(pod["imagePullSecrets"][0]["name"], "tigera-pull-secret");
    assert!(pod.get("initContainers").is_none());

    let config: Value =
        serde_yaml::from_str(docs[5]["data"]["config.yaml"].as_str().unwrap())?;
    assert_eq!(config["issuer"], "https://manager.example.com/dex");
    assert_eq!(
        config["staticClients"][0]["redirectURIs"]
            .as_sequence()
            .unwrap()
            .len(),
        6
    );
    assert_eq!(config["connectors"][0]["type"], "oidc");

    Ok(())
}

#[test]
fn renders_with_certificate_management_and_image_set() -> Result<(), Box<dyn std::error::Error>>
{
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.env("OPERATOR_NAMESPACE", "calico-operator")
        .arg("--config")
        .arg(format!("{ASSETS}/certificate_management.yaml"));
    let output = cmd.assert().success().get_output().stdout.clone();

    let docs = documents(&output);
    let last = docs.last().unwrap();
    assert_eq!(
        kind_and_name(last),
        (
            "ClusterRoleBinding".to_string(),
            "tigera-dex:csr-creator".to_string()
        )
    );
    assert!(docs.iter().all(|doc| kind_and_name(doc).1 != "tigera-dex-tls-crt"));
    assert!(docs
        .iter()
        .filter(|doc| doc["kind"] == "Secret")
        .any(|doc| doc["metadata"]["namespace"] == "calico-operator"));

    let pod = &docs[1]["spec"]["template"]["spec"];
    assert_eq!(
        pod["containers"][0]["image"],
        "gcr.io/unique-caldron-775/cnx/tigera/dex@sha256:0123"
    );
    assert_eq!(
        pod["initContainers"][0]["image"],
        "gcr.io/unique-caldron-775/cnx/tigera/key-cert-provisioner@sha256:4567"
    );

    let config: Value =
        serde_yaml::from_str(docs[5]["data"]["config.yaml"].as_str().unwrap())?;
    assert_eq!(
        config["staticClients"][0]["redirectURIs"]
            .as_sequence()
            .unwrap()
            .len(),
        4
    );

    Ok(())
}

#[test]
fn renders_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--config")
        .arg(format!("{ASSETS}/oidc.yaml"))
        .arg("--output-format")
        .arg("json");
    let output = cmd.assert().success().get_output().stdout.clone();

    let objects: serde_json::Value = serde_json::from_slice(&output)?;
    assert_eq!(objects.as_array().unwrap().len(), 14);
    assert_eq!(objects[0]["kind"], "ServiceAccount");

    Ok(())
}

#[test]
fn reports_every_missing_image() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--config")
        .arg(format!("{ASSETS}/incomplete_image_set.yaml"));
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(
            predicate::str::contains("tigera/dex")
                .and(predicate::str::contains("tigera/key-cert-provisioner")),
        );

    Ok(())
}

#[test]
fn fails_on_missing_config() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--config").arg(dir.path().join("absent.yaml"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("could not read render config"));

    Ok(())
}

#[test]
fn fails_on_invalid_identity_provider() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    write!(
        file,
        r#"
authentication:
  spec:
    oidc:
      issuer_url: ""
  secrets:
    idp:
      name: tigera-oidc-credentials
    dex:
      name: tigera-dex
"#
    )?;

    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--config").arg(file.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("issuer_url"));

    Ok(())
}
