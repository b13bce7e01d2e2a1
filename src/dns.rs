/// Default cluster domain used when the installation does not override it.
pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";

/// Returns the names a service can be reached through from inside the cluster, from the
/// shortest to the fully qualified one.
pub fn service_dns_names(service: &str, namespace: &str, cluster_domain: &str) -> Vec<String> {
    vec![
        service.to_string(),
        format!("{service}.{namespace}"),
        format!("{service}.{namespace}.svc"),
        format!("{service}.{namespace}.svc.{cluster_domain}"),
    ]
}
