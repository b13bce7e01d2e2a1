//! Metadata shared by every rendered component.

use k8s_openapi::api::core::v1::{SecurityContext, Toleration};
use serde::Serialize;
use std::fmt::Display;

/// Namespace the operator runs in when none is configured.
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "tigera-operator";

const MASTER_TAINT_KEY: &str = "node-role.kubernetes.io/master";

/// Operating systems a component can be scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OsType {
    Linux,
    Windows,
    Any,
}

impl Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsType::Linux => write!(f, "linux"),
            OsType::Windows => write!(f, "windows"),
            OsType::Any => write!(f, "any"),
        }
    }
}

/// Toleration that lets control plane workloads land on master nodes.
pub fn tolerate_master() -> Toleration {
    Toleration {
        key: Some(MASTER_TAINT_KEY.to_string()),
        effect: Some("NoSchedule".to_string()),
        operator: Some("Exists".to_string()),
        ..Default::default()
    }
}

/// Container security context applied to every operator-managed container.
pub fn base_security_context() -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        ..Default::default()
    }
}
