//! Renders the Kubernetes objects that deploy the Dex identity service.
//!
//! Rendering is a pure function of the installation settings and the configured identity
//! provider: no cluster access happens here.

pub mod certificate_management;
pub mod cli;
pub mod component;
pub mod dex;
pub mod dns;
pub mod identity_provider;
pub mod images;
pub mod installation;
pub mod logging;
pub mod meta;
pub mod object;
pub mod secret;
