use anyhow::Result;
use owo_colors::OwoColorize;
use rustls::{ClientConfig, RootCertStore, pki_types::CertificateDer};

pub mod args;
pub mod metrics;
pub mod redis;
pub mod shutdown;

pub fn signal_ready() {
    if let Ok(path) = std::env::var("READY_FILE") {
        let _ = std::fs::write(path, "ready");
    }
}

/// Tag keys written onto every provider-side resource the autoscaler owns.
/// The reconciler only ever manages instances carrying its own `CLUSTER_ID`.
pub mod tags {
    pub const ROLE: &str = "role";
    pub const CLUSTER_ID: &str = "cluster_id";
    pub const MANAGED_BY: &str = "managed_by";
    pub const MARKET: &str = "market";

    pub const ROLE_WORKER: &str = "worker";
    pub const MANAGED_BY_VALUE: &str = "autoscaler";
}

/// Process-wide one-time setup: rustls crypto provider and color override.
pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    install_rustls_provider();
}

pub fn install_rustls_provider() {
    // Already installed when running multiple components (e.g. in tests); ignore.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn tls_root_store(extra_certs: Vec<CertificateDer<'_>>) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in rustls_native_certs::load_native_certs().expect("could not load platform certs") {
        roots.add(cert).unwrap();
    }
    for cert in extra_certs {
        roots.add(cert)?;
    }
    Ok(roots)
}

pub fn tls_client_config(extra_certs: Vec<CertificateDer<'_>>) -> Result<ClientConfig> {
    let roots = tls_root_store(extra_certs)?;
    Ok(ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

pub mod log {
    use super::*;

    pub fn error<T: std::fmt::Display>(e: T) {
        eprintln!("{} {}", "\u{274c}".red(), e.to_string().red());
    }

    pub fn warning<T: std::fmt::Display>(e: T) {
        eprintln!("{} {}", "\u{26a0}\u{fe0f}".yellow(), e.to_string().yellow());
    }
}
