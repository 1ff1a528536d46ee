// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client construction for the collector and fan-out paths.
//!
//! Each client gets:
//! - rustls TLS, with extra root certificates and an optional client identity
//! - the configured timeout, used both for connecting and for the whole request
//! - TCP keep-alive at the configured interval
//!
//! A TLS setting that cannot be loaded fails construction instead of falling back to a
//! default client.

use std::path::Path;
use std::time::Duration;

use reqwest::{Certificate, Identity};
use tracing::{debug, warn};

use crate::config::{TlsConfig, VerificationMode};
use crate::error::BuildError;

/// Keeps idle pooled connections around for a few keep-alive periods at most.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

pub fn build_client(
    timeout: Duration,
    keep_alive: Duration,
    tls: &TlsConfig,
) -> Result<reqwest::Client, BuildError> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
        .tcp_keepalive(Some(keep_alive));

    for path in &tls.certificate_authorities {
        let pem = read_pem(path)?;
        let cert = Certificate::from_pem(&pem)
            .map_err(|e| BuildError::Tls(format!("invalid certificate {}: {e}", path.display())))?;
        builder = builder.add_root_certificate(cert);
        debug!("Added root certificate {}", path.display());
    }

    match (&tls.certificate, &tls.key) {
        (Some(cert_path), Some(key_path)) => {
            let mut pem = read_pem(cert_path)?;
            pem.push(b'\n');
            pem.extend(read_pem(key_path)?);
            let identity = Identity::from_pem(&pem)
                .map_err(|e| BuildError::Tls(format!("invalid client identity: {e}")))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => {
            return Err(BuildError::Tls(
                "certificate and key must be configured together".to_string(),
            ))
        }
    }

    if tls.verification_mode == VerificationMode::None {
        warn!("TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
    }

    Ok(builder.build()?)
}

fn read_pem(path: &Path) -> Result<Vec<u8>, BuildError> {
    std::fs::read(path).map_err(|e| BuildError::Tls(format!("read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_default_client() {
        let client = build_client(
            Duration::from_secs(5),
            Duration::from_secs(30),
            &TlsConfig::default(),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_build_client_without_verification() {
        let tls = TlsConfig {
            verification_mode: VerificationMode::None,
            ..Default::default()
        };
        assert!(build_client(Duration::from_secs(5), Duration::from_secs(30), &tls).is_ok());
    }

    #[test]
    fn test_missing_ca_file_is_an_error() {
        let tls = TlsConfig {
            certificate_authorities: vec![PathBuf::from("/nonexistent/ca.pem")],
            ..Default::default()
        };
        let result = build_client(Duration::from_secs(5), Duration::from_secs(30), &tls);
        assert!(matches!(result, Err(BuildError::Tls(_))));
    }

    #[test]
    fn test_certificate_without_key_is_an_error() {
        let tls = TlsConfig {
            certificate: Some(PathBuf::from("/nonexistent/cert.pem")),
            ..Default::default()
        };
        let result = build_client(Duration::from_secs(5), Duration::from_secs(30), &tls);
        assert!(matches!(result, Err(BuildError::Tls(_))));
    }
}
