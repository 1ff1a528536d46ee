// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Builds the output group handed to the host pipeline: one client per host, a shared
//! credential store and, for key auth without a static key, the secret watcher.

use std::sync::Arc;

use tracing::info;

use crate::auth::AUTH_TYPE_KEY;
use crate::client::Client;
use crate::config::{BackoffConfig, CollectorConfig};
use crate::credentials::{watch_credential_file, CredentialStore, CredentialWatcher};
use crate::error::BuildError;
use crate::observer::Observer;

/// Retry and batching settings the host pipeline applies around the clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub bulk_max_size: usize,
    /// Negative means retry forever.
    pub max_retries: i64,
    pub backoff: BackoffConfig,
    pub load_balance: bool,
}

#[derive(Debug)]
pub struct Output {
    clients: Vec<Client>,
    credentials: Arc<CredentialStore>,
    watcher: Option<CredentialWatcher>,
    settings: PipelineSettings,
}

impl Output {
    #[must_use]
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    #[must_use]
    pub fn watcher(&self) -> Option<&CredentialWatcher> {
        self.watcher.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Stops the credential watcher, if any.
    pub async fn close(self) {
        if let Some(watcher) = self.watcher {
            watcher.close().await;
        }
    }
}

/// Must be called from within a Tokio runtime when the credential file is watched.
pub fn make_output(
    config: &CollectorConfig,
    observer: Arc<dyn Observer>,
) -> Result<Output, BuildError> {
    if config.hosts.is_empty() {
        return Err(BuildError::NoHosts);
    }

    let credentials = Arc::new(CredentialStore::new());
    let mut watcher = None;
    if config.auth.auth_type == AUTH_TYPE_KEY {
        match config.auth.access_key() {
            // a static key is never refreshed
            Some(key) => credentials.set_token(key.as_bytes()),
            None => {
                let started = watch_credential_file(Arc::clone(&credentials), &config.credential)?;
                info!("Watching cluster credential in {}", started.dir().display());
                watcher = Some(started);
            }
        }
    }

    let clients = config
        .hosts
        .iter()
        .map(|host| {
            Client::new(
                host,
                config,
                Arc::clone(&credentials),
                Arc::clone(&observer),
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Output {
        clients,
        credentials,
        watcher,
        settings: PipelineSettings {
            bulk_max_size: config.bulk_max_size,
            max_retries: config.max_retries,
            backoff: config.backoff.clone(),
            load_balance: config.load_balance,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PROPERTY_ACCESS_KEY;
    use crate::config::CredentialConfig;
    use crate::observer::NoopObserver;

    fn config(hosts: &[&str]) -> CollectorConfig {
        CollectorConfig {
            hosts: hosts.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_hosts() {
        let result = make_output(&config(&[]), Arc::new(NoopObserver));
        assert!(matches!(result, Err(BuildError::NoHosts)));
    }

    #[test]
    fn test_one_client_per_host_without_auth() {
        let output = make_output(
            &config(&["http://a:7076", "http://b:7076"]),
            Arc::new(NoopObserver),
        )
        .unwrap();
        let hosts: Vec<_> = output.clients().iter().map(Client::host).collect();
        assert_eq!(hosts, vec!["http://a:7076", "http://b:7076"]);
        assert!(output.watcher().is_none());
        assert_eq!(output.credentials().token().as_str(), "");
        assert_eq!(
            output.settings(),
            &PipelineSettings {
                bulk_max_size: 50,
                max_retries: -1,
                backoff: BackoffConfig::default(),
                load_balance: true,
            }
        );
    }

    #[test]
    fn test_static_access_key_skips_watcher() {
        let mut config = config(&["http://a:7076"]);
        config.auth.auth_type = "key".to_string();
        config
            .auth
            .property
            .insert(PROPERTY_ACCESS_KEY.to_string(), "static-key".to_string());
        // would fail if the (missing) credential file were read
        config.credential.dir = "/nonexistent".into();

        let output = make_output(&config, Arc::new(NoopObserver)).unwrap();
        assert!(output.watcher().is_none());
        assert_eq!(output.credentials().token().as_str(), "static-key");
    }

    #[test]
    fn test_missing_credential_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&["http://a:7076"]);
        config.auth.auth_type = "key".to_string();
        config.credential = CredentialConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let result = make_output(&config, Arc::new(NoopObserver));
        assert!(matches!(result, Err(BuildError::Credential { .. })));
    }

    #[tokio::test]
    async fn test_key_auth_reads_and_watches_credential_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CLUSTER_ACCESS_KEY"), "mounted\n").unwrap();
        let mut config = config(&["http://a:7076"]);
        config.auth.auth_type = "key".to_string();
        config.credential = CredentialConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let output = make_output(&config, Arc::new(NoopObserver)).unwrap();
        assert_eq!(output.credentials().token().as_str(), "mounted");
        assert_eq!(output.watcher().map(CredentialWatcher::dir), Some(dir.path()));
        output.close().await;
    }
}
