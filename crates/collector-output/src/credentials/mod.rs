// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cluster credential handling: the token store and the mounted-secret watcher that keeps
//! it fresh.

pub mod store;
pub mod watcher;

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::CredentialConfig;
use crate::error::BuildError;
pub use store::CredentialStore;
pub use watcher::{is_rotation_event, CredentialWatcher, RefreshFn};

/// Reads the secret file, failing if it cannot be read.
pub fn read_credential_file(path: &Path) -> Result<Vec<u8>, BuildError> {
    std::fs::read(path).map_err(|source| BuildError::Credential {
        path: path.to_path_buf(),
        source,
    })
}

/// Seeds `store` from the mounted secret and keeps it updated on every remount.
pub fn watch_credential_file(
    store: Arc<CredentialStore>,
    config: &CredentialConfig,
) -> Result<CredentialWatcher, BuildError> {
    let path = config.path();
    let content = read_credential_file(&path)?;
    info!("read init credential, {} bytes", content.len());
    store.set_token(&content);

    let refresh_path = path;
    let on_event: RefreshFn = Arc::new(move |_event: &notify::Event| {
        match std::fs::read(&refresh_path) {
            Ok(content) => {
                info!("get new credential content, {} bytes", content.len());
                store.set_token(&content);
            }
            Err(e) => error!(
                "read cluster credential {} error: {e}",
                refresh_path.display()
            ),
        }
    });

    CredentialWatcher::spawn(&config.dir, &config.marker, on_event)
}
