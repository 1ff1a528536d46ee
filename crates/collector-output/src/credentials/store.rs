// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

/// Holds the cluster access token used for key authentication.
///
/// Writers are serialized by a lock; readers load the current token without locking and
/// always see a whole value.
pub struct CredentialStore {
    token: ArcSwap<String>,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: ArcSwap::from_pointee(String::new()),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn new_from_static_token(token: &str) -> Self {
        let store = Self::new();
        store.set_token(token.as_bytes());
        store
    }

    /// Replaces the token with `raw` minus its newlines.
    ///
    /// Empty input is ignored: secret remounts can briefly expose an empty file.
    pub fn set_token(&self, raw: &[u8]) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if raw.is_empty() {
            return;
        }
        let token = String::from_utf8_lossy(raw).replace('\n', "");
        if token.is_empty() {
            return;
        }
        self.token.store(Arc::new(token));
    }

    #[must_use]
    pub fn token(&self) -> Arc<String> {
        self.token.load_full()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CredentialStore")
    }
}
