// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;

use crate::config::AuthConfig;
use crate::credentials::CredentialStore;
use crate::error::BuildError;

pub const AUTH_TYPE_KEY: &str = "key";
pub const AUTH_TYPE_BASIC: &str = "basic";
pub const PROPERTY_USERNAME: &str = "username";
pub const PROPERTY_PASSWORD: &str = "password";
pub const PROPERTY_ACCESS_KEY: &str = "filebeat_access_key";
pub const CLUSTER_KEY_HEADER: &str = "X-Erda-Cluster-Key";

/// How collector requests are authenticated. Chosen once when the client is built.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// Bearer token from the credential store plus the cluster identifier header.
    Key { cluster_key: String },
    Basic { username: String, password: String },
}

impl Auth {
    /// `None` when no auth type is configured.
    pub fn from_config(config: &AuthConfig, cluster_key: &str) -> Result<Option<Self>, BuildError> {
        match config.auth_type.as_str() {
            "" => Ok(None),
            AUTH_TYPE_KEY => Ok(Some(Auth::Key {
                cluster_key: cluster_key.to_string(),
            })),
            AUTH_TYPE_BASIC => {
                let property = |name: &'static str| {
                    config
                        .property
                        .get(name)
                        .cloned()
                        .ok_or(BuildError::MissingAuthProperty {
                            auth_type: AUTH_TYPE_BASIC,
                            property: name,
                        })
                };
                Ok(Some(Auth::Basic {
                    username: property(PROPERTY_USERNAME)?,
                    password: property(PROPERTY_PASSWORD)?,
                }))
            }
            other => Err(BuildError::AuthType(other.to_string())),
        }
    }

    pub(crate) fn apply(&self, req: RequestBuilder, credentials: &CredentialStore) -> RequestBuilder {
        match self {
            Auth::Key { cluster_key } => req
                .header(AUTHORIZATION, format!("Bearer {}", credentials.token()))
                .header(CLUSTER_KEY_HEADER, cluster_key.as_str()),
            Auth::Basic { username, password } => req.basic_auth(username, Some(password)),
        }
    }
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Key { cluster_key } => f
                .debug_struct("Key")
                .field("cluster_key", cluster_key)
                .finish(),
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}
