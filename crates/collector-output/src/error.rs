// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use reqwest::StatusCode;

use crate::event::Category;

/// Errors raised while building clients, encoders and watchers. All of them are fatal at
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid compression level {0}, must be between 0 and 9")]
    CompressionLevel(u32),

    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },

    #[error("invalid request method {0:?}")]
    Method(String),

    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },

    #[error("fail to load tls: {0}")]
    Tls(String),

    #[error("fail to create http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("auth type {auth_type} requires property {property}")]
    MissingAuthProperty {
        auth_type: &'static str,
        property: &'static str,
    },

    #[error("unsupported auth type {0:?}")]
    AuthType(String),

    #[error("no hosts configured")]
    NoHosts,

    #[error("read init credential {path} error: {source}")]
    Credential {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("new credential file watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("credential watcher must be started from within a Tokio runtime")]
    NoRuntime,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("fail to serialize events: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fail to compress events: {0}")]
    Io(#[from] std::io::Error),
}

/// A single reservation asked for more bytes than the bucket can ever hold. The burst has
/// already been doubled when this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("payload of {size} bytes exceeds burst, double of burst to {new_burst}")]
pub struct RateLimitOverflow {
    pub size: usize,
    pub new_burst: usize,
}

/// Why one category (or one fan-out group) was not delivered.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("fail to encode send events: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitOverflow),

    #[error("fail to build request {request_id}: {reason}")]
    Request { request_id: String, reason: String },

    #[error("fail to send request {request_id}: {source}")]
    Transport {
        request_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request {request_id} response status code {status} is not success")]
    Status {
        request_id: String,
        status: StatusCode,
    },
}

/// Error returned by `Client::publish`. The affected events have already been handed back
/// to the batch for retry when this is returned.
#[derive(Debug, thiserror::Error)]
#[error("fail to send {category} events: {source}")]
pub struct PublishError {
    pub category: Category,
    #[source]
    pub source: SendError,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("fail to parse config: {0}")]
    Parse(#[from] figment::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("invalid log level {level:?}: {source}")]
    Filter {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("fail to install log subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}
