// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP output for a log shipping pipeline.
//!
//! Batches of log events are split into job and container events and posted to a
//! collector, job events first. Request bodies go through a byte rate limiter, requests
//! are authenticated with a rotating cluster credential or basic auth, and successfully
//! delivered events are mirrored to the collector address named inside each event.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use collector_output::{make_output, CollectorConfig, NoopObserver};
//!
//! let config = CollectorConfig::load(Path::new("collector.yaml"))?;
//! collector_output::logger::init(&config.log_level)?;
//! let output = make_output(&config, Arc::new(NoopObserver))?;
//! output.clients()[0].publish(batch).await?;
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![deny(clippy::all)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::needless_pass_by_value)]

pub mod auth;
pub mod batch;
pub mod client;
pub mod config;
pub mod credentials;
pub mod encoder;
pub mod error;
pub mod event;
pub mod fanout;
pub mod http;
pub mod logger;
pub mod observer;
pub mod output;
pub mod rate_limiter;
pub mod request;

pub use auth::Auth;
pub use batch::Batch;
pub use client::Client;
pub use config::CollectorConfig;
pub use credentials::{CredentialStore, CredentialWatcher};
pub use error::{BuildError, ConfigError, PublishError, SendError};
pub use event::{Category, Event};
pub use fanout::FanoutDispatcher;
pub use observer::{CountingObserver, NoopObserver, Observer};
pub use output::{make_output, Output, PipelineSettings};
pub use rate_limiter::RateLimiter;
