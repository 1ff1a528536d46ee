// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mirrors delivered events to the collectors named inside them.
//!
//! Events carrying `terminus.output.collector` are grouped by that address and each group
//! is posted to it once the primary send has succeeded. Delivery is best effort: failures
//! are logged and dropped, never retried, and never change the primary batch outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::FanoutConfig;
use crate::encoder::{encoder_for_level, Encoder};
use crate::error::{BuildError, SendError};
use crate::event::Event;
use crate::http::build_client;
use crate::request::RequestTemplate;

pub struct FanoutDispatcher {
    encoder: Box<dyn Encoder>,
    client: reqwest::Client,
    method: String,
    params: HashMap<String, String>,
    headers: HashMap<String, String>,
}

impl FanoutDispatcher {
    pub fn new(config: &FanoutConfig) -> Result<Self, BuildError> {
        let encoder = encoder_for_level(config.compress_level)?;
        let client = build_client(config.timeout, config.keep_alive, &config.ssl)?;
        Ok(Self {
            encoder,
            client,
            method: config.method.clone(),
            params: config.params.clone(),
            headers: config.headers.clone(),
        })
    }

    /// Best-effort boundary: delivery of the addressed `events` runs on its own task and
    /// nobody waits for it.
    pub fn dispatch(self: &Arc<Self>, events: &[Event]) {
        let events: Vec<Event> = events
            .iter()
            .filter(|event| event.output_address().is_some())
            .cloned()
            .collect();
        if events.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(self);
        drop(tokio::spawn(async move {
            dispatcher.deliver(events).await;
        }));
    }

    /// Sends every addressed group in turn, logging failures.
    pub async fn deliver(&self, events: Vec<Event>) {
        for (addr, group) in group_by_address(events) {
            let start = Instant::now();
            match self.send(&addr, &group).await {
                Ok(request_id) => info!(
                    "send output {addr} request {request_id} success, count: {}, cost: {:.3}s",
                    group.len(),
                    start.elapsed().as_secs_f64()
                ),
                Err(e) => error!("fail to send {addr} output: {e}"),
            }
        }
    }

    async fn send(&self, addr: &str, events: &[Event]) -> Result<String, SendError> {
        let request_id = Uuid::new_v4().to_string();
        let body = self.encoder.encode(events)?;

        let mut template =
            RequestTemplate::new(addr, "", &self.method, &self.params, &self.headers).map_err(
                |e| SendError::Request {
                    request_id: request_id.clone(),
                    reason: e.to_string(),
                },
            )?;
        self.encoder.add_headers(template.headers_mut());

        debug!(
            "Sending {} events to output {addr}, request {request_id}",
            events.len()
        );
        let resp = template
            .request(&self.client, &request_id)
            .body(body)
            .send()
            .await
            .map_err(|source| SendError::Transport {
                request_id: request_id.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SendError::Status { request_id, status });
        }
        Ok(request_id)
    }
}

/// Groups events by their non-empty output address, dropping events without one.
#[must_use]
pub fn group_by_address(events: Vec<Event>) -> HashMap<String, Vec<Event>> {
    let mut groups: HashMap<String, Vec<Event>> = HashMap::new();
    for event in events {
        if let Some(addr) = event.output_address().map(str::to_string) {
            groups.entry(addr).or_default().push(event);
        }
    }
    groups
}
