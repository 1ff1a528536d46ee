// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared batch double and event builders for integration tests

#![allow(dead_code)]

use collector_output::{Batch, CollectorConfig, Event};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the output settled a batch
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Acked,
    Retried(Vec<Event>),
}

/// Batch that records its outcome where the test can still see it after `publish`
/// consumed the batch
pub struct RecordingBatch {
    events: Vec<Event>,
    outcome: Arc<Mutex<Vec<Outcome>>>,
}

impl RecordingBatch {
    pub fn new(events: Vec<Event>) -> (Self, OutcomeHandle) {
        let outcome = Arc::new(Mutex::new(Vec::new()));
        let handle = OutcomeHandle(Arc::clone(&outcome));
        (Self { events, outcome }, handle)
    }
}

impl Batch for RecordingBatch {
    fn events(&self) -> &[Event] {
        &self.events
    }

    fn ack(self) {
        self.outcome.lock().unwrap().push(Outcome::Acked);
    }

    fn retry_events(self, events: Vec<Event>) {
        self.outcome.lock().unwrap().push(Outcome::Retried(events));
    }
}

#[derive(Clone)]
pub struct OutcomeHandle(Arc<Mutex<Vec<Outcome>>>);

impl OutcomeHandle {
    /// The single outcome of the batch; panics if it was settled zero or several times
    pub fn single(&self) -> Outcome {
        let outcomes = self.0.lock().unwrap();
        assert_eq!(outcomes.len(), 1, "batch settled {} times", outcomes.len());
        outcomes[0].clone()
    }
}

pub fn job_event(id: u32) -> Event {
    Event::try_from(json!({"id": id, "message": format!("job line {id}"), "terminus": {"source": "job"}}))
        .unwrap()
}

pub fn container_event(id: u32) -> Event {
    Event::try_from(json!({"id": id, "message": format!("container line {id}"), "terminus": {"source": "container"}}))
        .unwrap()
}

/// Container event that also asks to be mirrored to `addr`
pub fn addressed_event(id: u32, addr: &str) -> Event {
    Event::try_from(json!({
        "id": id,
        "terminus": {"source": "container", "output": {"collector": addr}}
    }))
    .unwrap()
}

pub fn events_json(events: &[Event]) -> serde_json::Value {
    serde_json::to_value(events).unwrap()
}

/// Plain JSON bodies, short timeouts and a burst no test payload reaches
pub fn test_config(host: &str) -> CollectorConfig {
    let mut config = CollectorConfig {
        hosts: vec![host.to_string()],
        compress_level: 0,
        timeout: Duration::from_secs(5),
        body_max_bytes: 1024 * 1024,
        ..Default::default()
    };
    config.output.compress_level = 0;
    config.output.timeout = Duration::from_secs(5);
    config
}
