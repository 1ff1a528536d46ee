// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log events as seen by the output.
//!
//! Events are produced upstream and are read-only here. The output only looks at two
//! fields: the source marker that splits a batch into job and container logs, and the
//! optional collector address used for fan-out.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the event source. `"container"` marks container logs.
pub const SOURCE_FIELD: &str = "terminus.source";
/// Source value that marks an event as a container log.
pub const CONTAINER_SOURCE: &str = "container";
/// Field naming a secondary collector the event is mirrored to.
pub const OUTPUT_ADDRESS_FIELD: &str = "terminus.output.collector";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("key {0} does not point to an object")]
    NotAnObject(String),
}

/// A structured log event whose fields can be addressed by dotted path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    content: Map<String, Value>,
}

impl Event {
    #[must_use]
    pub fn new(content: Map<String, Value>) -> Self {
        Self { content }
    }

    #[must_use]
    pub fn content(&self) -> &Map<String, Value> {
        &self.content
    }

    /// Looks up `key` by walking nested objects, e.g. `terminus.output.collector`.
    pub fn get_value(&self, key: &str) -> Result<&Value, LookupError> {
        let mut current = &self.content;
        let mut segments = key.split('.').peekable();
        while let Some(segment) = segments.next() {
            let value = current
                .get(segment)
                .ok_or_else(|| LookupError::KeyNotFound(key.to_string()))?;
            if segments.peek().is_none() {
                return Ok(value);
            }
            current = value
                .as_object()
                .ok_or_else(|| LookupError::NotAnObject(segment.to_string()))?;
        }
        Err(LookupError::KeyNotFound(key.to_string()))
    }

    /// Container when the source marker says so, and also when it cannot be read at all.
    #[must_use]
    pub fn category(&self) -> Category {
        match self.get_value(SOURCE_FIELD) {
            Ok(Value::String(source)) if source != CONTAINER_SOURCE => Category::Job,
            Ok(Value::String(_)) | Err(_) => Category::Container,
            Ok(_) => Category::Job,
        }
    }

    /// The non-empty collector address this event should be mirrored to, if any.
    #[must_use]
    pub fn output_address(&self) -> Option<&str> {
        match self.get_value(OUTPUT_ADDRESS_FIELD) {
            Ok(Value::String(addr)) if !addr.is_empty() => Some(addr),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Event {
    fn from(content: Map<String, Value>) -> Self {
        Self::new(content)
    }
}

impl TryFrom<Value> for Event {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(content) => Ok(Self::new(content)),
            other => Err(other),
        }
    }
}

/// The two destinations a batch is split across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Job,
    Container,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Job => f.write_str("job"),
            Category::Container => f.write_str("container"),
        }
    }
}

/// Splits events into `(jobs, containers)`, keeping the relative order of each.
#[must_use]
pub fn split_events(events: &[Event]) -> (Vec<Event>, Vec<Event>) {
    events
        .iter()
        .cloned()
        .partition(|event| event.category() == Category::Job)
}
