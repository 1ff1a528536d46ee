// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request body encoders.
//!
//! Events are always sent as a JSON array. A compression level of 0 sends the array as
//! is; levels 1 through 9 gzip it at that level.

use std::io::Write;

use flate2::{write::GzEncoder, Compression};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};

use crate::error::{BuildError, EncodeError};
use crate::event::Event;

const MAX_COMPRESSION_LEVEL: u32 = 9;

pub trait Encoder: Send + Sync {
    /// Serializes `events` into a request body.
    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError>;

    /// Sets the headers describing bodies produced by this encoder.
    fn add_headers(&self, headers: &mut HeaderMap);
}

/// Picks the encoder for a configured compression level.
pub fn encoder_for_level(level: u32) -> Result<Box<dyn Encoder>, BuildError> {
    match level {
        0 => Ok(Box::new(JsonEncoder)),
        1..=MAX_COMPRESSION_LEVEL => Ok(Box::new(GzipEncoder::new(level))),
        _ => Err(BuildError::CompressionLevel(level)),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(events)?)
    }

    fn add_headers(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GzipEncoder {
    level: Compression,
}

impl GzipEncoder {
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(MAX_COMPRESSION_LEVEL)),
        }
    }
}

impl Encoder for GzipEncoder {
    fn encode(&self, events: &[Event]) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        serde_json::to_writer(&mut encoder, events)?;
        encoder.flush()?;
        Ok(encoder.finish()?)
    }

    fn add_headers(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
}
