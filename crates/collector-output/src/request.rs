// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Url};

use crate::error::BuildError;

/// Per-request correlation id header.
pub const REQUEST_ID_HEADER: &str = "terminus-request-id";

/// Fixed parts of a request to one destination. Each send starts from a fresh copy and only
/// adds the body, the correlation id and auth.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl RequestTemplate {
    pub fn new(
        host: &str,
        path: &str,
        method: &str,
        params: &HashMap<String, String>,
        headers: &HashMap<String, String>,
    ) -> Result<Self, BuildError> {
        let method = Method::from_bytes(method.trim().as_bytes())
            .map_err(|_| BuildError::Method(method.to_string()))?;

        let raw = if host.contains("://") {
            format!("{host}{path}")
        } else {
            format!("http://{host}{path}")
        };
        let mut url = Url::parse(&raw).map_err(|e| BuildError::Url {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !params.is_empty() {
            let mut sorted: Vec<_> = params.iter().collect();
            sorted.sort();
            url.query_pairs_mut().extend_pairs(sorted);
        }

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| BuildError::Header {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| BuildError::Header {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            header_map.append(header_name, header_value);
        }
        header_map.append(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            method,
            url,
            headers: header_map,
        })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Starts a request from the template, tagged with `request_id`.
    pub fn request(&self, client: &reqwest::Client, request_id: &str) -> RequestBuilder {
        client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone())
            .header(REQUEST_ID_HEADER, request_id)
    }
}
