// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Publishing client for one collector host.
//!
//! A batch is split into job and container events. Jobs are sent first; if that fails the
//! whole batch goes back for retry and containers are not attempted. Containers are sent
//! second and only they are retried when their request fails. Every successful request is
//! mirrored to the fan-out dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error};
use uuid::Uuid;

use crate::auth::Auth;
use crate::batch::Batch;
use crate::config::CollectorConfig;
use crate::credentials::CredentialStore;
use crate::encoder::{encoder_for_level, Encoder};
use crate::error::{BuildError, PublishError, SendError};
use crate::event::{split_events, Category, Event};
use crate::fanout::FanoutDispatcher;
use crate::http::build_client;
use crate::observer::Observer;
use crate::rate_limiter::RateLimiter;
use crate::request::RequestTemplate;

pub struct Client {
    host: String,
    encoder: Box<dyn Encoder>,
    limiter: RateLimiter,
    http: reqwest::Client,
    job_request: RequestTemplate,
    container_request: RequestTemplate,
    auth: Option<Auth>,
    credentials: Arc<CredentialStore>,
    fanout: Arc<FanoutDispatcher>,
    observer: Arc<dyn Observer>,
}

impl Client {
    pub fn new(
        host: &str,
        config: &CollectorConfig,
        credentials: Arc<CredentialStore>,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, BuildError> {
        let encoder = encoder_for_level(config.compress_level)?;
        let http = build_client(config.timeout, config.keep_alive, &config.ssl)?;

        let mut job_request = RequestTemplate::new(
            host,
            &config.job_path,
            &config.method,
            &config.params,
            &config.headers,
        )?;
        encoder.add_headers(job_request.headers_mut());
        let mut container_request = RequestTemplate::new(
            host,
            &config.container_path,
            &config.method,
            &config.params,
            &config.headers,
        )?;
        encoder.add_headers(container_request.headers_mut());

        let auth = Auth::from_config(&config.auth, &config.cluster_key)?;
        let fanout = Arc::new(FanoutDispatcher::new(&config.output)?);

        debug!(
            "Created collector client for {host}, compress level {}, {} B/s",
            config.compress_level, config.body_bytes_per_second
        );
        Ok(Self {
            host: host.to_string(),
            encoder,
            limiter: RateLimiter::new(config.body_bytes_per_second, config.body_max_bytes),
            http,
            job_request,
            container_request,
            auth,
            credentials,
            fanout,
            observer,
        })
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Sends the batch and settles it: acknowledged in full, or the unsent events handed
    /// back for retry. The error names the category that failed.
    pub async fn publish<B: Batch>(&self, batch: B) -> Result<(), PublishError> {
        self.observer.new_batch(batch.events().len());
        let (jobs, containers) = split_events(batch.events());

        if let Err(source) = self.send_events(&jobs, Category::Job).await {
            let rest = batch.events().to_vec();
            return Err(self.retry(batch, rest, Category::Job, source));
        }
        if let Err(source) = self.send_events(&containers, Category::Container).await {
            return Err(self.retry(batch, containers, Category::Container, source));
        }

        batch.ack();
        Ok(())
    }

    fn retry<B: Batch>(
        &self,
        batch: B,
        rest: Vec<Event>,
        category: Category,
        source: SendError,
    ) -> PublishError {
        let error = PublishError { category, source };
        error!("{error}, retrying {} events", rest.len());
        self.observer.failed(rest.len());
        batch.retry_events(rest);
        error
    }

    async fn send_events(&self, events: &[Event], category: Category) -> Result<(), SendError> {
        if events.is_empty() {
            return Ok(());
        }

        let body = self.encoder.encode(events)?;
        let request_id = Uuid::new_v4().to_string();
        let template = match category {
            Category::Job => &self.job_request,
            Category::Container => &self.container_request,
        };
        let mut req = template.request(&self.http, &request_id);
        if let Some(auth) = &self.auth {
            req = auth.apply(req, &self.credentials);
        }

        let delay = self.limiter.reserve(body.len())?;
        if !delay.is_zero() {
            debug!(
                "Rate limited {category} request {request_id}, waiting {}ms",
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let start = Instant::now();
        let bytes = body.len();
        let resp = req
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

        debug!(
            "Sent {} {category} events ({bytes} bytes) to {}, request {request_id}, cost: {:.3}s",
            events.len(),
            self.host,
            start.elapsed().as_secs_f64()
        );
        self.fanout.dispatch(events);
        Ok(())
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collector({})", self.host)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{CountingObserver, NoopObserver};
    use mockito::Server;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Acked,
        Retried(Vec<Event>),
    }

    struct TestBatch {
        events: Vec<Event>,
        outcome: Arc<Mutex<Option<Outcome>>>,
    }

    impl TestBatch {
        fn new(events: Vec<Event>) -> (Self, Arc<Mutex<Option<Outcome>>>) {
            let outcome = Arc::new(Mutex::new(None));
            (
                Self {
                    events,
                    outcome: Arc::clone(&outcome),
                },
                outcome,
            )
        }
    }

    impl Batch for TestBatch {
        fn events(&self) -> &[Event] {
            &self.events
        }

        fn ack(self) {
            *self.outcome.lock().unwrap() = Some(Outcome::Acked);
        }

        fn retry_events(self, events: Vec<Event>) {
            *self.outcome.lock().unwrap() = Some(Outcome::Retried(events));
        }
    }

    fn config() -> CollectorConfig {
        CollectorConfig {
            compress_level: 0,
            timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    fn job(id: u32) -> Event {
        Event::try_from(json!({"id": id, "terminus": {"source": "job"}})).unwrap()
    }

    fn container(id: u32) -> Event {
        Event::try_from(json!({"id": id, "terminus": {"source": "container"}})).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let store = Arc::new(CredentialStore::new());
        let observer: Arc<dyn Observer> = Arc::new(NoopObserver);

        let mut bad_level = config();
        bad_level.compress_level = 10;
        assert!(matches!(
            Client::new("http://h", &bad_level, Arc::clone(&store), Arc::clone(&observer)),
            Err(BuildError::CompressionLevel(10))
        ));

        let mut bad_auth = config();
        bad_auth.auth.auth_type = "basic".to_string();
        assert!(matches!(
            Client::new("http://h", &bad_auth, Arc::clone(&store), Arc::clone(&observer)),
            Err(BuildError::MissingAuthProperty { .. })
        ));

        assert!(matches!(
            Client::new("http://[::1", &config(), store, observer),
            Err(BuildError::Url { .. })
        ));
    }

    #[test]
    fn test_display() {
        let client = Client::new(
            "http://collector:7076",
            &config(),
            Arc::new(CredentialStore::new()),
            Arc::new(NoopObserver),
        )
        .unwrap();
        assert_eq!(client.to_string(), "collector(http://collector:7076)");
        assert_eq!(client.host(), "http://collector:7076");
    }

    #[tokio::test]
    async fn test_empty_batch_is_acked_without_requests() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let observer = Arc::new(CountingObserver::default());
        let client = Client::new(
            &server.url(),
            &config(),
            Arc::new(CredentialStore::new()),
            observer.clone(),
        )
        .unwrap();

        let (batch, outcome) = TestBatch::new(Vec::new());
        client.publish(batch).await.unwrap();

        assert_eq!(*outcome.lock().unwrap(), Some(Outcome::Acked));
        assert_eq!(observer.batches(), 1);
        assert_eq!(observer.events(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_container_failure_retries_only_containers() {
        let mut server = Server::new_async().await;
        let job_mock = server
            .mock("POST", "/api/v1/collect/logs/job")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let container_mock = server
            .mock("POST", "/api/v1/collect/logs/container")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let observer = Arc::new(CountingObserver::default());
        let client = Client::new(
            &server.url(),
            &config(),
            Arc::new(CredentialStore::new()),
            observer.clone(),
        )
        .unwrap();

        let (batch, outcome) = TestBatch::new(vec![container(1), job(2), container(3)]);
        let err = client.publish(batch).await.unwrap_err();

        assert_eq!(err.category, Category::Container);
        assert!(matches!(err.source, SendError::Status { .. }));
        assert_eq!(
            *outcome.lock().unwrap(),
            Some(Outcome::Retried(vec![container(1), container(3)]))
        );
        assert_eq!(observer.failed_events(), 2);
        job_mock.assert_async().await;
        container_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_error_retries_batch() {
        // nothing listens on port 1
        let client = Client::new(
            "http://127.0.0.1:1",
            &config(),
            Arc::new(CredentialStore::new()),
            Arc::new(NoopObserver),
        )
        .unwrap();

        let (batch, outcome) = TestBatch::new(vec![job(1), container(2)]);
        let err = client.publish(batch).await.unwrap_err();

        assert_eq!(err.category, Category::Job);
        assert!(matches!(err.source, SendError::Transport { .. }));
        assert_eq!(
            *outcome.lock().unwrap(),
            Some(Outcome::Retried(vec![job(1), container(2)]))
        );
    }
}
