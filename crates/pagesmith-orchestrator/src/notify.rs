//! Best-effort result delivery to the caller's callback URL

use async_trait::async_trait;
use pagesmith_core::retry::{retry, transient_network};
use pagesmith_core::{NotificationPayload, PagesmithError, Result, RetryPolicy, WorkflowResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

/// Default per-request timeout for callback delivery
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that posts a payload to a callback URL, one attempt per call
#[async_trait]
pub trait CallbackTransport: Send + Sync + std::fmt::Debug {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<()>;
}

/// Callback transport over HTTP
#[derive(Debug, Clone)]
pub struct HttpCallback {
    http: reqwest::Client,
}

impl HttpCallback {
    pub fn new() -> Result<Self> {
        Self::with_timeout(CALLBACK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PagesmithError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl CallbackTransport for HttpCallback {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<()> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| PagesmithError::transport("notify", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PagesmithError::http("notify", status.as_u16(), body));
        }
        info!("Callback accepted with {}", status);
        Ok(())
    }
}

/// How a notification ended; none of these fail the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered,
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, reason: String },
    /// A non-retryable failure stopped delivery early
    Rejected { reason: String },
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Delivers workflow results through the notification retry policy
#[derive(Debug, Clone)]
pub struct Notifier {
    transport: Arc<dyn CallbackTransport>,
    policy: RetryPolicy,
}

impl Notifier {
    pub fn new(transport: Arc<dyn CallbackTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::notification(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Post the flattened result; failures are logged, never returned
    pub async fn notify(&self, url: &str, result: &WorkflowResult) -> NotificationOutcome {
        let payload = result.payload();
        let transport = &self.transport;
        let payload_ref = &payload;

        info!("Sending results to {}", url);
        let outcome = retry("notify", &self.policy, transient_network, |_attempt| async move {
            transport.post(url, payload_ref).await
        })
        .await;

        match outcome {
            Ok(()) => NotificationOutcome::Delivered,
            Err(PagesmithError::RetriesExhausted { attempts, last, .. }) => {
                error!("Failed to notify {} after {} attempts: {}", url, attempts, last);
                NotificationOutcome::Exhausted {
                    attempts,
                    reason: last.to_string(),
                }
            }
            Err(e) => {
                error!("Notification to {} rejected: {}", url, e);
                NotificationOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Callback transport that records deliveries, for testing
///
/// Fails the first `failures` attempts with HTTP 503.
#[derive(Debug, Default)]
pub struct RecordingCallback {
    failures: Mutex<VecDeque<u16>>,
    always_fail: bool,
    attempts: Mutex<u32>,
    delivered: Mutex<Vec<(String, NotificationPayload)>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `count` attempts, then accept
    pub fn failing(count: usize) -> Self {
        Self {
            failures: Mutex::new(std::iter::repeat(503).take(count).collect()),
            ..Self::default()
        }
    }

    /// Reject every attempt
    pub fn unreachable() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }

    /// Accepted deliveries as (url, payload)
    pub fn delivered(&self) -> Vec<(String, NotificationPayload)> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CallbackTransport for RecordingCallback {
    async fn post(&self, url: &str, payload: &NotificationPayload) -> Result<()> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        if self.always_fail {
            return Err(PagesmithError::transport("notify", "connection refused"));
        }
        let scripted = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(status) = scripted {
            return Err(PagesmithError::http("notify", status, "unavailable"));
        }
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push((url.to_string(), payload.clone()));
        }
        Ok(())
    }
}
