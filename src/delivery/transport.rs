//! Outbound transport seam and the bundled webhook client.

use std::fmt::Debug;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;

use super::error::DeliveryError;
use crate::domain::{Destination, Notification};

/// Longest `Retry-After` honoured; larger values are clamped.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Performs a single delivery attempt.
pub trait Transport: Send + Sync + Debug {
    /// Sends `notification` to `destination`.
    ///
    /// Implementations classify failures as [`DeliveryError::Transient`]
    /// (worth retrying) or [`DeliveryError::Permanent`].
    fn deliver<'a>(
        &'a self,
        destination: &'a Destination,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;
}

/// Webhook transport posting the notification payload as JSON.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
}

impl WebhookTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Permanent`] if the HTTP client cannot be
    /// built (e.g. no TLS backend available).
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("killtracker-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Permanent {
                reason: format!("cannot build http client: {e}"),
            })?;
        Ok(Self { client })
    }

    async fn post(&self, destination: &Destination, notification: &Notification) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&destination.url)
            .json(&notification.payload)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(classify_status(status, retry_after))
    }
}

impl Transport for WebhookTransport {
    fn deliver<'a>(
        &'a self,
        destination: &'a Destination,
        notification: &'a Notification,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(self.post(destination, notification))
    }
}

/// Parses a `Retry-After` value given in seconds, clamped to
/// [`MAX_RETRY_AFTER`]. Negative, non-numeric and NaN values yield `None`.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let delay = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(delay.min(MAX_RETRY_AFTER))
}

/// Maps a non-success HTTP status to a delivery error.
#[must_use]
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> DeliveryError {
    let reason = format!("webhook responded {status}");
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        DeliveryError::Transient {
            reason,
            retry_after,
        }
    } else {
        DeliveryError::Permanent { reason }
    }
}

fn classify_request_error(err: reqwest::Error) -> DeliveryError {
    if err.is_builder() {
        DeliveryError::Permanent {
            reason: format!("invalid webhook request: {err}"),
        }
    } else {
        DeliveryError::Transient {
            reason: format!("webhook request failed: {err}"),
            retry_after: None,
        }
    }
}
