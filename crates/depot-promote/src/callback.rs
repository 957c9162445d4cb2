//! HTTP delivery of asynchronous promotion results.

use async_trait::async_trait;
use depot_config::CallbackConfig;
use depot_core::{CallbackError, CallbackMethod, CallbackPayload, CallbackPoster, CallbackTarget};
use reqwest::{Client, Method, Url};
use tracing::{debug, warn};

use crate::error::{PromoteError, PromoteResult};

enum AttemptFailure {
    Status(u16),
    Transport(reqwest::Error),
}

impl AttemptFailure {
    fn into_error(self, url: &str, attempts: u32) -> CallbackError {
        match self {
            Self::Status(status) => CallbackError::Rejected {
                url: url.to_string(),
                status,
                attempts,
            },
            Self::Transport(source) => CallbackError::Transport {
                url: url.to_string(),
                attempts,
                source: Box::new(source),
            },
        }
    }
}

/// Posts results as JSON, retrying failures with exponential backoff.
#[derive(Debug, Clone)]
pub struct HttpCallbackPoster {
    client: Client,
    config: CallbackConfig,
}

impl HttpCallbackPoster {
    /// Build a poster using the configured per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PromoteError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: CallbackConfig) -> PromoteResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|source| PromoteError::HttpClient { source })?;
        Ok(Self { client, config })
    }

    async fn attempt(
        &self,
        url: &Url,
        target: &CallbackTarget,
        payload: CallbackPayload<'_>,
    ) -> Result<(), AttemptFailure> {
        let method = match target.method {
            CallbackMethod::Post => Method::POST,
            CallbackMethod::Put => Method::PUT,
        };
        let mut request = self.client.request(method, url.clone()).json(&payload);
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }
        let response = request.send().await.map_err(AttemptFailure::Transport)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AttemptFailure::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl CallbackPoster for HttpCallbackPoster {
    async fn deliver(
        &self,
        target: &CallbackTarget,
        payload: CallbackPayload<'_>,
    ) -> Result<(), CallbackError> {
        let url = Url::parse(&target.url).map_err(|_| CallbackError::InvalidTarget {
            url: target.url.clone(),
            reason: "malformed callback url",
        })?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.retry_delay();
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            match self.attempt(&url, target, payload).await {
                Ok(()) => {
                    debug!(url = %url, attempt, "callback delivered");
                    return Ok(());
                }
                Err(failure) if attempt >= max_attempts => {
                    return Err(failure.into_error(&target.url, attempt));
                }
                Err(failure) => {
                    let reason = match &failure {
                        AttemptFailure::Status(status) => format!("status {status}"),
                        AttemptFailure::Transport(err) => err.to_string(),
                    };
                    warn!(
                        url = %url,
                        attempt,
                        error = %reason,
                        delay_ms = delay.as_millis(),
                        "callback delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }
}
