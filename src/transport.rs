use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::errors::{AppError, Stage};
use crate::validation::ensure_api_key;

/// Help Scout takes the API key as the basic-auth username and ignores the password.
pub const API_KEY_PASSWORD: &str = "X";

/// Bounded retry for transient failures (connect errors, timeouts, 429, 5xx).
///
/// A `POST` may already have been stored when it times out or gets a 5xx, so
/// creates are only replayed after a connect error or a 429.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retries).
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Authenticated JSON transport to the Help Scout API.
///
/// Owns the retry budget; callers above it see a single result per request.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Creates a new `HttpTransport`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://api.helpscout.net/v1`.
    /// * `api_key` - Help Scout API key; an empty key is a configuration error.
    /// * `timeout` - Per-request timeout.
    /// * `retry` - Retry budget for transient failures.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, AppError> {
        let api_key = api_key.into();
        ensure_api_key(&api_key)?;

        let base_url = Url::parse(base_url.into().trim_end_matches('/'))
            .map_err(|e| AppError::Configuration(format!("Invalid Help Scout base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Configuration(format!(
                "Help Scout base URL cannot carry a path: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::Configuration(format!("Failed to create Help Scout client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
            retry,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            config.helpscout_base_url.clone(),
            config.helpscout_api_key.clone(),
            Duration::from_secs(config.request_timeout_secs),
            RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
                ..RetryPolicy::default()
            },
        )
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends percent-encoded `segments` to the base URL path.
    fn url_for(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Configuration(format!(
                    "Help Scout base URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends one request (plus retries) and decodes a 2xx JSON body.
    ///
    /// `segments` are appended to the base path one by one, so an id holding
    /// `/` or `?` stays inside its own segment. Non-2xx statuses become
    /// [`AppError::RemoteApi`] carrying the status; failures without a status
    /// become [`AppError::Transport`].
    pub async fn send<B, T>(
        &self,
        stage: Stage,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, AppError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(segments)?;
        let path = url.path().to_string();
        let replay_safe = method != Method::POST;
        let mut attempt: u32 = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .basic_auth(&self.api_key, Some(API_KEY_PASSWORD))
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let failure = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        if attempt > 0 {
                            tracing::debug!(%stage, attempt = attempt + 1, "Help Scout request succeeded after retries");
                        }
                        return response.json::<T>().await.map_err(|e| AppError::Transport {
                            stage,
                            message: format!("Failed to parse Help Scout response: {}", e),
                        });
                    }

                    let error_text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    let error = AppError::RemoteApi {
                        stage,
                        status: status.as_u16(),
                        message: format!(
                            "cannot {} {} ({}): {}",
                            method,
                            path,
                            status.as_u16(),
                            error_text
                        ),
                    };
                    if !is_retryable_status(status, replay_safe) {
                        return Err(error);
                    }
                    error
                }
                Err(e) => {
                    let transient = e.is_connect() || (replay_safe && e.is_timeout());
                    let error = AppError::Transport {
                        stage,
                        message: e.to_string(),
                    };
                    if !transient {
                        return Err(error);
                    }
                    error
                }
            };

            if attempt >= self.retry.max_retries {
                tracing::warn!(
                    %stage,
                    attempts = attempt + 1,
                    error = %failure,
                    "Help Scout retry budget exhausted"
                );
                return Err(failure);
            }

            let delay = self.retry.delay_for(attempt);
            tracing::warn!(
                %stage,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Transient Help Scout failure, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable_status(status: StatusCode, replay_safe: bool) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || (replay_safe && status.is_server_error())
}
