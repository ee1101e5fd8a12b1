use std::error::Error as StdError;
use std::time::{Duration, Instant};

use super::types::ProbeOutcome;
use crate::error::ProbeError;

/// Timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Responses slower than this (strictly) are degraded
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 5000;

/// Redirect hops followed before giving up
const MAX_REDIRECTS: usize = 10;

/// Performs one bounded probe of a URL and classifies the outcome.
///
/// Implementations never fail: every transport problem becomes a `down`
/// outcome carrying the error description.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Classify a received response.
///
/// Priority: server error, client error, slowness, healthy.
pub fn classify(status_code: u16, elapsed_ms: u64, slow_threshold_ms: u64) -> ProbeOutcome {
    if status_code >= 500 {
        ProbeOutcome::down(elapsed_ms, Some(status_code), format!("Server error: {status_code}"))
    } else if status_code >= 400 {
        ProbeOutcome::degraded(elapsed_ms, status_code, format!("Client error: {status_code}"))
    } else if elapsed_ms > slow_threshold_ms {
        ProbeOutcome::degraded(elapsed_ms, status_code, "Slow response time")
    } else {
        ProbeOutcome::healthy(elapsed_ms, status_code)
    }
}

/// HTTP GET prober
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
    slow_threshold_ms: u64,
}

impl HttpProber {
    pub fn new(timeout: Duration, slow_threshold_ms: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout, slow_threshold_ms })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET the URL and drain the body; returns the final status code
    async fn fetch(&self, url: &str) -> Result<u16, ProbeError> {
        let response = self.client.get(url).send().await.map_err(probe_error)?;
        let status_code = response.status().as_u16();

        response.bytes().await.map_err(probe_error)?;

        Ok(status_code)
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let start = Instant::now();

        match self.fetch(url).await {
            Ok(status_code) => classify(status_code, elapsed_ms(start), self.slow_threshold_ms),
            Err(ProbeError::Timeout) => ProbeOutcome::down(
                self.timeout.as_millis() as u64,
                None,
                ProbeError::Timeout.to_string(),
            ),
            Err(err) => ProbeOutcome::down(elapsed_ms(start), None, err.to_string()),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn probe_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Transport(error_chain(&err))
    }
}

/// `outer: cause: root cause`
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }

    message
}
