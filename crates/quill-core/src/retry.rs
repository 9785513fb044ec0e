//! Retrying transient backend failures and turning error messages into user-facing copy.
//!
//! [`with_retry`] is executor-agnostic: the caller supplies the sleep future, so the same code
//! runs under any async runtime (or `futures::executor::block_on` in tests).

use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt.max(1) {
            delay = delay
                .saturating_mul(self.backoff_multiplier)
                .min(self.max_delay);
        }
        delay.min(self.max_delay)
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "failed to fetch",
    "timeout",
    "connection",
    "econnreset",
    "socket hang up",
];

/// Whether an error message looks like a network hiccup worth retrying.
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Runs `op` until it succeeds, returns a non-retryable error, or `policy.max_attempts` is
/// reached. The last error is returned on failure.
pub async fn with_retry<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    op: Op,
    sleep: Sleep,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    with_retry_notify(policy, op, sleep, is_retryable, |_, _, _| {}).await
}

/// [`with_retry`] that calls `on_retry(attempt, &error, delay)` before each wait.
pub async fn with_retry_notify<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    mut op: Op,
    mut sleep: Sleep,
    is_retryable: impl Fn(&E) -> bool,
    mut on_retry: impl FnMut(u32, &E, Duration),
) -> Result<T, E>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
                on_retry(attempt, &err, delay);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retries a backend query whose errors are only known by their message: transient ones
/// (see [`is_transient_message`]) are retried, anything else is returned at once.
pub async fn retry_query<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    op: Op,
    sleep: Sleep,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    with_retry(policy, op, sleep, |e: &E| is_transient_message(&e.to_string())).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Auth,
    Validation,
    NotFound,
    Permission,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Unable to connect. Please check your internet connection and try again."
            }
            Self::Auth => "Your session has expired. Please sign in again.",
            Self::NotFound => "The requested content could not be found.",
            Self::Permission => "You don't have permission to perform this action.",
            Self::Validation => "The provided information is invalid. Please check and try again.",
            Self::Server => "Our servers are experiencing issues. Please try again later.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorizedError {
    pub category: ErrorCategory,
    pub message: String,
    pub user_message: &'static str,
}

/// Checked in order; the first matching category wins.
const CATEGORY_MARKERS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &["network", "failed to fetch", "timeout", "offline"],
    ),
    (
        ErrorCategory::Auth,
        &["unauthorized", "unauthenticated", "jwt", "token", "session"],
    ),
    (
        ErrorCategory::NotFound,
        &["not found", "does not exist", "no rows"],
    ),
    (
        ErrorCategory::Permission,
        &["permission", "forbidden", "access denied", "policy"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid", "validation", "constraint", "duplicate"],
    ),
    (ErrorCategory::Server, &["server", "internal", "500"]),
];

/// Classifies an error message. `None` stands for an error without a message.
pub fn categorize_error(message: Option<&str>) -> CategorizedError {
    let Some(message) = message else {
        return CategorizedError {
            category: ErrorCategory::Unknown,
            message: "An unexpected error occurred".to_string(),
            user_message: ErrorCategory::Unknown.user_message(),
        };
    };

    let lower = message.to_lowercase();
    let category = CATEGORY_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map_or(ErrorCategory::Unknown, |(c, _)| *c);

    CategorizedError {
        category,
        message: message.to_string(),
        user_message: category.user_message(),
    }
}
