//! Ordered fallback over alternative models.
//!
//! Each candidate is tried once, in order, and the first success wins. There
//! is no backoff and no circuit breaking: a failed candidate simply hands
//! over to the next one, and the last error is surfaced when all fail.

use std::future::Future;

use crate::error::{Error, Result};

/// Try `attempt` on each candidate in order, returning the first success.
pub async fn first_success<'a, T, F, Fut>(candidates: &[&'a str], mut attempt: F) -> Result<T>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;

    for (index, &model) in candidates.iter().enumerate() {
        match attempt(model).await {
            Ok(value) => {
                if index > 0 {
                    tracing::info!(model, attempt = index + 1, "Fallback model succeeded");
                }
                return Ok(value);
            }
            Err(err) => {
                tracing::warn!(
                    model,
                    attempt = index + 1,
                    remaining = candidates.len() - index - 1,
                    error = %err,
                    "Model attempt failed"
                );
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Internal("no candidate models configured".to_string())))
}
