//! Shared blocking HTTP client construction.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

/// Default timeout for every outbound call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a blocking client whose requests give up after `timeout`.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn blocking_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("leukoscan/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Reads a response body, failing on non-2xx statuses with the body attached.
pub(crate) fn checked_text(response: reqwest::blocking::Response, what: &str) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("Failed to read {what} response"))?;
    if !status.is_success() {
        anyhow::bail!("{what} returned {status}: {}", truncate(&body, 200));
    }
    Ok(body)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
