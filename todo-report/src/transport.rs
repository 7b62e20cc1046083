//! HTTP delivery of todo reports

use crate::types::{DeliveryError, TodoContext};
use reqwest::header::CONTENT_TYPE;

/// POST `context` as JSON to `url`
///
/// Returns `Ok(true)` for a 2xx response and `Ok(false)` for any other
/// status. Transport failures come back as [`DeliveryError::Http`].
pub(crate) async fn post_context(
    client: &reqwest::Client,
    url: &str,
    context: &TodoContext,
) -> Result<bool, DeliveryError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .json(context)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        log::debug!("Todo report rejected by {}: HTTP {}", url, status);
    }
    Ok(status.is_success())
}
