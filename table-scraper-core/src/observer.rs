//! Learns the expected row count from the app's config response.
//!
//! The app fetches a JSON list whose first element carries
//! `config.totalItemCount`. [`TotalCountObserver`] watches CDP network events
//! for that response and delivers the count exactly once through a oneshot
//! channel. No matching response means the total is unknown (0).

use anyhow::{Context, Result};
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Extract `body[0].config.totalItemCount`.
///
/// A config object without the count yields `Some(0)`; any other shape is
/// `None`.
pub fn parse_total_item_count(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let config = value.as_array()?.first()?.get("config")?;
    match config.get("totalItemCount") {
        Some(count) => count.as_u64(),
        None => config.is_object().then_some(0),
    }
}

/// Whether a response is the config payload we are looking for.
pub fn is_config_response(url: &str, mime_type: &str, marker: &str) -> bool {
    url.contains(marker) && mime_type.contains("application/json")
}

async fn response_body(page: &Page, request_id: &str) -> Result<String> {
    let returns = page
        .execute(GetResponseBodyParams::new(RequestId::new(request_id.to_string())))
        .await
        .context("Failed to fetch response body")?;

    if returns.result.base64_encoded {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&returns.result.body)
            .context("Response body is not valid base64")?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(returns.result.body.clone())
    }
}

/// Pairs `ResponseReceived` for the config request with its
/// `LoadingFinished`. The two events may be seen in either order.
#[derive(Debug, Default)]
struct RequestPairing {
    responded: HashSet<String>,
    finished: HashSet<String>,
}

impl RequestPairing {
    /// A config response arrived. Returns true once its body is readable.
    fn response_seen(&mut self, request_id: &str) -> bool {
        if self.finished.remove(request_id) {
            return true;
        }
        self.responded.insert(request_id.to_string());
        false
    }

    /// Some request finished loading. Returns true if it is a config response.
    fn loading_finished(&mut self, request_id: &str) -> bool {
        if self.responded.remove(request_id) {
            return true;
        }
        self.finished.insert(request_id.to_string());
        false
    }
}

async fn read_total(page: &Page, request_id: &str) -> Option<u64> {
    match response_body(page, request_id).await {
        Ok(body) => parse_total_item_count(&body),
        Err(e) => {
            tracing::debug!(error = %e, "Could not read config response");
            None
        }
    }
}

/// Background watcher for the config response.
pub struct TotalCountObserver {
    rx: oneshot::Receiver<u64>,
    task: JoinHandle<()>,
}

impl TotalCountObserver {
    /// Start listening on `page`. Must be attached before the app fetches its
    /// config, i.e. before launching the table view.
    pub async fn attach(page: &Page, marker: &str) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .context("Failed to enable network events")?;

        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("Failed to subscribe to network responses")?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("Failed to subscribe to network loading events")?;

        let page = page.clone();
        let marker = marker.to_string();
        let (tx, rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut pairing = RequestPairing::default();

            loop {
                let ready = tokio::select! {
                    biased;
                    Some(event) = responses.next() => {
                        let response = &event.response;
                        if !is_config_response(&response.url, &response.mime_type, &marker) {
                            continue;
                        }
                        tracing::debug!(url = %response.url, "Config response seen");
                        let request_id = event.request_id.inner();
                        pairing.response_seen(request_id).then(|| request_id.clone())
                    }
                    Some(event) = finished.next() => {
                        let request_id = event.request_id.inner();
                        pairing.loading_finished(request_id).then(|| request_id.clone())
                    }
                    else => break,
                };

                let Some(request_id) = ready else { continue };
                if let Some(total) = read_total(&page, &request_id).await {
                    tracing::info!(total, "totalItemCount detected");
                    let _ = tx.send(total);
                    return;
                }
            }
        });

        Ok(Self { rx, task })
    }

    /// Wait up to `wait` for the count; 0 if it never arrived.
    pub async fn total(self, wait: Duration) -> u64 {
        let Self { rx, task } = self;
        let total = match tokio::time::timeout(wait, rx).await {
            Ok(Ok(total)) => total,
            _ => {
                tracing::warn!("totalItemCount not observed, collecting until the table is exhausted");
                0
            }
        };
        task.abort();
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_total_from_config_list() {
        let body = r#"[{"config": {"totalItemCount": 2210, "theme": "dark"}}]"#;
        assert_eq!(parse_total_item_count(body), Some(2210));
    }

    #[test]
    fn test_parse_total_missing_count_is_zero() {
        let body = r#"[{"config": {"theme": "dark"}}]"#;
        assert_eq!(parse_total_item_count(body), Some(0));
    }

    #[test]
    fn test_parse_total_rejects_other_shapes() {
        assert_eq!(parse_total_item_count(r#"{"config": {"totalItemCount": 5}}"#), None);
        assert_eq!(parse_total_item_count("[]"), None);
        assert_eq!(parse_total_item_count(r#"[{"user": 1}]"#), None);
        assert_eq!(parse_total_item_count("<html>"), None);
        assert_eq!(
            parse_total_item_count(r#"[{"config": {"totalItemCount": "many"}}]"#),
            None
        );
    }

    #[test]
    fn test_pairing_response_then_finished() {
        let mut pairing = RequestPairing::default();
        assert!(!pairing.loading_finished("7.1"));
        assert!(!pairing.response_seen("7.2"));
        assert!(pairing.loading_finished("7.2"));
        // Each request pairs once.
        assert!(!pairing.loading_finished("7.2"));
    }

    #[test]
    fn test_pairing_finished_before_response() {
        let mut pairing = RequestPairing::default();
        assert!(!pairing.loading_finished("9.4"));
        assert!(pairing.response_seen("9.4"));
        assert!(!pairing.response_seen("9.5"));
    }

    #[test]
    fn test_is_config_response() {
        let marker = "get_user_config_safe";
        assert!(is_config_response(
            "https://x.example/rest/v1/rpc/get_user_config_safe",
            "application/json",
            marker
        ));
        assert!(!is_config_response(
            "https://x.example/rest/v1/rpc/get_user_config_safe",
            "text/html",
            marker
        ));
        assert!(!is_config_response(
            "https://x.example/rest/v1/products",
            "application/json",
            marker
        ));
    }
}
