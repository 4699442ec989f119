//! Client transport
//!
//! [`SyncTransport`] is the seam between the repository and the wire.
//! [`HttpSyncTransport`] talks to the server's staging endpoint and its two
//! event streams over HTTP.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response, StatusCode};

use super::errors::{ClientError, ClientResult};
use super::sse::event_data_stream;
use crate::http_server::RESOURCE_PATH;
use crate::observability::{log_event_at, Event, Severity};
use crate::records::OrderFilter;
use crate::sync::{WindowRequest, WindowResult, REQUEST_ID_HEADER};

/// Decoded events of one open stream
pub type EventStream<T> = BoxStream<'static, ClientResult<T>>;

/// Operations the client needs from the server
#[async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    /// Stage `filter`; returns the token
    async fn stage(&self, filter: &OrderFilter) -> ClientResult<String>;

    /// Open the count stream. A refused token is
    /// [`ClientError::SessionRejected`].
    async fn open_count(&self, token: &str) -> ClientResult<EventStream<u64>>;

    /// Open a window stream. A refused token is
    /// [`ClientError::SessionRejected`].
    async fn open_window(&self, token: &str, window: WindowRequest) -> ClientResult<EventStream<WindowResult>>;
}

/// HTTP transport against a running server
#[derive(Debug, Clone)]
pub struct HttpSyncTransport {
    client: Client,
    base_url: String,
}

impl HttpSyncTransport {
    /// Creates a transport targeting the provided base URL (e.g.
    /// `http://localhost:8080`). Stream requests carry no timeout.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ClientError::Transport("base url must not be empty".into()));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(format!("http client build failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, RESOURCE_PATH, path)
    }

    async fn open_events(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, u64)],
    ) -> ClientResult<BoxStream<'static, ClientResult<String>>> {
        let response = self
            .client
            .get(self.url(path))
            .header(REQUEST_ID_HEADER, token)
            .header(ACCEPT, "text/event-stream")
            .query(query)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(event_data_stream(Box::pin(response.bytes_stream())).boxed())
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn stage(&self, filter: &OrderFilter) -> ClientResult<String> {
        let response = self.client.post(self.url("/sse")).json(filter).send().await?;
        let response = check_status(response).await.map_err(|e| match e {
            ClientError::Transport(_) | ClientError::Decode(_) => e,
            other => ClientError::Staging(other.to_string()),
        })?;

        let token = response.text().await?.trim().to_string();
        if token.is_empty() {
            return Err(ClientError::Staging("server returned an empty token".into()));
        }
        Ok(token)
    }

    async fn open_count(&self, token: &str) -> ClientResult<EventStream<u64>> {
        let events = self.open_events("/sse/count", token, &[]).await?;
        Ok(decode_events(events, "count", |data| {
            data.trim().parse::<u64>().map_err(|e| e.to_string())
        }))
    }

    async fn open_window(&self, token: &str, window: WindowRequest) -> ClientResult<EventStream<WindowResult>> {
        let query = [("position", window.position), ("size", window.size)];
        let events = self.open_events("/sse", token, &query).await?;
        Ok(decode_events(events, "window", |data| {
            serde_json::from_str::<WindowResult>(data).map_err(|e| e.to_string())
        }))
    }
}

/// 403 becomes [`ClientError::SessionRejected`], any other failure status
/// [`ClientError::Http`].
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::FORBIDDEN {
        return Err(ClientError::SessionRejected(body));
    }
    Err(ClientError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Parse each event, dropping the ones that do not decode
fn decode_events<T, F>(
    events: BoxStream<'static, ClientResult<String>>,
    stream: &'static str,
    parse: F,
) -> EventStream<T>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
{
    events
        .filter_map(move |item| {
            let decoded = match item {
                Ok(data) => match parse(&data) {
                    Ok(value) => Some(Ok(value)),
                    Err(reason) => {
                        log_event_at(Severity::Warn, Event::StreamEventDropped, &[
                            ("reason", reason.as_str()),
                            ("stream", stream),
                        ]);
                        None
                    }
                },
                Err(e) => Some(Err(e)),
            };
            futures_util::future::ready(decoded)
        })
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(HttpSyncTransport::new("  ").is_err());
    }

    #[test]
    fn test_url_building() {
        let transport = HttpSyncTransport::new("http://localhost:8080/").unwrap();
        assert_eq!(transport.url("/sse/count"), "http://localhost:8080/orders/sse/count");
    }

    #[tokio::test]
    async fn test_malformed_events_are_dropped() {
        let raw: Vec<ClientResult<String>> = vec![
            Ok("7".to_string()),
            Ok("seven".to_string()),
            Ok("8".to_string()),
        ];
        let decoded: Vec<u64> = decode_events(stream::iter(raw).boxed(), "count", |d| {
            d.parse::<u64>().map_err(|e| e.to_string())
        })
        .map(|item| item.unwrap())
        .collect()
        .await;
        assert_eq!(decoded, vec![7, 8]);
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let raw: Vec<ClientResult<String>> = vec![Err(ClientError::Transport("reset".into()))];
        let mut decoded = decode_events(stream::iter(raw).boxed(), "window", |d| {
            serde_json::from_str::<WindowResult>(d).map_err(|e| e.to_string())
        });
        assert!(matches!(decoded.next().await, Some(Err(ClientError::Transport(_)))));
    }
}
