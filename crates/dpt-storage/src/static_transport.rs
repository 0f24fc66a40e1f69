use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{FetchedPayload, PayloadTransport, TransportError};

#[derive(Debug, Clone)]
enum Route {
    Payload { content_type: String, body: Vec<u8> },
    Status(u16),
}

/// In-memory transport serving canned payloads by URL.
///
/// Used for offline replays of captured exports and as a deterministic stand-in for
/// the network in tests; unknown URLs answer with HTTP 404.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: Mutex<HashMap<String, Route>>,
    calls: AtomicUsize,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(
        self,
        url: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.set_route(
            url.into(),
            Route::Payload {
                content_type: content_type.into(),
                body: body.into(),
            },
        );
        self
    }

    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.set_route(url.into(), Route::Status(status));
        self
    }

    /// Replace the body served for `url`, keeping the call count.
    pub fn replace_payload(&self, url: &str, content_type: &str, body: impl Into<Vec<u8>>) {
        self.set_route(
            url.to_string(),
            Route::Payload {
                content_type: content_type.to_string(),
                body: body.into(),
            },
        );
    }

    /// Number of fetches served so far, including failures.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_route(&self, url: String, route: Route) {
        let mut routes = match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        routes.insert(url, route);
    }

    fn route(&self, url: &str) -> Option<Route> {
        let routes = match self.routes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        routes.get(url).cloned()
    }
}

#[async_trait]
impl PayloadTransport for StaticTransport {
    async fn fetch_payload(&self, url: &str) -> Result<FetchedPayload, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.route(url) {
            Some(Route::Payload { content_type, body }) => Ok(FetchedPayload {
                status: 200,
                final_url: url.to_string(),
                content_type: content_type.to_ascii_lowercase(),
                body,
            }),
            Some(Route::Status(status)) => Err(TransportError::HttpStatus {
                status,
                url: url.to_string(),
            }),
            None => Err(TransportError::HttpStatus {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_routes_and_counts_calls() {
        let transport = StaticTransport::new()
            .with_payload("mem://tx", "Text/CSV", "permit_no\n1\n")
            .with_status("mem://la", 500);

        let ok = transport.fetch_payload("mem://tx").await.unwrap();
        assert_eq!(ok.content_type, "text/csv");
        assert_eq!(ok.body, b"permit_no\n1\n".to_vec());

        assert!(matches!(
            transport.fetch_payload("mem://la").await,
            Err(TransportError::HttpStatus { status: 500, .. })
        ));
        assert!(matches!(
            transport.fetch_payload("mem://nowhere").await,
            Err(TransportError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(transport.calls(), 3);
    }
}
