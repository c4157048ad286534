//! Per-request dispatch pipeline.
//!
//! Every plain (non-CONNECT) request flows through the same decision
//! sequence:
//!
//! 1. Validate: the request line must carry an absolute-form target URL
//!    (a proxy cannot forward an origin-form request), otherwise 400,
//!    before any blocklist or cache work.
//! 2. Block check: a host matching the blocklist yields 403 and a
//!    blocked-request event; nothing else happens.
//! 3. Cache check: a hit replays the stored snapshot verbatim.
//! 4. Miss: forward the original request unmodified to the origin. A
//!    dial/fetch failure yields 503 and is never cached.
//! 5. Capture the origin response (fully buffering the one-shot body),
//!    store the snapshot under the URL key, and serve the client from the
//!    stored snapshot. If the body read fails mid-stream, the partial
//!    bytes are forwarded and the store step is skipped.
//!
//! Origin headers are copied verbatim in both directions; there is no
//! header allow/deny list.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, info, warn};

use super::error::ProxyError;
use crate::blocklist::Blocklist;
use crate::cache::{CaptureError, ResponseCache, ResponseSnapshot};
use crate::eventlog::{EventLog, ProxyEvent};

/// Handle a plain HTTP proxy request.
///
/// Generic over the request body so tests can feed buffered bodies; the
/// server passes `hyper::body::Incoming`.
pub async fn handle_http<B>(
    req: Request<B>,
    blocklist: Arc<Blocklist>,
    cache: Arc<ResponseCache>,
    events: Arc<EventLog>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, ProxyError>
where
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let target = req.uri().clone();

    // Validate: an absolute-form target carries a host
    let Some(host) = target.host() else {
        debug!("Rejecting request without absolute target: {}", target);
        return Ok(status_response(StatusCode::BAD_REQUEST, "Invalid URL"));
    };

    // Block check
    if blocklist.is_blocked(host) {
        info!("Blocked request to: {}", target);
        events.log(ProxyEvent::Blocked {
            url: target.to_string(),
        });
        return Ok(status_response(
            StatusCode::FORBIDDEN,
            "Access to this URL is blocked",
        ));
    }

    debug!("Received request for {}", target);

    // Cache check; the key is the raw target URL
    let key = target.to_string();
    if let Some(snapshot) = cache.lookup(&key) {
        info!("Serving cached response for: {}", key);
        return Ok(snapshot.to_response());
    }

    // Cache miss: forward to the origin
    let response = match forward_request(req).await {
        Ok(response) => response,
        Err(ProxyError::UpstreamConnect { addr, message }) => {
            warn!("Upstream fetch failed for {}: {}", key, message);
            events.log(ProxyEvent::UpstreamUnavailable {
                url: key,
                message: message.clone(),
            });
            return Ok(status_response(StatusCode::SERVICE_UNAVAILABLE, &message));
        }
        Err(e) => return Err(e),
    };

    debug!("Response status: {}", response.status());

    // Materialize the one-shot body, store, then serve the stored snapshot
    match ResponseSnapshot::capture(response).await {
        Ok(snapshot) => {
            let stored = cache.store(key, snapshot);
            Ok(stored.to_response())
        }
        Err(CaptureError::BodyRead { message, partial }) => {
            warn!("Origin body read failed for {}: {}", key, message);
            events.log(ProxyEvent::CaptureFailed { url: key, message });
            // Forward what was read; a broken entry is never cached
            Ok(partial.to_response())
        }
    }
}

/// Forward a request to its origin server.
///
/// The request is sent unmodified (method, headers, body). All client
/// errors surface as [`ProxyError::UpstreamConnect`]; the legacy client
/// does not distinguish dial failures from other transport errors.
async fn forward_request<B>(req: Request<B>) -> Result<Response<hyper::body::Incoming>, ProxyError>
where
    B: hyper::body::Body + Send + Unpin + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    use hyper_util::client::legacy::Client;
    use hyper_util::rt::TokioExecutor;

    let addr = req
        .uri()
        .authority()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "upstream".to_string());

    let client: Client<_, B> = Client::builder(TokioExecutor::new()).build_http();

    client
        .request(req)
        .await
        .map_err(|e| ProxyError::UpstreamConnect {
            addr,
            message: e.to_string(),
        })
}

/// Create an empty response body.
pub(crate) fn empty_body() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// Create a response body with content.
pub(crate) fn full_body(content: String) -> BoxBody<Bytes, hyper::Error> {
    Full::new(Bytes::from(content))
        .map_err(|never| match never {})
        .boxed()
}

/// Create a plain-text response with the given status.
pub(crate) fn status_response(
    status: StatusCode,
    message: &str,
) -> Response<BoxBody<Bytes, hyper::Error>> {
    use hyper::header::{HeaderValue, CONTENT_TYPE};

    let mut response = Response::new(full_body(message.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn deps(
        blocked: Vec<&str>,
    ) -> (Arc<Blocklist>, Arc<ResponseCache>, Arc<EventLog>) {
        let blocklist = Arc::new(Blocklist::new(
            blocked.into_iter().map(String::from).collect(),
        ));
        let cache = Arc::new(ResponseCache::new());
        let events = Arc::new(EventLog::new_null());
        (blocklist, cache, events)
    }

    #[tokio::test]
    async fn test_origin_form_target_yields_400_without_cache_work() {
        let (blocklist, cache, events) = deps(vec![]);

        let response = handle_http(request("/no-host"), blocklist, cache.clone(), events)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_blocked_host_yields_403_and_logs_event() {
        let dir = tempfile::tempdir().unwrap();
        let (blocklist, cache, _) = deps(vec!["blocked.example"]);
        let events = Arc::new(EventLog::new(dir.path().to_path_buf()));

        let response = handle_http(
            request("http://blocked.example/secret"),
            blocklist,
            cache.clone(),
            events,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        // The blocked request never reaches the cache
        assert!(cache.is_empty());

        let log = std::fs::read_to_string(dir.path().join(crate::eventlog::BLOCKED_LOG_FILE))
            .unwrap();
        assert!(log.contains("http://blocked.example/secret"));
    }

    #[tokio::test]
    async fn test_cache_hit_served_without_origin() {
        let (blocklist, cache, events) = deps(vec![]);

        // Pre-populate the cache under the exact URL key; the pipeline must
        // serve this without any network activity (the host is unroutable).
        let origin = Response::builder()
            .status(StatusCode::OK)
            .header("X-Cached", "yes")
            .body(Full::new(Bytes::from_static(b"cached bytes")))
            .unwrap();
        let snapshot = ResponseSnapshot::capture(origin).await.unwrap();
        cache.store("http://origin.invalid/resource".to_string(), snapshot);

        let response = handle_http(
            request("http://origin.invalid/resource"),
            blocklist,
            cache,
            events,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["X-Cached"], "yes");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), b"cached bytes");
    }

    #[tokio::test]
    async fn test_unreachable_origin_yields_503_and_is_not_cached() {
        let (blocklist, cache, events) = deps(vec![]);

        // Port 1 on loopback is never listening; the dial fails fast
        let response = handle_http(
            request("http://127.0.0.1:1/resource"),
            blocklist,
            cache.clone(),
            events,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_status_response_shape() {
        let response = status_response(StatusCode::FORBIDDEN, "nope");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["Content-Type"], "text/plain");
    }
}
