//! Response capture and replay.
//!
//! An origin response body is a one-shot stream: it can be read exactly
//! once. To serve the same response to the current client *and* to future
//! clients from the cache, the response is materialized into a
//! [`ResponseSnapshot`] first (status, version, and headers copied by
//! value, body fully buffered into an immutable [`Bytes`] buffer) and
//! every consumer is then served from the snapshot. `Bytes` clones are
//! reference-counted views with no shared read cursor, so concurrent
//! replays of one snapshot never interfere.

use bytes::{BufMut, Bytes, BytesMut};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Body;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode, Version};
use thiserror::Error;

/// Errors produced while materializing an origin response.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The origin body could not be read to completion.
    ///
    /// Carries whatever was read before the failure so the pipeline can
    /// forward the partial response to the current client. Nothing is
    /// cached from a failed capture.
    #[error("failed to read origin body: {message}")]
    BodyRead {
        /// The underlying read error.
        message: String,
        /// Snapshot holding the bytes read before the failure.
        partial: ResponseSnapshot,
    },
}

/// An independently replayable copy of an origin response.
///
/// Created once per cache miss after the full body has been buffered.
/// Never mutated afterwards; shared between the forward path and the cache
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseSnapshot {
    /// Materialize a live response into a snapshot.
    ///
    /// Reads the one-shot body stream fully into memory, frame by frame.
    /// On a mid-stream failure the returned error carries the partial
    /// snapshot (origin status and headers, plus the bytes read so far).
    ///
    /// Generic over the body type so tests can feed buffered bodies.
    pub async fn capture<B>(response: Response<B>) -> Result<Self, CaptureError>
    where
        B: Body + Unpin,
        B::Error: std::fmt::Display,
    {
        let (parts, mut body) = response.into_parts();

        let mut buf = BytesMut::new();
        let mut failure = None;
        while let Some(frame) = body.frame().await {
            match frame {
                Ok(frame) => {
                    if let Ok(data) = frame.into_data() {
                        buf.put(data);
                    }
                }
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let snapshot = Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body: buf.freeze(),
        };

        match failure {
            Some(message) => Err(CaptureError::BodyRead {
                message,
                partial: snapshot,
            }),
            None => Ok(snapshot),
        }
    }

    /// Build a fresh response replaying this snapshot.
    ///
    /// Each call produces an independent body over the shared buffer, so
    /// any number of concurrent callers can replay the same snapshot.
    pub fn to_response(&self) -> Response<BoxBody<Bytes, hyper::Error>> {
        let body = Full::new(self.body.clone())
            .map_err(|never| match never {})
            .boxed();

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers.clone();
        response
    }

    /// The captured status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The captured protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The captured headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The buffered body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Length of the buffered body in bytes.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::Frame;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn origin_response(body: &'static [u8]) -> Response<Full<Bytes>> {
        Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "text/plain")
            .header("X-Origin", "test")
            .body(Full::new(Bytes::from_static(body)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_capture_copies_everything_by_value() {
        let snapshot = ResponseSnapshot::capture(origin_response(b"hello world"))
            .await
            .unwrap();

        assert_eq!(snapshot.status(), StatusCode::OK);
        assert_eq!(snapshot.body().as_ref(), b"hello world");
        assert_eq!(snapshot.content_length(), 11);
        assert_eq!(snapshot.headers()["X-Origin"], "test");
    }

    #[tokio::test]
    async fn test_replays_are_independent() {
        let snapshot = ResponseSnapshot::capture(origin_response(b"shared bytes"))
            .await
            .unwrap();

        // Two replays from the same snapshot; each gets the full body
        let first = snapshot.to_response();
        let second = snapshot.to_response();

        let first_body = first.into_body().collect().await.unwrap().to_bytes();
        let second_body = second.into_body().collect().await.unwrap().to_bytes();

        assert_eq!(first_body.as_ref(), b"shared bytes");
        assert_eq!(second_body.as_ref(), b"shared bytes");
    }

    #[tokio::test]
    async fn test_replay_preserves_status_and_headers() {
        let origin = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/html")
            .body(Full::new(Bytes::from_static(b"gone")))
            .unwrap();

        let snapshot = ResponseSnapshot::capture(origin).await.unwrap();
        let replay = snapshot.to_response();

        assert_eq!(replay.status(), StatusCode::NOT_FOUND);
        assert_eq!(replay.headers()["Content-Type"], "text/html");
    }

    /// Body that yields one data frame and then fails.
    struct FailingBody {
        sent: bool,
    }

    impl Body for FailingBody {
        type Data = Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            let this = self.get_mut();
            if !this.sent {
                this.sent = true;
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"partial")))))
            } else {
                Poll::Ready(Some(Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ))))
            }
        }
    }

    #[tokio::test]
    async fn test_capture_failure_keeps_partial_bytes() {
        let response = Response::builder()
            .status(StatusCode::OK)
            .body(FailingBody { sent: false })
            .unwrap();

        let err = ResponseSnapshot::capture(response).await.unwrap_err();
        let CaptureError::BodyRead { message, partial } = err;

        assert!(message.contains("connection reset"));
        assert_eq!(partial.body().as_ref(), b"partial");
        assert_eq!(partial.status(), StatusCode::OK);
    }
}
