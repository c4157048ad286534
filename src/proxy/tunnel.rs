//! Opaque tunneling for encrypted sessions (HTTP CONNECT).
//!
//! A CONNECT request bypasses the dispatch pipeline entirely: the proxy
//! never inspects tunneled bytes, it only moves them. The flow is:
//!
//! 1. Client sends `CONNECT origin.example:443 HTTP/1.1`
//! 2. Proxy dials the target over TCP; a dial failure yields 503 and no
//!    tunnel is ever established
//! 3. Proxy answers `200 Connection Established` and takes exclusive
//!    control of the client transport via HTTP upgrade, a one-time,
//!    irreversible step after which the normal response path is unusable
//! 4. Bytes are relayed in both directions concurrently until either side
//!    ends its stream, which tears down the whole session
//!
//! No idle timeout is enforced: a silent session persists until one peer
//! closes.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::body::Incoming;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::dispatch::{empty_body, status_response};
use super::error::ProxyError;
use crate::eventlog::{EventLog, ProxyEvent};

/// Handle an HTTP CONNECT request by establishing an opaque tunnel.
///
/// The upstream dial happens *before* the success response so a dead
/// origin never yields a half-open tunnel. On success the relay runs in a
/// spawned task for as long as the session lives; this handler returns
/// the `200 Connection Established` response immediately.
pub async fn handle_connect(
    req: Request<Incoming>,
    events: Arc<EventLog>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, ProxyError> {
    // Extract the target host:port from the CONNECT authority
    let Some(authority) = req.uri().authority() else {
        debug!("Rejecting CONNECT without authority");
        return Ok(status_response(
            StatusCode::BAD_REQUEST,
            "Invalid CONNECT target",
        ));
    };
    let target = authority.to_string();

    let (host, port) = match parse_host_port(&target) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Rejecting CONNECT to {}: {}", target, e);
            return Ok(status_response(StatusCode::BAD_REQUEST, &e.to_string()));
        }
    };

    // Raw transport takeover must be available before we promise a tunnel
    if req.extensions().get::<OnUpgrade>().is_none() {
        warn!("Connection takeover unavailable for CONNECT to {}", target);
        events.log(ProxyEvent::TunnelFailed {
            target,
            message: "connection takeover not supported".to_string(),
        });
        return Ok(status_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Connection takeover not supported",
        ));
    }

    // Dial the origin first (fail fast, no tunnel on failure)
    let upstream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Upstream dial failed for {}:{}: {}", host, port, e);
            events.log(ProxyEvent::TunnelFailed {
                target,
                message: e.to_string(),
            });
            return Ok(status_response(
                StatusCode::SERVICE_UNAVAILABLE,
                &e.to_string(),
            ));
        }
    };

    debug!("Starting tunnel to {}:{}", host, port);

    // The relay runs after the 200 response completes the upgrade
    tokio::spawn(async move {
        match hyper::upgrade::on(req).await {
            Ok(upgraded) => relay(upgraded, upstream, &target).await,
            Err(e) => {
                warn!("HTTP upgrade failed for {}: {}", target, e);
                events.log(ProxyEvent::TunnelFailed {
                    target,
                    message: e.to_string(),
                });
            }
        }
    });

    // 200 Connection Established initiates the upgrade
    Ok(Response::new(empty_body()))
}

/// Relay bytes between the upgraded client connection and the origin.
///
/// Both copy directions run concurrently. When either direction ends
/// (EOF or error) the session is over: both connections are dropped,
/// which unblocks the peer's pending read within one round trip.
async fn relay(upgraded: Upgraded, upstream: TcpStream, target: &str) {
    let client = TokioIo::new(upgraded);
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = upstream.into_split();

    let client_to_upstream = async { tokio::io::copy(&mut client_read, &mut upstream_write).await };
    let upstream_to_client = async { tokio::io::copy(&mut upstream_read, &mut client_write).await };

    tokio::select! {
        result = client_to_upstream => {
            if let Err(e) = result {
                debug!("client->origin copy ended for {}: {}", target, e);
            }
        }
        result = upstream_to_client => {
            if let Err(e) = result {
                debug!("origin->client copy ended for {}: {}", target, e);
            }
        }
    }

    debug!("Tunnel closed for {}", target);
}

/// Parse a `host:port` string from a CONNECT authority.
///
/// Examples:
/// - `origin.example:443` -> ("origin.example", 443)
/// - `origin.example` -> ("origin.example", 443) (default port)
/// - `[::1]:8443` -> ("::1", 8443)
fn parse_host_port(authority: &str) -> Result<(String, u16), ProxyError> {
    if let Some((host, port_str)) = authority.rsplit_once(':') {
        if host.starts_with('[') && host.ends_with(']') {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| ProxyError::InvalidTarget(format!("invalid port: {}", port_str)))?;
            let ipv6_host = &host[1..host.len() - 1];
            return Ok((ipv6_host.to_string(), port));
        }

        let port = port_str
            .parse::<u16>()
            .map_err(|_| ProxyError::InvalidTarget(format!("invalid port: {}", port_str)))?;
        Ok((host.to_string(), port))
    } else {
        // No port specified, default to 443 for CONNECT
        Ok((authority.to_string(), 443))
    }
}
