//! One-shot loopback listener for the OAuth redirect.
//!
//! The listener resolves on the first request to the redirect path that
//! carries the expected `state`, whether or not it also carries a code, and
//! is dropped afterwards. Other paths (the browser's favicon probe) get a 404
//! and are not counted. Each connection is read on its own task so an idle
//! preconnect cannot hold up the real redirect.

use std::{collections::HashMap, time::Duration};

use log::{debug, warn};
use reqwest::Url;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinSet,
};

use crate::error::AuthError;

/// How long a browser connection may take to send its request line and headers.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_HTML: &str = "<html><body><h1>Authorization successful!</h1><p>You can close this window.</p></body></html>";
const EXCHANGE_FAILED_HTML: &str =
    "<html><body><h1>Error retrieving access token.</h1></body></html>";
const MISSING_CODE_HTML: &str =
    "<html><body><h1>Authorization code not found.</h1></body></html>";
const DENIED_HTML: &str =
    "<html><body><h1>Authorization was denied.</h1><p>You can close this window.</p></body></html>";
const STATE_MISMATCH_HTML: &str =
    "<html><body><h1>Authorization state did not match.</h1></body></html>";
const NOT_FOUND_HTML: &str = "<html><body><h1>Not found</h1></body></html>";

/// Loopback listener bound on IPv4 and, when available, IPv6 so that
/// `localhost` resolves to it either way.
#[derive(Debug)]
pub struct CallbackListener {
    port: u16,
    listener_v4: TcpListener,
    listener_v6: Option<TcpListener>,
}

/// A callback that carried a code. The browser is kept waiting until
/// [`PendingCallback::finish`] reports how the exchange went.
#[derive(Debug)]
pub struct PendingCallback {
    code: String,
    socket: TcpStream,
}

impl CallbackListener {
    pub async fn bind(port: u16) -> Result<CallbackListener, AuthError> {
        let listener_v4 = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|source| AuthError::Listener { port, source })?;
        let port = listener_v4
            .local_addr()
            .map_err(|source| AuthError::Listener { port, source })?
            .port();
        let listener_v6 = match TcpListener::bind(("::1", port)).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                debug!("IPv6 loopback unavailable on port {port}: {e}");
                None
            }
        };

        Ok(CallbackListener {
            port,
            listener_v4,
            listener_v6,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the redirect to `path` carrying `expected_state` and
    /// consumes the listener. Redirects with any other state are answered
    /// and ignored.
    pub async fn accept_callback(
        self,
        path: &str,
        expected_state: &str,
    ) -> Result<PendingCallback, AuthError> {
        let mut reads = JoinSet::new();
        loop {
            let (mut socket, target) = tokio::select! {
                accepted = self.accept() => {
                    let socket = accepted.map_err(AuthError::Callback)?;
                    reads.spawn(read_request(socket, REQUEST_READ_TIMEOUT));
                    continue;
                }
                Some(joined) = reads.join_next() => match joined {
                    Ok((socket, Some(target))) => (socket, target),
                    _ => continue,
                },
            };

            let Some((request_path, params)) = parse_target(&target) else {
                respond(&mut socket, "400 Bad Request", NOT_FOUND_HTML).await;
                continue;
            };
            if request_path != path {
                respond(&mut socket, "404 Not Found", NOT_FOUND_HTML).await;
                continue;
            }
            if params.get("state").map(String::as_str) != Some(expected_state) {
                warn!("Ignoring authorization redirect with an unexpected state");
                respond(&mut socket, "400 Bad Request", STATE_MISMATCH_HTML).await;
                continue;
            }

            if let Some(code) = params.get("code") {
                return Ok(PendingCallback {
                    code: code.clone(),
                    socket,
                });
            }
            if let Some(error) = params.get("error") {
                respond(&mut socket, "400 Bad Request", DENIED_HTML).await;
                return Err(AuthError::Denied(error.clone()));
            }
            respond(&mut socket, "400 Bad Request", MISSING_CODE_HTML).await;
            return Err(AuthError::MissingCode);
        }
    }
    async fn accept(&self) -> std::io::Result<TcpStream> {
        let (socket, _) = match &self.listener_v6 {
            Some(v6) => {
                tokio::select! {
                    result = self.listener_v4.accept() => result?,
                    result = v6.accept() => result?,
                }
            }
            None => self.listener_v4.accept().await?,
        };
        Ok(socket)
    }
}

impl PendingCallback {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub async fn finish(mut self, exchanged: bool) {
        if exchanged {
            respond(&mut self.socket, "200 OK", SUCCESS_HTML).await;
        } else {
            respond(&mut self.socket, "500 Internal Server Error", EXCHANGE_FAILED_HTML).await;
        }
    }
}

/// Reads one request under a deadline. The target is `None` when the
/// connection sent nothing usable in time.
async fn read_request(mut socket: TcpStream, read_timeout: Duration) -> (TcpStream, Option<String>) {
    let target = match tokio::time::timeout(read_timeout, read_request_target(&mut socket)).await {
        Ok(Ok(target)) => target,
        Ok(Err(e)) => {
            debug!("dropping unreadable callback connection: {e}");
            None
        }
        Err(_) => {
            debug!("dropping callback connection that sent no request within {read_timeout:?}");
            None
        }
    };
    (socket, target)
}

/// Reads the request line and drains the headers, returning the target.
async fn read_request_target(socket: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(socket);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

fn parse_target(target: &str) -> Option<(String, HashMap<String, String>)> {
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
    let params = url.query_pairs().into_owned().collect();
    Some((url.path().to_string(), params))
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        debug!("could not answer callback request: {e}");
    }
    let _ = socket.shutdown().await;
}
