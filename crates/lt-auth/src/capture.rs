use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{AuthError, Result};

/// Capability: hand an authorization URL to the user's browser
#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &Url) -> Result<()>;
}

/// Browser opener that does nothing
///
/// For tests and for callers that surface the URL through their own UI.
#[derive(Debug, Clone, Default)]
pub struct NullBrowserOpener;

#[async_trait]
impl BrowserOpener for NullBrowserOpener {
    async fn open(&self, url: &Url) -> Result<()> {
        debug!("Skipping browser launch for {url}");
        Ok(())
    }
}

/// Capability: block until the OAuth redirect arrives and yield its query string
#[async_trait]
pub trait CodeListener: Send + Sync {
    async fn capture_query(&self) -> Result<String>;
}

/// Code listener that returns a fixed query string (tests)
#[derive(Debug, Clone)]
pub struct StaticCodeListener {
    query: String,
}

impl StaticCodeListener {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

#[async_trait]
impl CodeListener for StaticCodeListener {
    async fn capture_query(&self) -> Result<String> {
        Ok(self.query.clone())
    }
}

/// Loopback HTTP listener that captures the OAuth redirect
///
/// Binds on the redirect URI's host and port, serves exactly one redirect
/// request, and releases the socket in every exit path. Requests for other
/// routes (browsers probe for favicons) get a 404 and the wait continues.
pub struct LoopbackListener {
    listener: TcpListener,
    route: String,
    timeout: Duration,
}

impl LoopbackListener {
    /// Bind on `redirect_uri` and wait up to `timeout` for the redirect
    pub async fn bind(redirect_uri: &Url, timeout: Duration) -> Result<Self> {
        let host = redirect_uri.host_str().unwrap_or("127.0.0.1");
        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        let addr = format!("{host}:{port}");

        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "Redirect listener bound");

        let route = match redirect_uri.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        Ok(Self {
            listener,
            route,
            timeout,
        })
    }

    /// Address the listener is actually bound to (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    async fn accept_redirect(&self) -> Result<String> {
        loop {
            let (mut socket, peer) = self.listener.accept().await?;
            debug!(%peer, "Redirect listener accepted connection");

            match handle_connection(&mut socket, &self.route).await {
                Ok(Some(query)) => return Ok(query),
                Ok(None) => continue,
                Err(e) => {
                    warn!("Error handling redirect connection: {e}");
                    continue;
                }
            }
        }
    }
}

#[async_trait]
impl CodeListener for LoopbackListener {
    async fn capture_query(&self) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.accept_redirect()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::AuthorizationTimeout),
        }
    }
}

/// Serve one request; `Some(query)` when it hit the redirect route
async fn handle_connection(socket: &mut TcpStream, route: &str) -> Result<Option<String>> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Request line: GET /callback?code=... HTTP/1.1
    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(None);
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let target = request_line[4..path_end].trim();

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    if path != route {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(None);
    }

    send_response(&mut writer, 200, "OK", REDIRECT_PAGE).await?;
    Ok(Some(query.to_string()))
}

async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

const REDIRECT_PAGE: &str = "<!DOCTYPE html>\
<html><head><title>lantern-mc</title></head>\
<body style=\"font-family: system-ui; text-align: center; padding: 50px;\">\
<h1>Sign-in complete</h1>\
<p>You can close this window and return to the launcher.</p>\
</body></html>";

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn send_request(addr: SocketAddr, target: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn bind_test_listener(timeout: Duration) -> LoopbackListener {
        let redirect_uri = Url::parse("http://127.0.0.1:0/callback").unwrap();
        LoopbackListener::bind(&redirect_uri, timeout).await.unwrap()
    }

    #[tokio::test]
    async fn captures_query_of_first_redirect_request() {
        let listener = bind_test_listener(Duration::from_secs(5)).await;
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            send_request(addr, "/callback?code=abc123&state=xyz").await
        });

        let query = listener.capture_query().await.unwrap();
        assert_eq!(query, "code=abc123&state=xyz");

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn ignores_requests_for_other_routes() {
        let listener = bind_test_listener(Duration::from_secs(5)).await;
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let favicon = send_request(addr, "/favicon.ico").await;
            let redirect = send_request(addr, "/callback?code=later").await;
            (favicon, redirect)
        });

        let query = listener.capture_query().await.unwrap();
        assert_eq!(query, "code=later");

        let (favicon, redirect) = client.await.unwrap();
        assert!(favicon.starts_with("HTTP/1.1 404"));
        assert!(redirect.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn empty_query_is_returned_as_empty_string() {
        let listener = bind_test_listener(Duration::from_secs(5)).await;
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move { send_request(addr, "/callback").await });

        let query = listener.capture_query().await.unwrap();
        assert_eq!(query, "");
    }

    #[tokio::test]
    async fn times_out_when_no_redirect_arrives() {
        let listener = bind_test_listener(Duration::from_millis(50)).await;

        let result = listener.capture_query().await;
        assert!(matches!(result, Err(AuthError::AuthorizationTimeout)));
    }

    #[tokio::test]
    async fn static_listener_returns_fixed_query() {
        let listener = StaticCodeListener::new("code=fixed");
        assert_eq!(listener.capture_query().await.unwrap(), "code=fixed");
    }
}
