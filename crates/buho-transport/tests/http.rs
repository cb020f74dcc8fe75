//! Integration tests for `HttpTransport` against a throwaway local responder.
//!
//! Each test binds a TCP listener on a random port, answers exactly one
//! HTTP/1.1 request with a canned response, and hands back the raw request
//! text so the test can check what the client sent.

use buho_protocol::{LoginRequest, Method, Role};
use buho_transport::{ApiRequest, ApiTransport, HttpConfig, HttpTransport};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// =========================================================================
// Helpers
// =========================================================================

/// Serves one request, returning the API base URL and a handle resolving
/// to the raw request.
async fn serve_once(
    status_line: &'static str,
    body: String,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have local addr");

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("should accept");
        let request = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{body}",
            body.len()
        );
        socket
            .write_all(response.as_bytes())
            .await
            .expect("should write");
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{addr}/api"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.expect("should read");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn transport(base_url: String) -> HttpTransport {
    HttpTransport::new(HttpConfig {
        base_url,
        ..HttpConfig::default()
    })
    .expect("client should build")
}

// =========================================================================
// login()
// =========================================================================

#[tokio::test]
async fn test_login_success_returns_token_and_profile() {
    let body = json!({
        "success": true,
        "data": {
            "token": "header.payload.sig",
            "user": {
                "firstName": "Ana",
                "email": "ana@example.com",
                "role": "owner",
                "password": "should-not-survive"
            }
        }
    })
    .to_string();
    let (base, server) = serve_once("200 OK", body).await;

    let envelope = transport(base)
        .login(&LoginRequest {
            email: "ana@example.com".into(),
            password: "Secret#123".into(),
        })
        .await
        .expect("login should reach the server");

    let raw = server.await.expect("server task");
    assert!(raw.starts_with("POST /api/auth/login HTTP/1.1"));
    assert!(raw.contains("\"email\":\"ana@example.com\""));

    assert!(envelope.success);
    let data = envelope.data.expect("data");
    assert_eq!(data.token, "header.payload.sig");
    assert_eq!(data.user.role, Role::Owner);
}

#[tokio::test]
async fn test_login_rejected_returns_failure_envelope() {
    let body = json!({
        "success": false,
        "statusCode": 401,
        "error": "Credenciales incorrectas"
    })
    .to_string();
    let (base, _server) = serve_once("401 Unauthorized", body).await;

    let envelope = transport(base)
        .login(&LoginRequest {
            email: "ana@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .expect("a rejection is still a response");

    assert!(!envelope.success);
    assert_eq!(envelope.status_code, 401);
    assert_eq!(envelope.error.as_deref(), Some("Credenciales incorrectas"));
    assert!(envelope.data.is_none());
}

// =========================================================================
// logout() / send()
// =========================================================================

#[tokio::test]
async fn test_logout_sends_bearer_header() {
    let (base, server) =
        serve_once("200 OK", json!({ "success": true }).to_string()).await;

    transport(base)
        .logout("tok-123")
        .await
        .expect("logout should succeed");

    let raw = server.await.expect("server task").to_ascii_lowercase();
    assert!(raw.starts_with("post /api/auth/logout http/1.1"));
    assert!(raw.contains("authorization: bearer tok-123"));
}

#[tokio::test]
async fn test_send_non_json_error_becomes_failure_envelope() {
    let (base, _server) =
        serve_once("502 Bad Gateway", "upstream down".to_string()).await;

    let envelope = transport(base)
        .send(ApiRequest::new(Method::Get, "/restaurants"))
        .await
        .expect("an error status is still a response");

    assert!(!envelope.success);
    assert_eq!(envelope.status_code, 502);
}

#[tokio::test]
async fn test_send_unreachable_server_returns_request_error() {
    // Bind then drop to get a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = transport(format!("http://{addr}/api"))
        .send(ApiRequest::new(Method::Get, "/restaurants"))
        .await;

    assert!(result.is_err());
}
