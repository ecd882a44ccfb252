//! Integration tests for the conversation lifecycle: submit, resolve, clear.
//! Uses a minimal in-process HTTP server (no mocks).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use ragchat_cli::api::ApiClient;
use ragchat_cli::app::{App, ChatRole, InputMode, StatusLevel};
use ragchat_cli::config::Config;

fn content_length(headers: &str) -> usize {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let body_received = buf.len() - (header_end + 4);
            if body_received >= content_length(&headers) {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

async fn write_response(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
}

/// Serve exactly one request, sending the captured request text back through
/// the returned channel.
async fn spawn_server(
    status: &'static str,
    body: &'static str,
) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        write_response(&mut stream, status, body).await;
        let _ = tx.send(request);
    });
    (format!("http://{}", addr), rx)
}

fn app_for(url: &str) -> App {
    let client = ApiClient::new(url, 0, Duration::from_millis(1));
    App::new(&Config::default(), client)
}

/// Poll until the in-flight query resolves, as the event loop would.
async fn resolve_query(app: &mut App) {
    for _ in 0..200 {
        app.poll_query_task().await;
        if !app.loading {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("query did not resolve in time");
}

#[tokio::test]
async fn welcome_message_is_seeded() {
    let app = app_for("http://127.0.0.1:1");

    assert_eq!(app.messages.len(), 1);
    assert_eq!(app.messages[0].role, ChatRole::Assistant);
    assert_eq!(app.messages[0].ordinal, 0);
    assert_eq!(app.message_count, 0);
}

#[tokio::test]
async fn submit_appends_one_user_and_one_result_message() {
    // No server listening: the query surfaces a transport error
    let mut app = app_for("http://127.0.0.1:1");
    app.input = "  What is MongoDB?  ".to_string();

    app.submit_query();

    assert_eq!(app.messages.len(), 2);
    assert_eq!(app.messages[1].role, ChatRole::User);
    assert_eq!(app.messages[1].content, "What is MongoDB?");
    assert_eq!(app.messages[1].ordinal, 1);
    assert!(app.loading);
    assert!(app.input.is_empty());

    resolve_query(&mut app).await;

    assert_eq!(app.messages.len(), 3);
    assert_eq!(app.messages[2].role, ChatRole::Error);
    assert!(app.messages[2].content.starts_with("Failed to get answer:"));
    assert!(!app.loading);
    assert_eq!(app.status_level, StatusLevel::Error);
}

#[tokio::test]
async fn submit_while_busy_is_a_noop() {
    let mut app = app_for("http://127.0.0.1:1");
    app.input = "first".to_string();
    app.submit_query();
    assert_eq!(app.messages.len(), 2);

    app.input = "second".to_string();
    app.submit_query();

    assert_eq!(app.messages.len(), 2, "busy submission must not append");
    assert_eq!(app.input, "second", "busy submission must not consume input");

    resolve_query(&mut app).await;
}

#[tokio::test]
async fn blank_input_is_a_noop() {
    let mut app = app_for("http://127.0.0.1:1");
    app.input = "   ".to_string();

    app.submit_query();

    assert_eq!(app.messages.len(), 1);
    assert!(!app.loading);
    assert!(app.query_task.is_none());
}

#[tokio::test]
async fn query_success_roundtrip() {
    let (url, request_rx) = spawn_server("200 OK", r#"{"answer":"A document database."}"#).await;
    let mut app = app_for(&url);
    app.input = "What is MongoDB?".to_string();

    app.submit_query();
    resolve_query(&mut app).await;

    let last = app.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, "A document database.");
    assert_eq!(app.status_level, StatusLevel::Ready);
    assert_eq!(app.input_mode, InputMode::Editing);

    let request = request_rx.await.unwrap();
    assert!(request.starts_with("POST /query"));
    assert!(request.contains(r#""query":"What is MongoDB?""#));
    assert!(request.contains(r#""use_rerank":true"#));
    assert!(request.contains(&app.session_id), "memory on sends the session id");
}

#[tokio::test]
async fn memory_off_sends_null_session() {
    let (url, request_rx) = spawn_server("200 OK", r#"{"answer":"ok"}"#).await;
    let mut app = app_for(&url);
    app.use_memory = false;
    app.input = "no memory please".to_string();

    app.submit_query();
    resolve_query(&mut app).await;

    let request = request_rx.await.unwrap();
    assert!(request.contains(r#""session_id":null"#));
}

#[tokio::test]
async fn http_error_status_surfaces_in_transcript() {
    let (url, _request_rx) = spawn_server("500 Internal Server Error", "{}").await;
    let mut app = app_for(&url);
    app.input = "boom".to_string();

    app.submit_query();
    resolve_query(&mut app).await;

    let last = app.messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Error);
    assert!(last.content.contains("500"), "error must carry the status code");
    assert!(!app.loading, "input must be re-enabled after an error");
    assert_eq!(app.input_mode, InputMode::Editing);
}

#[tokio::test]
async fn clear_keeps_welcome_and_resets_counter() {
    let mut app = app_for("http://127.0.0.1:1");
    app.use_memory = false;
    for i in 0..5 {
        app.push_message(ChatRole::User, format!("message {i}"));
    }
    assert_eq!(app.messages.len(), 6);
    assert_eq!(app.message_count, 5);

    app.clear_conversation();

    assert_eq!(app.messages.len(), 1);
    assert_eq!(app.messages[0].content, ragchat_cli::app::WELCOME_MESSAGE);
    assert_eq!(app.message_count, 0);

    // The counter restarts after a clear
    app.push_message(ChatRole::User, "fresh start".to_string());
    assert_eq!(app.messages[1].ordinal, 1);
}

#[tokio::test]
async fn clear_with_memory_fires_history_delete() {
    let (url, request_rx) = spawn_server("200 OK", "{}").await;
    let mut app = app_for(&url);
    app.push_message(ChatRole::User, "hello".to_string());

    app.clear_conversation();

    // The transcript is cleared immediately, without waiting on the server
    assert_eq!(app.messages.len(), 1);

    let request = tokio::time::timeout(Duration::from_secs(2), request_rx)
        .await
        .expect("history delete should be sent")
        .unwrap();
    assert!(request.starts_with(&format!("DELETE /history/{}", app.session_id)));
}

#[tokio::test]
async fn clear_survives_unreachable_server() {
    // Best-effort: the history delete failing must not disturb the clear
    let mut app = app_for("http://127.0.0.1:1");
    app.push_message(ChatRole::User, "hello".to_string());

    app.clear_conversation();

    assert_eq!(app.messages.len(), 1);
    assert_eq!(app.message_count, 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn ordinals_are_strictly_increasing() {
    let mut app = app_for("http://127.0.0.1:1");
    app.push_message(ChatRole::User, "one".to_string());
    app.push_message(ChatRole::Assistant, "two".to_string());
    app.push_message(ChatRole::Error, "three".to_string());

    let ordinals: Vec<usize> = app.messages.iter().map(|m| m.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2, 3]);
    assert_eq!(app.message_count, 3);
}
