use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use job_capture::browser::{BrowserError, CdpBrowser, Probe, ScriptHost, TabId};
use job_capture::capture::{CaptureController, CaptureEvents, CaptureOutcome};
use job_capture::service_client::{ExtractionClient, PersistenceClient};

const FRAMES: [&str; 2] = ["top", "ad"];

/// How the fake page target answers.
#[derive(Clone, Copy)]
enum Page {
    /// Answers every call; evaluation throws in the listed frames.
    Answering { throwing: &'static [&'static str] },
    /// Completes the handshake, reads requests, never replies.
    Silent,
}

/// Serves one DevTools page target on a local WebSocket and returns its URL.
async fn spawn_page(page: Page) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();

        while let Some(Ok(message)) = socket.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Page::Answering { throwing } = page else {
                continue;
            };

            let request: Value = serde_json::from_str(&text).unwrap();
            let id = request["id"].as_u64().unwrap();
            let result = answer(&request, throwing);

            // Unrelated traffic ahead of the real reply.
            let event = json!({"method": "Page.frameNavigated", "params": {}});
            let stale = json!({"id": id + 1000, "result": {}});
            let reply = json!({"id": id, "result": result});
            for message in [event, stale, reply] {
                if socket.send(Message::Text(message.to_string())).await.is_err() {
                    return;
                }
            }
        }
    });

    format!("ws://{addr}/devtools/page/T1")
}

fn answer(request: &Value, throwing: &[&str]) -> Value {
    match request["method"].as_str().unwrap() {
        "Page.getFrameTree" => json!({
            "frameTree": {
                "frame": {"id": FRAMES[0]},
                "childFrames": [{"frame": {"id": FRAMES[1]}}]
            }
        }),
        "Page.createIsolatedWorld" => {
            let frame_id = request["params"]["frameId"].as_str().unwrap();
            let context = FRAMES.iter().position(|f| *f == frame_id).unwrap() + 1;
            json!({"executionContextId": context})
        }
        "Runtime.evaluate" => {
            let context = request["params"]["contextId"].as_u64().unwrap() as usize;
            let frame_id = FRAMES[context - 1];
            if throwing.contains(&frame_id) {
                json!({
                    "result": {"type": "object", "subtype": "error"},
                    "exceptionDetails": {"text": "Uncaught"}
                })
            } else {
                json!({"result": {"type": "string", "value": format!("<html>{frame_id}</html>")}})
            }
        }
        other => panic!("unexpected DevTools method {other}"),
    }
}

/// DevTools HTTP endpoint listing one page target backed by `page`.
async fn devtools(page: Page) -> MockServer {
    let ws_url = spawn_page(page).await;
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "T1",
            "type": "page",
            "url": "https://jobs.example.com/123",
            "webSocketDebuggerUrl": ws_url
        }])))
        .mount(&server)
        .await;
    server
}

fn browser(server: &MockServer) -> CdpBrowser {
    CdpBrowser::new(reqwest::Client::new(), &server.uri())
}

#[tokio::test]
async fn test_frames_come_back_top_document_first() {
    let server = devtools(Page::Answering { throwing: &[] }).await;

    let frames = browser(&server)
        .inject_and_collect(&TabId::new("T1"), Probe::DocumentMarkup)
        .await
        .unwrap();

    let collected: Vec<(&str, &Value)> = frames
        .iter()
        .map(|f| (f.frame_id.as_str(), &f.result))
        .collect();
    assert_eq!(
        collected,
        vec![
            ("top", &json!("<html>top</html>")),
            ("ad", &json!("<html>ad</html>")),
        ]
    );
}

#[tokio::test]
async fn test_throwing_sub_frame_is_skipped() {
    let server = devtools(Page::Answering { throwing: &["ad"] }).await;

    let frames = browser(&server)
        .inject_and_collect(&TabId::new("T1"), Probe::DocumentMarkup)
        .await
        .unwrap();

    let ids: Vec<&str> = frames.iter().map(|f| f.frame_id.as_str()).collect();
    assert_eq!(ids, vec!["top"]);
}

#[tokio::test]
async fn test_throwing_top_frame_fails() {
    let server = devtools(Page::Answering { throwing: &["top"] }).await;

    let result = browser(&server)
        .inject_and_collect(&TabId::new("T1"), Probe::DocumentMarkup)
        .await;

    match result {
        Err(BrowserError::ProbeException { frame_id, message }) => {
            assert_eq!(frame_id, "top");
            assert_eq!(message, "Uncaught");
        }
        other => panic!("expected an exception in the top frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unresponsive_page_times_out() {
    let server = devtools(Page::Silent).await;
    let browser = browser(&server).with_timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        browser.inject_and_collect(&TabId::new("T1"), Probe::DocumentMarkup),
    )
    .await
    .expect("call should give up on its own");

    assert!(
        matches!(result, Err(BrowserError::Timeout { ref operation, .. }) if operation == "Page.getFrameTree"),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_unresponsive_page_releases_the_busy_flag() {
    let server = devtools(Page::Silent).await;
    let services = MockServer::start().await;
    let browser = Arc::new(browser(&server).with_timeout(Duration::from_millis(200)));
    let http = reqwest::Client::new();
    let controller = CaptureController::new(
        browser.clone(),
        browser,
        Arc::new(ExtractionClient::new(http.clone(), &services.uri())),
        Arc::new(PersistenceClient::new(http, &services.uri())),
        Arc::new(CaptureEvents::new()),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.capture())
        .await
        .expect("capture should give up on its own");
    assert_eq!(outcome, CaptureOutcome::Failed);
    assert!(!controller.is_busy());

    // The silent page only accepted one connection, so this one fails too,
    // but it must run rather than be dropped as busy.
    let second = tokio::time::timeout(Duration::from_secs(5), controller.capture())
        .await
        .expect("capture should give up on its own");
    assert_eq!(second, CaptureOutcome::Failed);
    assert!(services.received_requests().await.unwrap_or_default().is_empty());
}
