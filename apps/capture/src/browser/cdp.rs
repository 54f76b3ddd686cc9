//! Chrome DevTools Protocol host.
//!
//! Requires a Chromium instance started with `--remote-debugging-port`.
//! Tabs are listed over HTTP (`/json/list`); probes run over the target's
//! WebSocket, one isolated world per frame so page scripts cannot observe
//! or tamper with the probe.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::browser::{
    BrowserError, BrowserTab, FrameResult, Probe, ScriptHost, TabAccessor, TabId,
};

const WORLD_NAME: &str = "job-capture-probe";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Pages that belong to the browser or an extension, never a job posting.
const INTERNAL_SCHEMES: [&str; 2] = ["devtools://", "chrome-extension://"];

/// A DevTools target as reported by `/json/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    id: String,
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    url: String,
    web_socket_debugger_url: Option<String>,
}

#[derive(Clone)]
pub struct CdpBrowser {
    http: Client,
    devtools_url: String,
    timeout: Duration,
}

impl CdpBrowser {
    pub fn new(http: Client, devtools_url: &str) -> Self {
        Self {
            http,
            devtools_url: devtools_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bounds the WebSocket connect and every protocol round trip.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn targets(&self) -> Result<Vec<TargetInfo>, BrowserError> {
        let targets = self
            .http
            .get(format!("{}/json/list", self.devtools_url))
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<TargetInfo>>()
            .await?;
        Ok(targets)
    }
}

/// Chromium lists page targets most-recently-activated first.
fn active_page(targets: &[TargetInfo]) -> Option<&TargetInfo> {
    targets.iter().find(|t| {
        t.target_type == "page" && !INTERNAL_SCHEMES.iter().any(|s| t.url.starts_with(s))
    })
}

#[async_trait]
impl TabAccessor for CdpBrowser {
    async fn current_tab(&self) -> Result<BrowserTab, BrowserError> {
        let targets = self.targets().await?;
        let page = active_page(&targets).ok_or(BrowserError::NoActiveTab)?;
        Ok(BrowserTab {
            id: TabId::new(page.id.clone()),
            url: page.url.clone(),
        })
    }
}

#[async_trait]
impl ScriptHost for CdpBrowser {
    async fn inject_and_collect(
        &self,
        tab: &TabId,
        probe: Probe,
    ) -> Result<Vec<FrameResult>, BrowserError> {
        let target = self
            .targets()
            .await?
            .into_iter()
            .find(|t| t.id == tab.as_str())
            .ok_or_else(|| BrowserError::TabGone(tab.clone()))?;
        let ws_url = target.web_socket_debugger_url.ok_or_else(|| {
            BrowserError::Protocol(format!("tab {tab} is attached to another DevTools client"))
        })?;

        let mut session = CdpSession::connect(&ws_url, self.timeout).await?;
        let tree = session.call("Page.getFrameTree", json!({})).await?;
        let frame_ids = frame_ids_preorder(&tree["frameTree"]);
        debug!(tab = %tab, frames = frame_ids.len(), "Injecting probe");

        let mut results = Vec::with_capacity(frame_ids.len());
        for (index, frame_id) in frame_ids.into_iter().enumerate() {
            let evaluated = session.evaluate_in_frame(&frame_id, probe).await;
            match evaluated {
                Ok(result) => results.push(FrameResult { frame_id, result }),
                // Only the top document is load-bearing.
                Err(e) if index > 0 => warn!(frame_id = %frame_id, "Skipping frame: {e}"),
                Err(e) => {
                    session.close().await;
                    return Err(e);
                }
            }
        }

        session.close().await;
        Ok(results)
    }
}

/// Frame ids of a `Page.getFrameTree` result, parents before children.
fn frame_ids_preorder(node: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = node["frame"]["id"].as_str() {
        ids.push(id.to_string());
    }
    if let Some(children) = node["childFrames"].as_array() {
        for child in children {
            ids.extend(frame_ids_preorder(child));
        }
    }
    ids
}

/// One WebSocket connection to a page target with request/response
/// correlation by message id. Events are skipped.
struct CdpSession {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    timeout: Duration,
}

impl CdpSession {
    async fn connect(ws_url: &str, timeout: Duration) -> Result<Self, BrowserError> {
        let (socket, _) = bounded(timeout, "connect", connect_async(ws_url)).await??;
        Ok(Self {
            socket,
            next_id: 0,
            timeout,
        })
    }

    async fn call(&mut self, method: &str, params: Value) -> Result<Value, BrowserError> {
        let timeout = self.timeout;
        bounded(timeout, method, self.round_trip(method, params)).await?
    }

    async fn round_trip(&mut self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.next_id += 1;
        let id = self.next_id;
        let request = json!({ "id": id, "method": method, "params": params });
        self.socket.send(Message::Text(request.to_string())).await?;

        while let Some(message) = self.socket.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let reply: Value = serde_json::from_str(&text)?;
            if reply["id"].as_u64() != Some(id) {
                continue;
            }
            if let Some(error) = reply.get("error") {
                let message = error["message"].as_str().unwrap_or("unknown error");
                return Err(BrowserError::Protocol(format!("{method}: {message}")));
            }
            return Ok(reply.get("result").cloned().unwrap_or(Value::Null));
        }

        Err(BrowserError::Protocol(format!(
            "{method}: connection closed before reply"
        )))
    }

    async fn evaluate_in_frame(
        &mut self,
        frame_id: &str,
        probe: Probe,
    ) -> Result<Value, BrowserError> {
        let world = self
            .call(
                "Page.createIsolatedWorld",
                json!({ "frameId": frame_id, "worldName": WORLD_NAME }),
            )
            .await?;
        let context_id = world["executionContextId"].as_i64().ok_or_else(|| {
            BrowserError::Protocol(format!("no execution context for frame {frame_id}"))
        })?;

        let evaluated = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": probe.expression(),
                    "contextId": context_id,
                    "returnByValue": true,
                }),
            )
            .await?;
        if let Some(details) = evaluated.get("exceptionDetails") {
            return Err(BrowserError::ProbeException {
                frame_id: frame_id.to_string(),
                message: details["text"].as_str().unwrap_or("exception").to_string(),
            });
        }
        Ok(evaluated["result"]["value"].clone())
    }

    async fn close(mut self) {
        match tokio::time::timeout(self.timeout, self.socket.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("DevTools socket close failed: {e}"),
            Err(_) => debug!("DevTools socket close timed out"),
        }
    }
}

async fn bounded<F: Future>(
    timeout: Duration,
    operation: &str,
    future: F,
) -> Result<F::Output, BrowserError> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| BrowserError::Timeout {
            operation: operation.to_string(),
            after: timeout,
        })
}
