#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
#![deny(missing_docs, unused_must_use)]

//! HTTP front door for the support assistant.
//!
//! Routes:
//! - `GET /` chat page
//! - `GET /health` liveness check
//! - `POST /api/chat` (also `/chat`) `{"message": .., "history": ..}` -> `{"reply": ..}`
//!
//! Each request runs on its own thread; the service is shared through an `Arc`.

use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use assistant::{ChatService, Generator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

/// Largest request body accepted, in bytes.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Why a request body was rejected before routing.
#[derive(Debug)]
pub enum BodyError {
    /// more than the allowed number of bytes
    TooLarge,
    /// read failure or invalid UTF-8
    Unreadable(String),
}

/// Read at most `limit` bytes of UTF-8 from `reader`.
pub fn read_body(reader: impl Read, limit: u64) -> Result<String, BodyError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| BodyError::Unreadable(e.to_string()))?;
    if bytes.len() as u64 > limit {
        return Err(BodyError::TooLarge);
    }
    String::from_utf8(bytes).map_err(|e| BodyError::Unreadable(e.to_string()))
}

/// Body of a chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// new user message
    #[serde(alias = "prompt")]
    pub message: String,
    /// conversation so far, in any shape the history normalizer accepts
    #[serde(default)]
    pub history: Option<Value>,
}

/// Body of a successful chat response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// assistant reply
    pub reply: String,
}

/// Transport-independent response produced by [`route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status code
    pub status: u16,
    /// value of the `Content-Type` header
    pub content_type: &'static str,
    /// response body
    pub body: String,
}

impl Reply {
    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
        }
    }

    fn json(status: u16, value: &impl Serialize) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                error!(error = %e, "failed to serialize response");
                Self::text(500, "Internal Server Error")
            }
        }
    }
}

/// Map one request onto a reply. Pure apart from the model call.
pub fn route<G: Generator>(service: &ChatService<G>, method: &Method, url: &str, body: &str) -> Reply {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    match (method, path) {
        (Method::Get, "/") | (Method::Get, "/index.html") => Reply {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: ui::render_page(),
        },
        (Method::Get, "/health") => Reply::text(200, "OK"),
        (Method::Post, "/api/chat") | (Method::Post, "/chat") => chat(service, body),
        (Method::Options, _) => Reply::text(204, ""),
        _ => Reply::text(404, "Not Found"),
    }
}

fn chat<G: Generator>(service: &ChatService<G>, body: &str) -> Reply {
    let request = match serde_json::from_str::<ChatRequest>(body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "rejecting chat request");
            return Reply::text(400, "Bad Request");
        }
    };
    match service.respond(&request.message, request.history.as_ref()) {
        Ok(reply) => Reply::json(200, &ChatResponse { reply }),
        Err(e) => {
            error!(error = %e, "generation failed");
            Reply::json(500, &serde_json::json!({ "error": "generation failed" }))
        }
    }
}

/// Bind `addr` and serve requests until the process is stopped.
pub fn serve<G>(service: Arc<ChatService<G>>, addr: &str) -> anyhow::Result<()>
where
    G: Generator + Send + Sync + 'static,
{
    let server = Server::http(addr).map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    info!(%addr, "chat UI listening on http://{addr}");

    for request in server.incoming_requests() {
        let service = Arc::clone(&service);
        thread::spawn(move || handle(&service, request));
    }
    Ok(())
}

fn handle<G: Generator>(service: &ChatService<G>, mut request: Request) {
    let started = Instant::now();
    let reply = match read_body(request.as_reader(), MAX_BODY_BYTES) {
        Ok(body) => route(service, request.method(), request.url(), &body),
        Err(BodyError::TooLarge) => {
            debug!(limit = MAX_BODY_BYTES, "request body too large");
            Reply::text(413, "Payload Too Large")
        }
        Err(BodyError::Unreadable(e)) => {
            debug!(error = %e, "unreadable request body");
            Reply::text(400, "Bad Request")
        }
    };
    info!(
        method = %request.method(),
        url = %request.url(),
        status = reply.status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    respond(request, reply);
}

fn respond(request: Request, reply: Reply) {
    let mut response = Response::from_string(reply.body).with_status_code(StatusCode(reply.status));
    let headers = [
        ("Content-Type", reply.content_type),
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Headers", "Content-Type"),
    ];
    for (name, value) in headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to send response");
    }
}
