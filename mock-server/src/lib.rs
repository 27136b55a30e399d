//! Fixture HTTP server for exercising the client pipeline over real sockets.
//!
//! # Design
//! Every route is stateless. Unknown paths fall through to `echo`, which
//! reports back what arrived on the wire (method, raw path, raw query,
//! headers, body) so tests can assert on exactly what the client sent.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const ITEM_XML: &str = "<item><id>7</id><name>widget</name><tags>a</tags><tags>b</tags></item>";

/// What `echo` saw of the incoming request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    /// Path exactly as sent, still percent-encoded.
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

/// Fixed payload served by `/json` and `/xml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
    pub tags: Vec<String>,
}

impl Item {
    pub fn sample() -> Self {
        Self {
            id: 7,
            name: "widget".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        }
    }
}

/// Summary of a received multipart file part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub field: String,
    pub file_name: Option<String>,
    pub content: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "ok\n" }))
        .route("/status/{code}", get(status).post(status))
        .route("/redirect-me", get(redirect_me))
        .route("/redirect", get(|| async { (StatusCode::CREATED, "ok\n") }))
        .route("/slow/{ms}", get(slow))
        .route("/json", get(|| async { Json(Item::sample()) }))
        .route("/json/truncated", get(truncated_json))
        .route("/xml", get(xml))
        .route("/xml/truncated", get(truncated_xml))
        .route("/upload", post(upload))
        .fallback(echo)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, &'static str), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, "fail\n"))
}

async fn redirect_me() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/redirect")])
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "ok\n"
}

async fn truncated_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], r#"{"id": 7, "name": "wid"#)
}

async fn xml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], ITEM_XML)
}

async fn truncated_xml() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], "<item><id>7</id><name>wid")
}

async fn upload(mut multipart: Multipart) -> Result<Json<Upload>, StatusCode> {
    let field = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
        .ok_or(StatusCode::BAD_REQUEST)?;

    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().map(str::to_string);
    let content = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(Json(Upload {
        field: name,
        file_name,
        content: String::from_utf8_lossy(&content).into_owned(),
    }))
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    debug!(%method, %uri, "echo");
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
