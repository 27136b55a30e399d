//! End-to-end pipeline tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `HttpClient` over
//! real HTTP with the default ureq transport. Most checks go through the
//! server's echo fallback, which reports what actually arrived on the wire.

use std::io::Cursor;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use httpclient_core::{
    is_invalid_status_code, Error, HeaderValue, HttpClient, HttpClientBuilder, Method, RequestData,
};
use mock_server::{Echo, Item, Upload};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename = "payload")]
struct Payload {
    key: String,
}

fn payload() -> Payload {
    Payload {
        key: "value".to_string(),
    }
}

/// Start the mock server on a random port and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client(addr: SocketAddr) -> HttpClient {
    HttpClient::builder()
        .base_url(format!("http://{addr}"))
        .build()
        .unwrap()
}

// --- URLs ---

#[test]
fn full_url_get() {
    let addr = start_server();
    let mut body = Vec::new();
    HttpClient::new()
        .request(
            RequestData::new(Method::GET)
                .full_url(format!("http://{addr}/"))
                .expect_status([200])
                .bytes_response(&mut body),
        )
        .unwrap();
    assert_eq!(body, b"ok\n");
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let err = HttpClient::new()
        .request(RequestData::get("").full_url("http://127.0.0.1:1/"))
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got {err:?}");
}

#[test]
fn invalid_full_url_is_rejected_before_sending() {
    let err = HttpClient::new()
        .request(RequestData::get("").full_url("not a url"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)), "got {err:?}");
}

#[test]
fn path_is_escaped_and_joined_to_base_path() {
    let addr = start_server();
    let client = HttpClient::builder()
        .base_url(format!("http://{addr}/api/"))
        .build()
        .unwrap();

    let mut echo = Echo::default();
    client
        .request(RequestData::get("foo+bar baz").json_response(&mut echo))
        .unwrap();
    assert_eq!(echo.path, "/api/foo%2bbar%20baz");
    assert_eq!(echo.query, None);
}

#[test]
fn params_are_sorted_and_encoded() {
    let addr = start_server();
    let mut echo = Echo::default();
    client(addr)
        .request(
            RequestData::get("/search")
                .param("b", "2")
                .param("a", "1")
                .param("a", "x y&z")
                .json_response(&mut echo),
        )
        .unwrap();
    assert_eq!(echo.query.as_deref(), Some("a=1&a=x+y%26z&b=2"));
}

// --- headers ---

#[test]
fn default_and_request_headers_are_sent() {
    let addr = start_server();
    let client = HttpClient::builder()
        .base_url(format!("http://{addr}"))
        .header("x-default", HeaderValue::from_static("client"))
        .header("x-shared", HeaderValue::from_static("client"))
        .build()
        .unwrap();

    let mut echo = Echo::default();
    client
        .request(
            RequestData::get("/headers")
                .header("x-shared", HeaderValue::from_static("request"))
                .json_response(&mut echo),
        )
        .unwrap();

    assert_eq!(echo.headers["x-default"], vec!["client"]);
    assert_eq!(echo.headers["x-shared"], vec!["request"]);
    assert_eq!(echo.headers["accept"], vec!["application/json"]);
}

// --- request bodies ---

#[test]
fn reader_body_is_sent_verbatim() {
    let addr = start_server();
    let mut echo = Echo::default();
    client(addr)
        .request(
            RequestData::post("/raw")
                .body_reader(Cursor::new(b"raw bytes".to_vec()))
                .json_response(&mut echo),
        )
        .unwrap();

    assert_eq!(echo.method, "POST");
    assert_eq!(echo.body, "raw bytes");
    assert!(!echo.headers.contains_key("content-type"));
}

#[test]
fn json_body_sets_content_type() {
    let addr = start_server();
    let value = payload();
    let mut echo = Echo::default();
    client(addr)
        .request(RequestData::put("/json-body").json(&value).json_response(&mut echo))
        .unwrap();

    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.body, r#"{"key":"value"}"#);
    assert_eq!(echo.headers["content-type"], vec!["application/json"]);
}

#[test]
fn xml_body_carries_declaration() {
    let addr = start_server();
    let value = payload();
    let mut echo = Echo::default();
    client(addr)
        .request(RequestData::post("/xml-body").xml(&value).json_response(&mut echo))
        .unwrap();

    assert_eq!(
        echo.body,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<payload><key>value</key></payload>"
    );
    assert_eq!(echo.headers["content-type"], vec!["application/xml"]);
}

#[test]
fn value_without_encoding_fails_before_sending() {
    let value = payload();
    let mut req = RequestData::post("/never");
    req.req_value = Some(&value);

    // No server: reaching the network would surface as a transport error.
    let client = HttpClient::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    let err = client.request(req).unwrap_err();
    assert!(matches!(err, Error::InvalidEncoding(ref tag) if tag.is_empty()), "got {err:?}");
}

// --- statuses and redirects ---

#[test]
fn expected_status_passes() {
    let addr = start_server();
    let response = client(addr)
        .request(RequestData::get("/status/202").expect_status([200, 202]).consume_response())
        .unwrap();
    assert_eq!(response.status, 202);
}

#[test]
fn unexpected_status_carries_response_details() {
    let addr = start_server();
    let err = client(addr)
        .request(RequestData::get("/status/404").expect_status([200]))
        .unwrap_err();

    let status = err.as_invalid_status().unwrap();
    assert_eq!(status.got, 404);
    assert_eq!(status.expected, vec![200]);
    assert_eq!(status.content, "fail\n");
    assert!(is_invalid_status_code(&err, 404));
    assert!(!is_invalid_status_code(&err, 500));
}

#[test]
fn redirects_are_followed_by_default() {
    let addr = start_server();
    let mut body = Vec::new();
    let response = client(addr)
        .request(RequestData::get("/redirect-me").expect_status([201]).bytes_response(&mut body))
        .unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(body, b"ok\n");
}

#[test]
fn redirects_can_be_ignored() {
    let addr = start_server();
    let response = client(addr)
        .request(
            RequestData::get("/redirect-me")
                .ignore_redirects()
                .expect_status([301])
                .consume_response(),
        )
        .unwrap();
    assert_eq!(response.status, 301);
    assert_eq!(response.headers["location"], "/redirect");
}

// --- response bodies ---

#[test]
fn json_response_is_decoded() {
    let addr = start_server();
    let mut item = Item {
        id: 0,
        name: String::new(),
        tags: Vec::new(),
    };
    let response = client(addr)
        .request(RequestData::get("/json").json_response(&mut item))
        .unwrap();
    assert_eq!(item, Item::sample());
    assert!(response.body.is_closed());
}

#[test]
fn xml_response_is_decoded() {
    let addr = start_server();
    let mut item = Item {
        id: 0,
        name: String::new(),
        tags: Vec::new(),
    };
    client(addr)
        .request(RequestData::get("/xml").xml_response(&mut item))
        .unwrap();
    assert_eq!(item, Item::sample());
}

#[test]
fn truncated_json_is_an_unmarshal_error() {
    let addr = start_server();
    let mut item = Item::sample();
    let err = client(addr)
        .request(RequestData::get("/json/truncated").json_response(&mut item))
        .unwrap_err();
    assert!(matches!(err, Error::Unmarshal(_)), "got {err:?}");
}

#[test]
fn truncated_xml_is_an_unmarshal_error() {
    let addr = start_server();
    let mut item = Item::sample();
    let err = client(addr)
        .request(RequestData::get("/xml/truncated").xml_response(&mut item))
        .unwrap_err();
    assert!(matches!(err, Error::Unmarshal(_)), "got {err:?}");
}

#[test]
fn unhandled_body_is_left_open() {
    let addr = start_server();
    let mut response = client(addr).request(RequestData::get("/")).unwrap();
    assert!(!response.body.is_closed());
    assert_eq!(response.body.read_all().unwrap(), b"ok\n");
}

#[test]
fn consumed_body_is_closed() {
    let addr = start_server();
    let mut response = client(addr)
        .request(RequestData::get("/").consume_response())
        .unwrap();
    assert!(response.body.is_closed());
    assert!(response.body.read_all().is_err());
}

// --- upload ---

#[test]
fn file_upload_reaches_server() {
    let addr = start_server();
    let mut upload = Upload {
        field: String::new(),
        file_name: None,
        content: String::new(),
    };
    client(addr)
        .request(
            RequestData::post("/upload")
                .upload_file("document", "report.txt", Cursor::new(b"quarterly numbers".to_vec()))
                .unwrap()
                .expect_status([200])
                .json_response(&mut upload),
        )
        .unwrap();

    assert_eq!(upload.field, "document");
    assert_eq!(upload.file_name.as_deref(), Some("report.txt"));
    assert_eq!(upload.content, "quarterly numbers");
}

// --- rate gate ---

#[test]
fn rate_gate_times_out_while_slot_is_busy() {
    let addr = start_server();
    let client = HttpClientBuilder::new()
        .base_url(format!("http://{addr}"))
        .rate_limit(1, Duration::from_millis(50))
        .build()
        .unwrap();

    let slow = {
        let client = client.clone();
        thread::spawn(move || client.request(RequestData::get("/slow/500").consume_response()))
    };
    thread::sleep(Duration::from_millis(150));

    let err = client.request(RequestData::get("/")).unwrap_err();
    assert!(err.is_rate_limit_timeout(), "got {err:?}");

    slow.join().unwrap().unwrap();
    assert_eq!(client.rate_gate().unwrap().available(), 1);
    client.request(RequestData::get("/").consume_response()).unwrap();
}

// --- post hooks ---

#[test]
fn post_hook_can_abort_request() {
    let addr = start_server();
    let client = HttpClient::builder()
        .base_url(format!("http://{addr}"))
        .post_hook(503, |_req, _resp| Err("service unavailable".into()))
        .build()
        .unwrap();

    let err = client
        .request(RequestData::get("/status/503").expect_status([200]))
        .unwrap_err();
    assert!(matches!(err, Error::Hook(_)), "got {err:?}");
    assert_eq!(err.to_string(), "service unavailable");
}

#[test]
fn post_hook_can_rewrite_response() {
    let addr = start_server();
    let client = HttpClient::builder()
        .base_url(format!("http://{addr}"))
        .post_hook(404, |_req, resp| {
            resp.status = 200;
            Ok(())
        })
        .build()
        .unwrap();

    let response = client
        .request(RequestData::get("/status/404").expect_status([200]).consume_response())
        .unwrap();
    assert_eq!(response.status, 200);
}
