//! Verify URL building and path escaping against JSON test vectors stored in
//! `test-vectors/`.
//!
//! Vectors only cover the pure stages of the pipeline; nothing here touches
//! the network.

use std::collections::BTreeMap;

use httpclient_core::{escape_path, HttpClient, Method, RequestData};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Vectors<T> {
    cases: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct EscapeCase {
    name: String,
    input: String,
    expected: String,
}

#[derive(Debug, Deserialize)]
struct UrlCase {
    name: String,
    base_url: String,
    path: String,
    #[serde(default)]
    params: BTreeMap<String, Vec<String>>,
    full_url: Option<String>,
    expected_url: String,
}

#[test]
fn escape_test_vectors() {
    let raw = include_str!("../../test-vectors/escape.json");
    let vectors: Vectors<EscapeCase> = serde_json::from_str(raw).unwrap();

    for case in vectors.cases {
        assert_eq!(escape_path(&case.input), case.expected, "{}", case.name);
    }
}

#[test]
fn url_test_vectors() {
    let raw = include_str!("../../test-vectors/urls.json");
    let vectors: Vectors<UrlCase> = serde_json::from_str(raw).unwrap();

    for case in vectors.cases {
        let client = HttpClient::builder().base_url(case.base_url.as_str()).build().unwrap();

        let mut req = RequestData::new(Method::GET).path(case.path.as_str());
        req.params = case.params.clone();
        if let Some(full_url) = &case.full_url {
            req = req.full_url(full_url.as_str());
        }

        let built = client.build_request(&mut req).unwrap();
        assert_eq!(built.url, case.expected_url, "{}", case.name);
        assert_eq!(built.method, Method::GET, "{}", case.name);
        assert!(built.body.is_none(), "{}", case.name);
    }
}
