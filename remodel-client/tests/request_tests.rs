use chrono::{NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use remodel_client::{ClientConfig, Method, Request, build_url};
use remodel_model::{FieldValue, Query, QueryValue, ResponseKeys};
use serde_json::json;

// ── URL building ────────────────────────────────────────────────

#[test]
fn endpoint_only() {
    assert_eq!(build_url("http://api.test/", "users", None, None, &[]), "http://api.test/users");
}

#[test]
fn key_and_action_segments() {
    let key = FieldValue::Int(42);
    assert_eq!(
        build_url("http://api.test", "/v2/users/", Some(&key), Some("activate"), &[]),
        "http://api.test/v2/users/42/activate"
    );
}

#[test]
fn key_is_percent_encoded() {
    let key = FieldValue::from("a b/c");
    assert_eq!(
        build_url("http://api.test", "files", Some(&key), None, &[]),
        "http://api.test/files/a%20b%2Fc"
    );
}

#[test]
fn query_values_are_encoded_except_dates() {
    let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 15, 30).unwrap();
    let query = vec![
        ("q".to_string(), QueryValue::from("rock & roll")),
        ("since".to_string(), QueryValue::from(day)),
        ("after".to_string(), QueryValue::from(at)),
        ("active".to_string(), QueryValue::from(true)),
    ];
    assert_eq!(
        build_url("http://api.test", "songs", None, None, &query),
        "http://api.test/songs?q=rock%20%26%20roll&since=2024-03-09&after=2024-03-09T08:15:30.000Z&active=true"
    );
}

#[test]
fn pagination_parameters_follow_filters() {
    let query = Query::new().param("tag", "rust").next_page();
    assert_eq!(
        build_url("http://api.test", "posts", None, None, &query.pairs()),
        "http://api.test/posts?tag=rust&limit=20&offset=20"
    );
}

// ── Requests ────────────────────────────────────────────────────

#[test]
fn request_carries_json_content_type() {
    let request = Request::new(Method::Post, "http://api.test/users").body(json!({"a": 1}));
    assert_eq!(request.header("Content-Type"), Some("application/json"));
    assert_eq!(request.header("Authorization"), None);
    assert_eq!(request.body, Some(json!({"a": 1})));
}

#[test]
fn delete_never_sends_a_body() {
    let request = Request::new(Method::Delete, "http://api.test/users/1").body(json!({"a": 1}));
    assert_eq!(request.body, None);
}

#[test]
fn method_names() {
    let names: Vec<&str> = [Method::Get, Method::Post, Method::Put, Method::Patch, Method::Delete]
        .into_iter()
        .map(Method::as_str)
        .collect();
    assert_eq!(names, vec!["GET", "POST", "PUT", "PATCH", "DELETE"]);
}

// ── Config ──────────────────────────────────────────────────────

#[test]
fn client_config_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.timeout_ms, 20_000);
    assert_eq!(config.page_limit, 20);
    assert_eq!(config.response_keys, ResponseKeys::default());
    assert_eq!(config.timeout().as_secs(), 20);
}

#[test]
fn client_config_partial_json() {
    let config: ClientConfig = serde_json::from_value(json!({
        "base_url": "https://api.example.com",
        "response_keys": {"results_key": "data"}
    }))
    .unwrap();
    assert_eq!(config.base_url, "https://api.example.com");
    assert_eq!(config.response_keys.results_key, "data");
    assert_eq!(config.response_keys.count_key, "count");
    assert_eq!(config.timeout_ms, 20_000);
}
