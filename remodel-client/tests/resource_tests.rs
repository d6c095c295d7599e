use async_trait::async_trait;
use pretty_assertions::assert_eq;
use remodel_client::{
    ChannelSink, Client, ClientConfig, ClientError, ClientResult, Method, Request, Response,
    StaticToken, Transport,
};
use remodel_model::{
    Collection, Entity, Event, FetchFailure, FieldSpec, FieldValue, Operation, Phase, Query,
    QueryValue, ScalarType, Schema, SchemaCompiler, SchemaConfig, ValidSpec,
};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

// ── Helpers ─────────────────────────────────────────────────────

/// Records every request and answers from a queue (204 when empty).
#[derive(Default)]
struct StubTransport {
    requests: Mutex<Vec<Request>>,
    responses: Mutex<VecDeque<ClientResult<Response>>>,
}

impl StubTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn respond(&self, status: u16, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(Response::new(status, Some(body))));
    }

    fn fail(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(ClientError::Transport(message.to_string())));
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: Request) -> ClientResult<Response> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Response::new(204, None)))
    }
}

/// Never answers.
struct PendingTransport;

#[async_trait]
impl Transport for PendingTransport {
    async fn send(&self, _request: Request) -> ClientResult<Response> {
        std::future::pending().await
    }
}

fn users() -> Arc<Schema> {
    SchemaCompiler::default()
        .compile(
            "users",
            [
                ("id", FieldSpec::scalar(ScalarType::Identifier).primary_key()),
                ("email", FieldSpec::scalar(ScalarType::Email)),
                ("name", FieldSpec::scalar(ScalarType::Text)),
            ],
        )
        .unwrap()
}

fn private_notes() -> Arc<Schema> {
    SchemaCompiler::default()
        .with_config(SchemaConfig::default().endpoint("me/notes").requires_auth())
        .compile(
            "notes",
            [
                ("id", FieldSpec::scalar(ScalarType::Integer).primary_key()),
                ("body", FieldSpec::scalar(ScalarType::Text)),
            ],
        )
        .unwrap()
}

fn client(transport: Arc<dyn Transport>) -> (Client, UnboundedReceiver<Event>) {
    let mut client = Client::new(ClientConfig::new("http://api.test"), transport);
    let (sink, rx) = ChannelSink::new();
    client.subscribe(Arc::new(sink));
    (client, rx)
}

fn fetch_failure(rx: &mut UnboundedReceiver<Event>) -> FetchFailure {
    match rx.try_recv().expect("an event") {
        Event::FetchFailed(failure) => failure,
        other => panic!("unexpected event {other:?}"),
    }
}

fn page(start: i64, len: i64) -> Vec<Value> {
    (start..start + len)
        .map(|n| json!({"id": format!("u-{n}"), "email": format!("u{n}@example.com"), "name": format!("User {n}")}))
        .collect()
}

// ── Registration ────────────────────────────────────────────────

#[test]
fn auth_schema_requires_token_provider() {
    let (client, _rx) = client(StubTransport::new());
    let err = client.resource(private_notes()).unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));

    let client = client.with_token_provider(Arc::new(StaticToken::new("t")));
    assert!(client.resource(private_notes()).is_ok());
}

// ── Fetch ───────────────────────────────────────────────────────

#[tokio::test]
async fn get_mutates_entity_in_place() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"id": "u-1", "email": "ada@example.com", "name": "Ada"}));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    let phase = users.get(&mut user).await;

    assert_eq!(phase, Phase::Success);
    assert_eq!(user.get("name"), Some(&FieldValue::from("Ada")));
    assert!(!user.is_new());
    let lifecycle = user.lifecycle();
    assert!(lifecycle.fetch.success);
    assert!(!lifecycle.fetch.in_progress);
    assert!(lifecycle.fetched_once);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(requests[0].url, "http://api.test/users/u-1");
    assert_eq!(requests[0].body, None);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn get_by_key_returns_fetched_entity() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"id": "u-9", "email": "grace@example.com", "name": "Grace"}));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let user = users.get_by_key("u-9").await;
    assert_eq!(user.get("email"), Some(&FieldValue::from("grace@example.com")));
    assert_eq!(user.lifecycle().phase(Operation::Fetch), Phase::Success);
}

#[tokio::test]
async fn collection_pages_accumulate() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"count": 50, "results": page(0, 20)}));
    transport.respond(200, json!({"count": 50, "results": page(20, 20)}));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut all = Collection::new(users.schema().clone());
    assert_eq!(users.get_collection(&mut all, Query::new()).await, Phase::Success);
    assert_eq!(all.len(), 20);
    assert_eq!(all.total_count(), 50);
    assert!(all.has_more());

    assert_eq!(users.get_more(&mut all).await, Phase::Success);
    assert_eq!(all.len(), 40);
    assert_eq!(all.total_count(), 50);
    assert!(all.has_more());

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "http://api.test/users?limit=20&offset=0",
            "http://api.test/users?limit=20&offset=20",
        ]
    );
}

#[tokio::test]
async fn failed_page_is_retried_at_same_offset() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"count": 60, "results": page(0, 20)}));
    transport.respond(500, json!({"detail": "try again"}));
    transport.respond(200, json!({"count": 60, "results": page(20, 20)}));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut all = Collection::new(users.schema().clone());
    users.get_collection(&mut all, Query::new()).await;
    assert_eq!(users.get_more(&mut all).await, Phase::Failure);
    assert_eq!(fetch_failure(&mut rx).status, Some(500));
    assert_eq!(all.query().unwrap().offset, 0);

    assert_eq!(users.get_more(&mut all).await, Phase::Success);
    assert_eq!(all.len(), 40);
    assert!(all.exists("u-20"));

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "http://api.test/users?limit=20&offset=0",
            "http://api.test/users?limit=20&offset=20",
            "http://api.test/users?limit=20&offset=20",
        ]
    );
}

#[tokio::test]
async fn failed_first_query_is_not_remembered() {
    let transport = StubTransport::new();
    transport.fail("connection reset");
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut all = Collection::new(users.schema().clone());
    let query = Query::new().limit(5).param("name", "Ada");
    assert_eq!(users.get_collection(&mut all, query).await, Phase::Failure);
    assert!(all.query().is_none());
}

#[tokio::test]
async fn get_more_without_previous_query_starts_after_loaded_items() {
    let transport = StubTransport::new();
    transport.respond(200, json!(page(2, 1)));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut all = Collection::from_wire_items(users.schema().clone(), page(0, 2), Some(3), false).unwrap();
    users.get_more(&mut all).await;

    assert_eq!(transport.requests()[0].url, "http://api.test/users?limit=20&offset=2");
    assert_eq!(all.len(), 3);
    assert_eq!(all.total_count(), 3);
}

#[tokio::test]
async fn fetched_once_survives_later_failure() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"id": "u-1", "email": "ada@example.com", "name": "Ada"}));
    transport.fail("connection reset");
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    users.get(&mut user).await;
    assert_eq!(users.get(&mut user).await, Phase::Failure);

    let lifecycle = user.lifecycle();
    assert!(lifecycle.fetch.failure);
    assert!(!lifecycle.fetch.success);
    assert!(lifecycle.fetched_once);
    assert_eq!(user.get("name"), Some(&FieldValue::from("Ada")));

    let failure = fetch_failure(&mut rx);
    assert_eq!(failure.message, "transport failed: connection reset");
    assert_eq!(failure.status, None);
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transport_that_never_answers_times_out() {
    let (client, mut rx) = client(Arc::new(PendingTransport));
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    let phase = users.get(&mut user).await;

    assert_eq!(phase, Phase::Failure);
    assert!(user.lifecycle().fetch.failure);
    assert!(!user.lifecycle().fetch.in_progress);

    let failure = fetch_failure(&mut rx);
    assert_eq!(failure.operation, Operation::Fetch);
    assert!(failure.message.contains("timed out"));
}

#[tokio::test]
async fn non_success_status_is_a_failure_with_body() {
    let transport = StubTransport::new();
    transport.respond(404, json!({"detail": "not found"}));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-404");
    assert_eq!(users.get(&mut user).await, Phase::Failure);
    assert!(!user.lifecycle().fetched_once);

    let failure = fetch_failure(&mut rx);
    assert_eq!(failure.schema, "users");
    assert_eq!(failure.method, "GET");
    assert_eq!(failure.url, "http://api.test/users/u-404");
    assert_eq!(failure.status, Some(404));
    assert_eq!(failure.body, Some(json!({"detail": "not found"})));
}

#[tokio::test]
async fn malformed_success_payload_is_a_failure() {
    let transport = StubTransport::new();
    transport.respond(200, json!(["not", "an", "object"]));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    assert_eq!(users.get(&mut user).await, Phase::Failure);
    assert!(fetch_failure(&mut rx).message.starts_with("model error"));
}

#[tokio::test]
async fn foreign_entity_is_rejected_without_request() {
    let transport = StubTransport::new();
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut note = Entity::new(private_notes());
    assert_eq!(users.get(&mut note).await, Phase::Failure);
    assert!(transport.requests().is_empty());
    assert!(fetch_failure(&mut rx).message.contains("schema mismatch"));
}

// ── Authorization ───────────────────────────────────────────────

#[tokio::test]
async fn bearer_token_is_attached() {
    let transport = StubTransport::new();
    transport.respond(200, json!([]));
    let (client, _rx) = client(transport.clone());
    let client = client.with_token_provider(Arc::new(StaticToken::new("secret")));
    let notes = client.resource(private_notes()).unwrap();

    let mut mine = Collection::new(notes.schema().clone());
    assert_eq!(notes.get_collection(&mut mine, Query::new().limit(5)).await, Phase::Success);

    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://api.test/me/notes?limit=5&offset=0");
    assert_eq!(request.header("Authorization"), Some("Bearer secret"));
}

#[tokio::test]
async fn missing_token_fails_without_request() {
    let transport = StubTransport::new();
    let (client, mut rx) = client(transport.clone());
    let client = client.with_token_provider(Arc::new(StaticToken::none()));
    let notes = client.resource(private_notes()).unwrap();

    let mut note = Entity::with_primary_key(notes.schema().clone(), 1i64);
    assert_eq!(notes.get(&mut note).await, Phase::Failure);
    assert!(transport.requests().is_empty());
    assert!(fetch_failure(&mut rx).message.contains("no credentials"));
}

#[tokio::test]
async fn empty_token_counts_as_missing() {
    let transport = StubTransport::new();
    let (client, _rx) = client(transport.clone());
    let client = client.with_token_provider(Arc::new(StaticToken::new("")));
    let notes = client.resource(private_notes()).unwrap();

    let mut note = Entity::with_primary_key(notes.schema().clone(), 1i64);
    assert_eq!(notes.get(&mut note).await, Phase::Failure);
    assert!(transport.requests().is_empty());
}

// ── Save ────────────────────────────────────────────────────────

#[tokio::test]
async fn save_creates_then_updates() {
    let transport = StubTransport::new();
    transport.respond(201, json!({"id": "srv-1", "email": "ada@example.com", "name": "Ada"}));
    transport.respond(200, json!({"id": "srv-1", "name": "Ada L."}));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::build(
        users.schema().clone(),
        [("id", "local-1"), ("email", "ada@example.com"), ("name", "Ada")],
    );
    assert!(user.valid(&[ValidSpec::field("email"), ValidSpec::field("name")], client.observers()).is_valid);

    assert_eq!(users.save(&mut user).await, Phase::Success);
    assert!(!user.is_new());
    assert_eq!(user.primary_key(), &FieldValue::from("srv-1"));
    assert!(user.lifecycle().save.success);
    assert!(!user.lifecycle().fetched_once);

    user.set("name", "Ada L.");
    assert_eq!(users.save(&mut user).await, Phase::Success);
    assert_eq!(user.get("email"), Some(&FieldValue::from("ada@example.com")));

    let requests = transport.requests();
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].url, "http://api.test/users");
    assert_eq!(
        requests[0].body,
        Some(json!({"id": "local-1", "email": "ada@example.com", "name": "Ada"}))
    );
    assert_eq!(requests[1].method, Method::Patch);
    assert_eq!(requests[1].url, "http://api.test/users/srv-1");
    assert_eq!(
        requests[1].body,
        Some(json!({"id": "srv-1", "email": "ada@example.com", "name": "Ada L."}))
    );
}

#[tokio::test]
async fn invalid_fields_are_left_out_of_the_payload() {
    let transport = StubTransport::new();
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::build(users.schema().clone(), [("id", "u-1"), ("email", ""), ("name", "Ada")]);
    let result = user.valid(&[ValidSpec::field("email"), ValidSpec::field("name")], client.observers());
    assert!(!result.is_valid);
    assert!(matches!(rx.try_recv(), Ok(Event::ValidationFailed(_))));

    users.replace(&mut user).await;
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.body, Some(json!({"id": "u-1", "name": "Ada"})));
}

#[tokio::test]
async fn create_without_body_still_marks_persisted() {
    let transport = StubTransport::new();
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::new(users.schema().clone());
    assert_eq!(users.create(&mut user).await, Phase::Success);
    assert!(!user.is_new());
}

#[tokio::test]
async fn destroy_sends_delete_and_keeps_fields() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"deleted": true}));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::build(users.schema().clone(), [("id", "u-5"), ("name", "Bye")]);
    assert_eq!(users.destroy(&mut user).await, Phase::Success);
    assert_eq!(user.get("name"), Some(&FieldValue::from("Bye")));

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.url, "http://api.test/users/u-5");
    assert_eq!(request.body, None);
}

#[tokio::test]
async fn save_failure_leaves_fetch_flags_alone() {
    let transport = StubTransport::new();
    transport.respond(500, json!({"error": "boom"}));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::new(users.schema().clone());
    assert_eq!(users.update(&mut user).await, Phase::Failure);
    assert!(user.lifecycle().save.failure);
    assert_eq!(user.lifecycle().phase(Operation::Fetch), Phase::Idle);
    assert_eq!(fetch_failure(&mut rx).operation, Operation::Save);
}

// ── Actions ─────────────────────────────────────────────────────

#[tokio::test]
async fn action_targets_sub_endpoint() {
    let transport = StubTransport::new();
    transport.respond(200, json!({"id": "u-1", "name": "Activated"}));
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    let params = vec![("notify".to_string(), QueryValue::from(false))];
    assert_eq!(users.action(&mut user, Method::Post, "activate", &params).await, Phase::Success);
    assert_eq!(user.get("name"), Some(&FieldValue::from("Activated")));
    assert_eq!(user.lifecycle().phase(Operation::Save), Phase::Success);

    let request = &transport.requests()[0];
    assert_eq!(request.url, "http://api.test/users/u-1/activate?notify=false");
    assert_eq!(request.body, Some(json!({"id": "u-1"})));
}

#[tokio::test]
async fn get_action_counts_as_fetch() {
    let transport = StubTransport::new();
    let (client, _rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::with_primary_key(users.schema().clone(), "u-1");
    users.action(&mut user, Method::Get, "refresh", &[]).await;
    assert!(user.lifecycle().fetched_once);
    assert_eq!(transport.requests()[0].body, None);
}

#[tokio::test]
async fn action_ignores_non_object_response() {
    let transport = StubTransport::new();
    transport.respond(200, json!(["queued"]));
    let (client, mut rx) = client(transport.clone());
    let users = client.resource(users()).unwrap();

    let mut user = Entity::build(users.schema().clone(), [("id", "u-1"), ("name", "Ada")]);
    assert_eq!(users.action(&mut user, Method::Post, "notify", &[]).await, Phase::Success);
    assert_eq!(user.get("name"), Some(&FieldValue::from("Ada")));
    assert!(rx.try_recv().is_err());
}
