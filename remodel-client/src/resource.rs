//! Resources and the fetch lifecycle.
//!
//! A [`Resource`] binds one compiled schema to a [`Client`]. Every operation
//! follows the same path: flip the record's lifecycle flags to in-progress,
//! build the request, send it under the configured deadline, and on success
//! mutate the record in place with what the server returned. Failures are
//! never returned as errors. They set the failure flag, are logged, and are
//! emitted as [`Event::FetchFailed`] to the client's observers.
//!
//! Operations borrow the record mutably for their whole duration, so two
//! operations can never be in flight on the same instance. Issuing them one
//! after the other is last-write-wins.

use crate::auth::TokenProvider;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::request::{Method, Request, build_url};
use crate::transport::{HttpTransport, Transport};
use remodel_model::{
    Collection, Entity, Event, EventSink, FetchFailure, FieldValue, ModelError, Observers,
    Operation, Phase, Query, QueryValue, Schema, WireRecord,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared settings, transport, credentials and observers.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenProvider>>,
    observers: Observers,
}

impl Client {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            tokens: None,
            observers: Observers::new(),
        }
    }

    /// A client over [`HttpTransport`].
    pub fn http(config: ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(provider);
        self
    }

    /// Registers a sink for fetch and validation failure events.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.observers.subscribe(sink);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The registered sinks. Pass this to [`Entity::valid`] to route
    /// validation failures to the same observers.
    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    /// Binds a schema to this client.
    ///
    /// Fails when the schema requires authorization and no token provider
    /// is configured.
    pub fn resource(&self, schema: Arc<Schema>) -> ClientResult<Resource<'_>> {
        if schema.requires_auth() && self.tokens.is_none() {
            return Err(ClientError::Config(format!(
                "schema `{}` requires authorization but no token provider is configured",
                schema.name()
            )));
        }
        debug!(schema = schema.name(), endpoint = schema.endpoint(), "resource registered");
        Ok(Resource {
            client: self,
            schema,
        })
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("has_token_provider", &self.tokens.is_some())
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

/// What to do with a successful response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Apply {
    Replace,
    Extend,
    /// Absorb JSON objects, drop anything else.
    Objects,
    Discard,
}

/// The operations of one schema's endpoint.
#[derive(Debug, Clone)]
pub struct Resource<'c> {
    client: &'c Client,
    schema: Arc<Schema>,
}

impl Resource<'_> {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Fetches the entity by its primary key and mutates it in place.
    pub async fn get(&self, entity: &mut Entity) -> Phase {
        let url = self.url(Some(entity.primary_key()), None, &[]);
        self.run(entity, Operation::Fetch, Method::Get, url, None, Apply::Replace)
            .await
    }

    /// Builds an entity with the given key and fetches it.
    pub async fn get_by_key(&self, key: impl Into<FieldValue>) -> Entity {
        let mut entity = Entity::with_primary_key(self.schema.clone(), key);
        self.get(&mut entity).await;
        entity
    }

    /// Fetches one page into the collection, replacing its items.
    pub async fn get_collection(&self, collection: &mut Collection, query: Query) -> Phase {
        let url = self.url(None, None, &query.pairs());
        let phase = self
            .run(collection, Operation::Fetch, Method::Get, url, None, Apply::Replace)
            .await;
        if phase == Phase::Success {
            collection.set_query(query);
        }
        phase
    }

    /// Fetches the next page of the last query and appends it.
    ///
    /// The collection remembers the page only once it loaded, so calling
    /// again after a failure retries the same offset.
    pub async fn get_more(&self, collection: &mut Collection) -> Phase {
        let query = match collection.query() {
            Some(previous) => previous.next_page(),
            None => Query::new()
                .limit(self.client.config.page_limit)
                .offset(collection.len()),
        };
        let url = self.url(None, None, &query.pairs());
        let phase = self
            .run(collection, Operation::Fetch, Method::Get, url, None, Apply::Extend)
            .await;
        if phase == Phase::Success {
            collection.set_query(query);
        }
        phase
    }

    /// POSTs the validated fields to the endpoint.
    pub async fn create(&self, entity: &mut Entity) -> Phase {
        let url = self.url(None, None, &[]);
        let body = entity.to_wire_payload();
        let phase = self
            .run(entity, Operation::Save, Method::Post, url, Some(body), Apply::Replace)
            .await;
        if phase == Phase::Success {
            entity.set_new(false);
        }
        phase
    }

    /// PUTs the validated fields to the entity's URL.
    pub async fn replace(&self, entity: &mut Entity) -> Phase {
        self.write(entity, Method::Put).await
    }

    /// PATCHes the validated fields to the entity's URL.
    pub async fn update(&self, entity: &mut Entity) -> Phase {
        self.write(entity, Method::Patch).await
    }

    /// Creates a new entity, updates a persisted one.
    pub async fn save(&self, entity: &mut Entity) -> Phase {
        if entity.is_new() {
            self.create(entity).await
        } else {
            self.update(entity).await
        }
    }

    /// DELETEs the entity. The response body, if any, is ignored.
    pub async fn destroy(&self, entity: &mut Entity) -> Phase {
        let url = self.url(Some(entity.primary_key()), None, &[]);
        self.run(entity, Operation::Save, Method::Delete, url, None, Apply::Discard)
            .await
    }

    /// Calls a sub-action of the entity (`endpoint/key/action`).
    ///
    /// GET actions count as fetches, everything else as saves. Mutating
    /// methods send the validated fields; a JSON object response is
    /// absorbed into the entity.
    pub async fn action(
        &self,
        entity: &mut Entity,
        method: Method,
        action: &str,
        params: &[(String, QueryValue)],
    ) -> Phase {
        let url = self.url(Some(entity.primary_key()), Some(action), params);
        let op = match method {
            Method::Get => Operation::Fetch,
            _ => Operation::Save,
        };
        let body = method.carries_body().then(|| entity.to_wire_payload());
        self.run(entity, op, method, url, body, Apply::Objects).await
    }

    async fn write(&self, entity: &mut Entity, method: Method) -> Phase {
        let url = self.url(Some(entity.primary_key()), None, &[]);
        let body = entity.to_wire_payload();
        self.run(entity, Operation::Save, method, url, Some(body), Apply::Replace)
            .await
    }

    fn url(
        &self,
        key: Option<&FieldValue>,
        action: Option<&str>,
        query: &[(String, QueryValue)],
    ) -> String {
        build_url(
            &self.client.config.base_url,
            self.schema.endpoint(),
            key,
            action,
            query,
        )
    }

    async fn run<R: WireRecord>(
        &self,
        record: &mut R,
        op: Operation,
        method: Method,
        url: String,
        body: Option<Value>,
        apply: Apply,
    ) -> Phase {
        record.lifecycle_mut().begin(op);
        debug!(schema = self.schema.name(), %method, %url, "request started");

        let outcome = match self.check_schema(record) {
            Ok(()) => match self.exchange(method, &url, body).await {
                Ok(payload) => self.settle(record, payload, apply),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                record.lifecycle_mut().succeed(op);
                debug!(schema = self.schema.name(), %method, %url, "request succeeded");
            }
            Err(err) => {
                record.lifecycle_mut().fail(op);
                self.report(op, method, &url, &err);
            }
        }
        record.lifecycle().phase(op)
    }

    fn check_schema<R: WireRecord>(&self, record: &R) -> ClientResult<()> {
        let found = record.schema().name();
        if found == self.schema.name() {
            Ok(())
        } else {
            Err(ModelError::SchemaMismatch {
                expected: self.schema.name().to_string(),
                found: found.to_string(),
            }
            .into())
        }
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> ClientResult<Option<Value>> {
        let mut request = Request::new(method, url);
        if let Some(body) = body {
            request = request.body(body);
        }

        if self.schema.requires_auth() {
            let token = match &self.client.tokens {
                Some(provider) => provider.token().await,
                None => None,
            };
            match token.filter(|t| !t.is_empty()) {
                Some(token) => request = request.bearer(&token),
                None => {
                    return Err(ClientError::MissingCredentials(
                        self.schema.name().to_string(),
                    ));
                }
            }
        }

        let deadline = self.client.config.timeout();
        let response = tokio::time::timeout(deadline, self.client.transport.send(request))
            .await
            .map_err(|_| ClientError::Timeout(deadline))??;

        if !response.ok() {
            return Err(ClientError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    fn settle<R: WireRecord>(
        &self,
        record: &mut R,
        payload: Option<Value>,
        apply: Apply,
    ) -> ClientResult<()> {
        let keys = &self.client.config.response_keys;
        match (apply, payload) {
            (Apply::Discard, _) | (_, None) => Ok(()),
            (Apply::Objects, Some(payload)) if !payload.is_object() => {
                debug!(schema = self.schema.name(), "ignoring non-object action response");
                Ok(())
            }
            (Apply::Replace | Apply::Objects, Some(payload)) => {
                Ok(record.absorb(payload, keys, false)?)
            }
            (Apply::Extend, Some(payload)) => Ok(record.absorb(payload, keys, true)?),
        }
    }

    fn report(&self, op: Operation, method: Method, url: &str, err: &ClientError) {
        let schema = self.schema.name();
        if let ClientError::MissingCredentials(_) = err {
            error!(schema, %method, url, "private endpoint called without credentials");
        } else {
            warn!(schema, %method, url, error = %err, "request failed");
        }
        self.client
            .observers
            .emit(&Event::FetchFailed(FetchFailure {
                schema: schema.to_string(),
                operation: op,
                method: method.to_string(),
                url: url.to_string(),
                status: err.status(),
                message: err.to_string(),
                body: err.body().cloned(),
            }));
    }
}
