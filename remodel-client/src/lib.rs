//! Fetch lifecycle and HTTP plumbing for remodel entities.
//!
//! - [`Client`]: configuration, transport, token provider and event observers
//! - [`Resource`]: get / list / page / create / replace / update / delete one schema's records
//! - [`Transport`]: the narrow send-a-request seam, with [`HttpTransport`] over reqwest
//! - [`TokenProvider`]: bearer tokens for schemas that require authorization
//!
//! # Example
//!
//! ```no_run
//! use remodel_client::{Client, ClientConfig};
//! use remodel_model::{Entity, FieldSpec, Phase, ScalarType, SchemaCompiler, ValidSpec};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = SchemaCompiler::default().compile("users", [
//!     ("id", FieldSpec::scalar(ScalarType::Identifier).primary_key()),
//!     ("email", FieldSpec::scalar(ScalarType::Email)),
//! ])?;
//!
//! let client = Client::http(ClientConfig::new("https://api.example.com/v1"))?;
//! let users = client.resource(schema.clone())?;
//!
//! let mut user = Entity::build(schema, [("email", "ada@example.com")]);
//! if user.valid(&[ValidSpec::field("email")], client.observers()).is_valid {
//!     let phase = users.save(&mut user).await;
//!     assert_eq!(phase, Phase::Success);
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod channel;
mod config;
mod error;
mod request;
mod resource;
mod transport;

pub use auth::{StaticToken, TokenProvider};
pub use channel::ChannelSink;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use request::{AUTHORIZATION, CONTENT_TYPE, Method, Request, build_url};
pub use resource::{Client, Resource};
pub use transport::{HttpTransport, Response, Transport};
