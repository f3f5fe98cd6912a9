#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # gatewire
//!
//! Runtime core for a client of a rate-limited REST API that also pushes events over a
//! persistent gateway connection.
//!
//! ## Features
//!
//! - **Per-route rate limiting** as Tower middleware: single-flight buckets, reset waits,
//!   global limits and bounded `429` retries
//! - **Event handler registry** with catch-all and fallback handlers, tags, expiry and
//!   all-or-nothing bulk registration
//! - **Entity cache** with field-level merge, so partial updates never erase known fields
//! - **Cache gate** that skips REST-driven cache writes the gateway will perform anyway
//!
//! The HTTP transport and the gateway connection are supplied by the caller.
//!
//! ## Quick Start
//!
//! ```rust
//! use gatewire::prelude::*;
//! use gatewire::rest::{HttpRequest, HttpResponse, Transport};
//! use gatewire::error::TransportError;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Transport for Echo {
//!     async fn call(&self, _req: HttpRequest) -> Result<HttpResponse, TransportError> {
//!         Ok(HttpResponse::json(StatusCode::OK, &json!({"id": "1", "username": "ferris"})))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::builder("token").build().unwrap();
//!     let client = Client::new(config, Echo);
//!
//!     client
//!         .add_handler(
//!             EventType::MessageCreate,
//!             Callback::on::<MessageCreate, _, _>(|_client, ev| async move {
//!                 println!("{:?}", ev.message.content);
//!             }),
//!         )
//!         .unwrap();
//!
//!     let user = client.get_user(Snowflake(1)).await;
//!     assert!(user.ok());
//!     assert!(client.get_user(Snowflake(1)).await.is_cached());
//!
//!     client
//!         .dispatch_raw("MESSAGE_CREATE", json!({"id": "2", "channel_id": "3", "content": "hi"}), Some(1))
//!         .await;
//! }
//! ```

pub mod cache_gate;
pub mod client;
pub mod clock;
pub mod config;
pub mod entities;
pub mod error;
pub mod error_log;
pub mod events;
pub mod handlers;
pub mod prelude;
pub mod rate_limit;
pub mod rest;
pub mod sleeper;
pub mod state;

// Re-exports
pub use cache_gate::should_put;
pub use client::{Cacheable, Client};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheTtls, ClientConfig, ClientConfigBuilder, DynamicConfig};
pub use entities::{Field, Merge, Snowflake};
pub use error::{ConfigError, ParseError, RegistrationError, RestError, TransportError};
pub use error_log::{ErrorLog, ErrorSource, LoggedError};
pub use events::{Event, EventSet, EventType, GatewayEvent};
pub use handlers::{Callback, Expiry, HandlerModule, HandlerOptions, HandlerRegistry, Tag};
pub use rate_limit::{parse_endpoint, Bucket, Limiter, RateLimitLayer};
pub use rest::{HttpRequest, HttpResponse, Response, ServiceTransport, Transport};
pub use sleeper::{Sleeper, TokioSleeper, TrackingSleeper};
pub use state::{Collection, State};
