//! HTTP front end for the CIM broker.
//!
//! `POST /cimom` runs the challenge negotiation from `cimb-auth`, decodes the
//! body as a `cimb-stream` object stream, passes it to a [`RequestHandler`]
//! and streams the handler's reply back. `GET /health` reports liveness and
//! request counters.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod stats;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use dispatch::{EchoHandler, ObjectPayload, RequestHandler};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::CimServer;
pub use stats::{RequestStats, StatsSnapshot};
