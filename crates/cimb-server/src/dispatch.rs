use async_trait::async_trait;

use cimb_auth::Identity;
use cimb_stream::{InstanceId, ObjectArena};

use crate::error::ServerResult;

/// A decoded object graph together with its top-level instances.
#[derive(Debug, Default)]
pub struct ObjectPayload {
    pub arena: ObjectArena,
    pub instances: Vec<InstanceId>,
}

/// Receives every authenticated `/cimom` request once its payload decoded.
///
/// The returned payload is streamed back to the caller.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, identity: &Identity, request: ObjectPayload) -> ServerResult<ObjectPayload>;
}

/// Returns the request payload unchanged.
pub struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, _identity: &Identity, request: ObjectPayload) -> ServerResult<ObjectPayload> {
        Ok(request)
    }
}
