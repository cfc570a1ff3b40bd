use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde_json::json;
use tracing::{debug, warn};

use cimb_auth::{
    AuthOutcome, Identity, ServerAuthenticator, AUTHORIZATION_HEADER, LOCAL_AUTHORIZATION_HEADER,
};
use cimb_stream::{ObjectArena, ObjectStreamer};

use crate::dispatch::{ObjectPayload, RequestHandler};
use crate::error::{ServerError, ServerResult};
use crate::stats::RequestStats;

const OCTET_STREAM: &str = "application/octet-stream";

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<ServerAuthenticator>,
    pub handler: Arc<dyn RequestHandler>,
    pub stats: Arc<RequestStats>,
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "name": "cimserver",
        "version": env!("CARGO_PKG_VERSION"),
        "stats": state.stats.snapshot(),
    }))
}

/// `POST /cimom`: authenticate, decode the object stream, dispatch, and
/// stream the result back.
pub async fn cimom_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ServerError> {
    state.stats.record_request(body.len());

    let identity = authenticate(&state, &headers).await?;

    let mut arena = ObjectArena::new();
    let instances = ObjectStreamer::deserialize(&body, &mut arena).map_err(|e| {
        if e.is_decode_failure() {
            state.stats.record_decode_failure();
        }
        warn!(user = %identity.user, error = %e, "rejected object stream");
        ServerError::from(e)
    })?;
    debug!(
        user = %identity.user,
        instances = instances.len(),
        bytes = body.len(),
        "decoded request payload"
    );

    let reply = state
        .handler
        .handle(&identity, ObjectPayload { arena, instances })
        .await?;
    let out = ObjectStreamer::new(&reply.arena, &reply.instances).serialize()?;
    state.stats.record_response(out.len());

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, OCTET_STREAM)], out).into_response())
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> ServerResult<Identity> {
    let authorization = header_str(headers, AUTHORIZATION_HEADER);
    let local_authorization = header_str(headers, LOCAL_AUTHORIZATION_HEADER);

    let outcome = match local_authorization {
        // Local rounds create and remove secret files.
        Some(local) => {
            let auth = Arc::clone(&state.auth);
            let authorization = authorization.map(str::to_owned);
            let local = local.to_owned();
            tokio::task::spawn_blocking(move || {
                auth.authenticate(authorization.as_deref(), Some(&local))
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??
        }
        None => state.auth.authenticate(authorization, None)?,
    };

    match outcome {
        AuthOutcome::Authenticated(identity) => {
            state.stats.record_authenticated();
            Ok(identity)
        }
        AuthOutcome::Challenge(challenge) => {
            state.stats.record_challenge();
            Err(ServerError::Unauthorized {
                challenge: Some(challenge),
            })
        }
        AuthOutcome::Denied => {
            state.stats.record_denied();
            Err(ServerError::Unauthorized { challenge: None })
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
