use crate::assistant::DevAssistant;
use crate::error::AssistantError;
use crate::models::api::{ ChatRequest, ErrorResponse, RollbackRequest, RollbackResponse };
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Request, State, rejection::JsonRejection },
    middleware::{ self, Next },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

#[derive(Clone)]
pub struct AppState {
    assistant: Arc<DevAssistant>,
    api_key: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

pub fn router(assistant: Arc<DevAssistant>, api_key: Option<String>) -> Router {
    let api_key = api_key.filter(|k| !k.trim().is_empty());
    if api_key.is_some() {
        info!("Server configured with API Key authentication.");
    } else {
        warn!("Server configured WITHOUT API Key authentication. Endpoints are open.");
    }
    let state = AppState { assistant, api_key };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/rollback", post(rollback_handler))
        .route("/api/versions", get(versions_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(cors)
        .with_state(state)
}

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(required) = state.api_key.as_deref() else {
        return next.run(req).await;
    };

    let mut provided = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    if provided.is_none() {
        if let Some(q) = req.uri().query() {
            for pair in q.split('&') {
                let mut kv = pair.splitn(2, '=');
                if kv.next() == Some("api_key") {
                    provided = kv.next().map(|v| v.to_string());
                    break;
                }
            }
        }
    }

    if provided.as_deref() != Some(required) {
        warn!("Rejected {} {}: bad or missing API key", req.method(), req.uri().path());
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    next.run(req).await
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if req.messages.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Messages are required.");
    }

    match state.assistant.handle_change_request(&req.messages).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(AssistantError::InvalidInput(msg)) => error_response(StatusCode::BAD_REQUEST, msg),
        Err(e) => {
            error!("Change request failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn rollback_handler(
    State(state): State<AppState>,
    payload: Result<Json<RollbackRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let version_id = req.version_id.unwrap_or_default();

    match state.assistant.rollback(&version_id).await {
        Ok(version) => (StatusCode::OK, Json(RollbackResponse { success: true, version })).into_response(),
        Err(e @ (AssistantError::InvalidInput(_) | AssistantError::UnsafePaths(_))) =>
            error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Rollback to '{}' failed: {}", version_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn versions_handler(State(state): State<AppState>) -> Response {
    match state.assistant.list_versions().await {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(e) => {
            error!("Listing versions failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
