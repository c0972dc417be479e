//! Axum router and HTTP handlers for dfx-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! tracing/CORS layers. The datafile binder middleware is applied here, so
//! every route sees a `RequestContext`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};

use crate::{
    api_types::HealthResponse,
    binder::{bind_request, RequestContext},
    body::parse_body_as_text,
    state::AppState,
    webhook::webhook_route,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/datafile", get(datafile_route))
        .route(
            "/v1/webhook",
            post(webhook_route).route_layer(middleware::from_fn(parse_body_as_text)),
        )
        .layer(middleware::from_fn_with_state(
            state.binder.clone(),
            bind_request,
        ))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let store = st.binder.store();
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            source: st.binder.coordinator().source_name().to_string(),
            ready: store.is_ready(),
            revision: store.revision(),
            updated_at: store.updated_at(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/datafile
// ---------------------------------------------------------------------------

/// Pretty-printed datafile bound to this request; `{}` when none.
pub async fn datafile_route(ctx: Option<Extension<RequestContext>>) -> Response {
    let body = match ctx {
        Some(Extension(ctx)) => ctx.datafile.to_pretty_json(),
        None => "{}".to_string(),
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
