//! Feature-gated routes.
//!
//! ```rust,ignore
//! let gate = is_route_enabled("my_feature", |_req| async {
//!     StatusCode::NOT_FOUND.into_response()
//! });
//! let app = Router::new()
//!     .route("/beta", get(beta).route_layer(from_fn_with_state(gate, feature_gate)))
//!     .layer(from_fn_with_state(binder, bind_request));
//! ```
//!
//! The gate asks the request's bound evaluation client whether the feature is
//! on for the request's identity. Requests with no bound client are treated
//! as disabled.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use futures_util::future::BoxFuture;
use tracing::debug;

use crate::binder::RequestContext;

/// Header consulted for the request identity when no [`UserId`] extension is set.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Request identity, inserted by an upstream auth/session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

pub type DisabledHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

#[derive(Clone)]
pub struct FeatureGate {
    feature_key: Arc<str>,
    on_disabled: DisabledHandler,
}

impl FeatureGate {
    pub fn feature_key(&self) -> &str {
        &self.feature_key
    }
}

/// Build a gate for `feature_key`; `on_disabled` answers requests it turns away.
pub fn is_route_enabled<F, Fut>(feature_key: impl Into<Arc<str>>, on_disabled: F) -> FeatureGate
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FeatureGate {
        feature_key: feature_key.into(),
        on_disabled: Arc::new(move |req: Request| -> BoxFuture<'static, Response> {
            Box::pin(on_disabled(req))
        }),
    }
}

/// Middleware: continue when the feature is on, else delegate to `on_disabled`.
///
/// Wire with `axum::middleware::from_fn_with_state(gate, feature_gate)`.
pub async fn feature_gate(State(gate): State<FeatureGate>, req: Request, next: Next) -> Response {
    let user_id = request_user_id(&req);
    let enabled = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| {
            ctx.client
                .is_feature_enabled(&gate.feature_key, user_id.as_deref())
        })
        .unwrap_or(false);

    if enabled {
        next.run(req).await
    } else {
        debug!(feature = %gate.feature_key, user_id = ?user_id, "feature disabled for request");
        (gate.on_disabled)(req).await
    }
}

fn request_user_id(req: &Request) -> Option<String> {
    if let Some(UserId(id)) = req.extensions().get::<UserId>() {
        return Some(id.clone());
    }
    req.headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
