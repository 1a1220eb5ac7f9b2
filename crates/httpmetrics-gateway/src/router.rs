//! Axum router wiring.
//!
//! Two routers: the measured demo application and the operational one that
//! exports the metrics. Application routes are labelled by their route
//! template; `/other-test` shows a fixed handler id.

use axum::{
    extract::{Path, Request},
    http::StatusCode,
    middleware::{self as axum_mw, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use httpmetrics_core::middleware::CustomLabels;

use crate::app_state::AppState;
use crate::measure::{self, Measure};
use crate::ops;

/// Request header copied into the first custom label.
pub const TIER_HEADER: &str = "x-user-tier";

pub fn build_router(state: &AppState) -> Router {
    let mw = state.middleware();

    let other = get(other_test).route_layer(axum_mw::from_fn_with_state(
        Measure::new(mw.clone(), "/other-test"),
        measure::track,
    ));

    Router::new()
        .route("/", get(root))
        .route("/test/:id", get(test).post(test))
        .route("/users/:id", get(user))
        .route("/ping", get(ping))
        .route_layer(axum_mw::from_fn_with_state(Measure::by_path(mw), measure::track))
        .route("/other-test", other)
        .layer(axum_mw::from_fn(tag_user_tier))
}

pub fn build_ops_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}

/// Turns the tier header into the custom label of the measurement.
async fn tag_user_tier(mut req: Request, next: Next) -> Response {
    let tier = req
        .headers()
        .get(TIER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();
    req.extensions_mut().insert(CustomLabels(vec![tier]));
    next.run(req).await
}

async fn root() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn test(Path(id): Path<String>) -> impl IntoResponse {
    (StatusCode::ACCEPTED, format!("test {id}"))
}

async fn user(Path(id): Path<u64>) -> Response {
    if id == 0 {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "no such user" }))).into_response();
    }
    Json(json!({ "id": id, "name": format!("user-{id}") })).into_response()
}

async fn ping() -> impl IntoResponse {
    "pong"
}

async fn other_test() -> impl IntoResponse {
    StatusCode::FOUND
}
