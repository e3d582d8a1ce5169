//! Bazaar server library.
//!
//! Storefront and admin JSON API over one `PostgreSQL` database. The binary
//! in `main.rs` only wires configuration, logging and the listener around
//! [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

use axum::{Router, http::Request};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with its middleware stack.
///
/// Sentry layers are added by the caller so tests can build the router
/// without a Sentry client.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
