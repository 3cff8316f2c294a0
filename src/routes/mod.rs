//! Route definitions for the SMS ledger API.

pub mod bank_addresses;
pub mod health;
pub mod patterns;
pub mod transactions;
pub mod unparsed;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// SMS bodies and pattern definitions are small; anything larger is rejected.
const MAX_BODY_BYTES: usize = 64 * 1024;

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(frontend_url, error = %e, "Invalid FRONTEND_URL; cross-origin requests disabled");
            layer
        }
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let transaction_routes = Router::new()
        .route("/parse", post(transactions::parse))
        .route("/transactions", get(transactions::list));

    let pattern_routes = Router::new()
        .route("/patterns", post(patterns::create))
        .route("/patterns/drafts", post(patterns::create_draft))
        .route("/patterns/pending", get(patterns::list_pending))
        .route("/patterns/active", get(patterns::list_active))
        .route("/patterns/test-match", post(patterns::test_match))
        .route("/patterns/bank-addresses", get(patterns::bank_addresses))
        .route(
            "/patterns/{id}",
            get(patterns::get_by_id).put(patterns::update_draft),
        )
        .route("/patterns/{id}/submit", post(patterns::submit))
        .route("/patterns/{id}/status", put(patterns::decide))
        .route("/patterns/{id}/deprecate", post(patterns::deprecate))
        .route("/patterns/{id}/history", get(patterns::get_history));

    let alias_routes = Router::new().route(
        "/bank-addresses/aliases",
        get(bank_addresses::list_aliases).post(bank_addresses::create_alias),
    );

    let unparsed_routes = Router::new()
        .route("/unparsed-messages", get(unparsed::list))
        .route("/unparsed-messages/pending", get(unparsed::list_pending))
        .route(
            "/unparsed-messages/pending/count",
            get(unparsed::pending_count),
        )
        .route(
            "/unparsed-messages/{id}/mark-processed",
            put(unparsed::mark_processed),
        )
        .route(
            "/unparsed-messages/{id}",
            delete(unparsed::discard),
        );

    let cors = cors(&state.config.frontend_url);

    let api = Router::new()
        .merge(transaction_routes)
        .merge(pattern_routes)
        .merge(alias_routes)
        .merge(unparsed_routes);

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
