// Library interface for backend - exposes modules for testing

pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod notify;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    routing::{get, post, put},
    Router,
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Bets
        .route("/api/bets", post(handlers::bets::place_bet))
        .route("/api/bets", get(handlers::bets::list_bets))
        .route("/api/bets/:bet_id/cancel", post(handlers::bets::cancel_bet))
        // Draws
        .route("/api/draws", get(handlers::draws::list_draws))
        .route("/api/draws", post(handlers::draws::schedule_draw))
        .route("/api/draws/:draw_id/result", post(handlers::draws::submit_result))
        .route(
            "/api/draws/:draw_id/multiplier",
            put(handlers::draws::update_multiplier),
        )
        // Accounts
        .route("/api/accounts", post(handlers::accounts::create_account))
        .route("/api/accounts/:account_id", get(handlers::accounts::get_account))
        .route(
            "/api/accounts/:account_id/ledger",
            get(handlers::accounts::list_ledger),
        )
        .route(
            "/api/accounts/:account_id/deposit",
            post(handlers::accounts::deposit),
        )
        .route(
            "/api/accounts/:account_id/withdraw",
            post(handlers::accounts::withdraw),
        )
        // Metrics
        .route("/metrics", get(handlers::metrics::metrics_handler))
        // State
        .with_state(state)
        // Middleware
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}
