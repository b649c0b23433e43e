use crate::{
    api::{current_price, health, price_history, trigger_update},
    middleware::require_admin,
    state::AppState,
    ws::ws_handler,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let admin_router = Router::new()
        .route("/api/prices/update", post(trigger_update))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(admin_router)
        .route("/api/prices/current", get(current_price))
        .route("/api/prices/history/{interval}", get(price_history))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
