use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{admin, health_check, orders, payments, tickets};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/tiers", get(orders::list_tiers))
        .route("/orders/quote", post(orders::quote))
        .route("/payment/create-order", post(payments::create_order))
        .route("/payment/verify", post(payments::verify))
        .route(
            "/tickets",
            get(tickets::list_my_tickets).post(tickets::issue_ticket),
        )
        .route("/tickets/:id", get(tickets::get_my_ticket))
        .nest("/admin", admin_routes());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.allowed_origins))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/ticket", get(admin::get_ticket))
        .route("/scan", post(admin::scan))
        .route("/scan-image", post(admin::scan_image))
        .route("/checkin", post(admin::check_in))
        .route("/stats", get(admin::stats))
}
