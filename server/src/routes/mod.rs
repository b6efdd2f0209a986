use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, security_header_layers, Config};
use crate::handlers::{checkin, health_check, performances, productions, reservations};
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/productions", post(productions::create_production))
        .route("/productions/:id", get(productions::get_production))
        .route(
            "/productions/:id/reception",
            get(productions::reception_status).put(productions::update_reception),
        )
        .route(
            "/productions/:id/performances",
            post(productions::add_performance),
        )
        .route(
            "/performances/:id",
            delete(performances::delete_performance),
        )
        .route(
            "/performances/:id/availability",
            get(performances::availability),
        )
        .route(
            "/performances/:id/reservations",
            post(performances::create_reservation),
        )
        .route(
            "/performances/:id/same-day-tickets",
            post(performances::issue_same_day_ticket),
        )
        .route("/reservations/:id", get(reservations::get_reservation))
        .route(
            "/reservations/:id/status",
            patch(reservations::update_status),
        )
        .route(
            "/reservations/:id/checkin-logs",
            get(reservations::list_checkin_logs),
        )
        .route(
            "/reservations/:id/checkin",
            post(checkin::add_checked_in_tickets),
        )
        .route(
            "/reservations/:id/checkin/reset",
            post(checkin::reset_check_in),
        )
        .route(
            "/reservations/:id/checkin-with-payment",
            post(checkin::checkin_with_payment),
        )
        .route(
            "/reservations/:id/partial-reset",
            post(checkin::partial_reset),
        )
        .route(
            "/reservations/:id/payments",
            post(checkin::register_payment),
        )
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/orgs/:org_id", api_routes())
        .with_state(state);

    for layer in security_header_layers(config.is_production) {
        router = router.layer(layer);
    }

    router
        .layer(create_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
