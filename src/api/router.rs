//! Ledger API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. `Cache-Control: no-store` → 2. Audit logger → 3. Clinic resolver (ledger routes only)

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the ledger API router.
///
/// Every route except `/api/health` requires the `X-Clinic-Id` header.
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    let ledger = Router::new()
        // Directory
        .route("/professionals/:id", put(endpoints::directory::put_professional))
        .route("/procedures/:id", put(endpoints::directory::put_procedure))
        // Availability Calendar
        .route(
            "/professionals/:id/hours",
            get(endpoints::availability::get_hours).put(endpoints::availability::set_hours),
        )
        .route("/professionals/:id/availability", get(endpoints::availability::check))
        .route("/professionals/:id/free-slots", get(endpoints::availability::free_slots))
        .route(
            "/professionals/:id/exceptions",
            get(endpoints::availability::list_exceptions).post(endpoints::availability::add_exception),
        )
        .route("/exceptions/:id", delete(endpoints::availability::remove_exception))
        // Appointment Scheduler
        .route("/appointments", post(endpoints::appointments::book))
        .route("/appointments/:id", get(endpoints::appointments::get))
        .route("/appointments/:id/reschedule", post(endpoints::appointments::reschedule))
        .route("/appointments/:id/transition", post(endpoints::appointments::transition))
        .route("/appointments/:id/cancel", post(endpoints::appointments::cancel))
        .route("/appointments/:id/history", get(endpoints::appointments::history))
        .route(
            "/professionals/:id/appointments",
            get(endpoints::appointments::list_for_professional),
        )
        // Inventory Ledger & Kit Catalog
        .route("/inventory/items", post(endpoints::inventory::create_item))
        .route("/inventory/items/:id", get(endpoints::inventory::get_item))
        .route("/inventory/items/:id/adjust", post(endpoints::inventory::adjust))
        .route("/inventory/items/:id/restock", post(endpoints::inventory::restock))
        .route("/inventory/items/:id/movements", get(endpoints::inventory::movements))
        .route("/inventory/low-stock", get(endpoints::inventory::low_stock))
        .route("/procedures/:id/kit", get(endpoints::inventory::kit))
        .route(
            "/procedures/:id/kit/:item_id",
            put(endpoints::inventory::set_kit_item).delete(endpoints::inventory::remove_kit_item),
        )
        // Commission Ledger
        .route("/commissions/:id/settle", post(endpoints::commissions::settle))
        .route("/professionals/:id/commissions", get(endpoints::commissions::list))
        .route(
            "/professionals/:id/commissions/settle",
            post(endpoints::commissions::settle_period),
        )
        .route(
            "/professionals/:id/commissions/summary",
            get(endpoints::commissions::summary),
        )
        .route("/appointments/:id/commissions", get(endpoints::commissions::for_appointment))
        .route(
            "/appointments/:id/commissions/adjustments",
            post(endpoints::commissions::post_adjustment),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::clinic::require_clinic));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", ledger)
        .nest("/api", open)
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
