use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};

use crate::cache::OrderCache;
use crate::metrics::Metrics;

// ============================================================================
// Lookup front-end - cache-only reads plus health and metrics
// ============================================================================
//
// Request-time lookups never touch the database; the cache is the read
// view. An unknown identifier is a 404, not a server error.
//
// ============================================================================

pub struct AppState {
    pub cache: Arc<OrderCache>,
    pub metrics: Arc<Metrics>,
}

/// Builds the server without running it so main controls the shutdown
/// ordering (signals are handled there, not by actix).
pub fn build_server(state: Arc<AppState>, port: u16) -> std::io::Result<Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(state.clone()))
            .route("/order/{order_uid}", web::get().to(get_order))
            .route("/health", web::get().to(health_handler))
            .route("/metrics", web::get().to(metrics_handler))
    })
    .disable_signals()
    .bind(("0.0.0.0", port))?
    .run())
}

async fn get_order(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let order_uid = path.into_inner();
    match state.cache.get(&order_uid) {
        Some(order) => {
            state
                .metrics
                .lookup_requests
                .with_label_values(&["hit"])
                .inc();
            HttpResponse::Ok().json(&*order)
        }
        None => {
            state
                .metrics
                .lookup_requests
                .with_label_values(&["miss"])
                .inc();
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "order not found",
                "order_uid": order_uid,
            }))
        }
    }
}

async fn health_handler(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "cached_orders": state.cache.len(),
    }))
}

async fn metrics_handler(state: web::Data<AppState>) -> impl Responder {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(e.to_string());
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

// ============================================================================
// Unit Tests
// ============================================================================
