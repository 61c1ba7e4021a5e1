pub mod auth;
pub mod handlers;
pub(crate) mod throttle;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, header};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::backend::InferenceBackend;
use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::relay::Relay;
use crate::server::throttle::UsagePlan;

pub struct AppState {
    pub config: Settings,
    pub relay: Relay,
    pub usage_plan: UsagePlan,
}

pub fn create_app(config: Settings, backend: Arc<dyn InferenceBackend>) -> AppResult<Router> {
    config.validate()?;
    let usage_plan = UsagePlan::from_settings(&config.gateway)?;

    tracing::info!(
        "Usage plan {}: {} req/s (burst {}), {} requests/day per key, {} key(s)",
        config.deployment.usage_plan_name(),
        config.gateway.rate_limit,
        config.gateway.burst_limit,
        config.gateway.daily_quota,
        config.gateway.api_keys.len()
    );

    let body_limit = DefaultBodyLimit::max(config.server.max_body_bytes);
    let app_state = AppState {
        config,
        relay: Relay::new(backend),
        usage_plan,
    };

    // API Gateway 风格的 CORS：任意来源，仅 POST/OPTIONS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ]);

    Ok(handlers::routes()
        .with_state(Arc::new(app_state))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
