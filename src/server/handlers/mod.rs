use axum::{Router, routing::post};
use std::sync::Arc;

use crate::server::AppState;

mod invoke;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/invoke", post(invoke::invoke))
}
