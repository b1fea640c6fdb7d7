mod dto;
pub mod extract;
pub mod handlers;
pub mod interpret;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::predict_routes(max_upload_bytes))
}
