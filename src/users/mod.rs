pub mod dto;
pub mod filters;
pub mod handlers;
pub mod model;
pub mod pagination;
pub mod repo;
pub mod search;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::user_routes())
}
