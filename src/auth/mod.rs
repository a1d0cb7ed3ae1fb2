use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub mod repo_types;

pub use claims::{Identity, Role};

/// Seeker routes under `/api/auth`, provider routes under `/api/authprovider`.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", handlers::role_routes(Role::Seeker, state))
        .nest("/api/authprovider", handlers::role_routes(Role::Provider, state))
}
