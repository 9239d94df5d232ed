use axum::{
    routing::{get, post},
    Router,
};

use super::session_handlers;
use crate::state::AppState;

pub fn public_session_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(session_handlers::login))
        .route("/register", post(session_handlers::register))
        .route("/reset-password", post(session_handlers::reset_password))
        .route("/oauth/:provider", get(session_handlers::oauth_sign_in))
}

pub fn protected_session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(session_handlers::logout))
        .route("/session", get(session_handlers::get_session))
        .route("/session/events", get(session_handlers::session_events))
}
