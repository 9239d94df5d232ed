use axum::{
    routing::{get, patch, put},
    Router,
};

use super::settings_handlers;
use crate::state::AppState;

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(settings_handlers::get_settings))
        .route("/settings/password", put(settings_handlers::change_password))
        .route("/settings/preferences", patch(settings_handlers::update_preferences))
}
