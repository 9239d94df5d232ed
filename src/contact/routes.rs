use axum::{routing::post, Router};

use super::contact_handlers;
use crate::state::AppState;

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts/search", post(contact_handlers::search_contact))
        .route("/contacts/add", post(contact_handlers::add_contact))
}
