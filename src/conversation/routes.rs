use axum::{
    routing::{get, post},
    Router,
};

use super::conversation_handlers;
use crate::state::AppState;

pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/chats",
            get(conversation_handlers::list_chats).post(conversation_handlers::create_chat),
        )
        .route("/chats/:id/select", post(conversation_handlers::select_chat))
        .route("/thread", get(conversation_handlers::get_thread))
        .route("/thread/reload", post(conversation_handlers::reload_thread))
        .route("/messages", post(conversation_handlers::send_message))
}
