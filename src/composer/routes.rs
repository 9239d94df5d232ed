use axum::{
    routing::{post, put},
    Router,
};

use super::composer_handlers;
use crate::state::AppState;

pub fn composer_routes() -> Router<AppState> {
    Router::new()
        .route("/composer", put(composer_handlers::update_draft))
        .route("/composer/emoji", post(composer_handlers::insert_emoji))
        .route("/composer/emoji-picker", post(composer_handlers::toggle_emoji_picker))
        .route("/composer/attach-menu", post(composer_handlers::toggle_attach_menu))
        .route("/composer/attachment", post(composer_handlers::choose_attachment))
        .route("/composer/send", post(composer_handlers::send_draft))
}
