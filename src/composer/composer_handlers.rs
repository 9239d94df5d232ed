use axum::Json;
use validator::Validate;

use super::{
    composer_dto::{AttachmentRequest, ComposerInputRequest, ComposerSendResponse, InsertEmojiRequest},
    ComposerView,
};
use crate::{error::Result, middleware::AuthClient, models::DEFAULT_MESSAGE_TYPE};

/// Replace the draft text and restart the typing debounce
#[utoipa::path(
    put,
    path = "/api/composer",
    tag = "composer",
    request_body = ComposerInputRequest,
    responses(
        (status = 200, description = "Composer state", body = ComposerView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_draft(
    client: AuthClient,
    Json(payload): Json<ComposerInputRequest>,
) -> Json<ComposerView> {
    let mut composer = client.context.composer.lock().await;
    composer.input(payload.text);
    Json(composer.view())
}

/// Insert an emoji at the cursor and close the picker
#[utoipa::path(
    post,
    path = "/api/composer/emoji",
    tag = "composer",
    request_body = InsertEmojiRequest,
    responses(
        (status = 200, description = "Composer state with the new cursor", body = ComposerView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn insert_emoji(
    client: AuthClient,
    Json(payload): Json<InsertEmojiRequest>,
) -> Result<Json<ComposerView>> {
    payload.validate()?;

    let mut composer = client.context.composer.lock().await;
    composer.insert_emoji(&payload.emoji, payload.cursor);
    Ok(Json(composer.view()))
}

/// Open or close the emoji picker
#[utoipa::path(
    post,
    path = "/api/composer/emoji-picker",
    tag = "composer",
    responses(
        (status = 200, description = "Composer state", body = ComposerView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle_emoji_picker(client: AuthClient) -> Json<ComposerView> {
    let mut composer = client.context.composer.lock().await;
    composer.toggle_emoji_picker();
    Json(composer.view())
}

/// Open or close the attachment menu
#[utoipa::path(
    post,
    path = "/api/composer/attach-menu",
    tag = "composer",
    responses(
        (status = 200, description = "Composer state", body = ComposerView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle_attach_menu(client: AuthClient) -> Json<ComposerView> {
    let mut composer = client.context.composer.lock().await;
    composer.toggle_attach_menu();
    Json(composer.view())
}

/// Pick an attachment kind; this only closes the menu
#[utoipa::path(
    post,
    path = "/api/composer/attachment",
    tag = "composer",
    request_body = AttachmentRequest,
    responses(
        (status = 200, description = "Composer state", body = ComposerView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn choose_attachment(
    client: AuthClient,
    Json(payload): Json<AttachmentRequest>,
) -> Json<ComposerView> {
    let mut composer = client.context.composer.lock().await;
    composer.choose_attachment(payload.kind);
    Json(composer.view())
}

/// Send the draft as a text message to the active chat
///
/// The draft is cleared before the send is attempted, so a failed send
/// loses it.
#[utoipa::path(
    post,
    path = "/api/composer/send",
    tag = "composer",
    responses(
        (status = 200, description = "Send outcome and cleared composer", body = ComposerSendResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_draft(client: AuthClient) -> Result<Json<ComposerSendResponse>> {
    let draft = client.context.composer.lock().await.take_message();

    let message = match draft {
        Some(text) => {
            client
                .context
                .conversations
                .send_message(&text, DEFAULT_MESSAGE_TYPE)
                .await?
        }
        None => None,
    };

    let composer = client.context.composer.lock().await.view();
    Ok(Json(ComposerSendResponse { message, composer }))
}
