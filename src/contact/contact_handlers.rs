use axum::{http::StatusCode, response::IntoResponse, Json};

use super::contact_dto::{AddContactResponse, ContactSearchRequest, ContactSearchResponse};
use crate::{
    error::{AppError, Result},
    middleware::AuthClient,
};

/// Look up another user by exact email
#[utoipa::path(
    post,
    path = "/api/contacts/search",
    tag = "contacts",
    request_body = ContactSearchRequest,
    responses(
        (status = 200, description = "Matching user, or none for a blank email", body = ContactSearchResponse),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn search_contact(
    client: AuthClient,
    Json(payload): Json<ContactSearchRequest>,
) -> Result<Json<ContactSearchResponse>> {
    let found = client
        .context
        .conversations
        .search_contact(&payload.email)
        .await;

    let mut result = client.context.contact_result.lock().await;
    match found {
        Ok(contact) => {
            *result = contact.clone();
            Ok(Json(ContactSearchResponse { contact }))
        }
        Err(e) => {
            *result = None;
            Err(e)
        }
    }
}

/// Open a direct chat with the last contact found
#[utoipa::path(
    post,
    path = "/api/contacts/add",
    tag = "contacts",
    responses(
        (status = 201, description = "Chat created", body = AddContactResponse),
        (status = 400, description = "No contact searched yet"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn add_contact(client: AuthClient) -> Result<impl IntoResponse> {
    let contact = client
        .context
        .contact_result
        .lock()
        .await
        .clone()
        .ok_or(AppError::Validation("Search for a contact first".to_string()))?;

    let chat = client
        .context
        .conversations
        .create_chat(&[contact.id], None)
        .await
        .map_err(|e| {
            tracing::warn!(contact_id = %contact.id, "add contact failed: {}", e);
            e
        })?
        .ok_or(AppError::Unauthorized("Not signed in".to_string()))?;

    *client.context.contact_result.lock().await = None;

    Ok((
        StatusCode::CREATED,
        Json(AddContactResponse {
            message: "Chat created successfully".to_string(),
            chat,
        }),
    ))
}
