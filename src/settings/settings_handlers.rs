use axum::Json;
use validator::Validate;

use super::settings_dto::{ChangePasswordRequest, SettingsResponse, UpdatePreferencesRequest};
use crate::{
    context::{ClientContext, Preferences},
    error::Result,
    middleware::AuthClient,
    session::session_dto::MessageResponse,
};

async fn settings_view(context: &ClientContext) -> SettingsResponse {
    let email = context
        .session
        .identity()
        .await
        .and_then(|identity| identity.email);
    let Preferences {
        notifications,
        dark_mode,
    } = *context.preferences.lock().await;

    SettingsResponse {
        email,
        notifications,
        dark_mode,
    }
}

/// Profile email and local preferences
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_settings(client: AuthClient) -> Json<SettingsResponse> {
    Json(settings_view(&client.context).await)
}

/// Change the password of the signed-in identity
#[utoipa::path(
    put,
    path = "/api/settings/password",
    tag = "settings",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Confirmation mismatch or invalid password"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn change_password(
    client: AuthClient,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let new_password = payload.confirmed()?;
    payload.validate()?;

    client.context.session.update_password(new_password).await?;
    tracing::info!(user_id = %client.identity.id, "password updated");

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

/// Toggle notifications or dark mode; neither is persisted
#[utoipa::path(
    patch,
    path = "/api/settings/preferences",
    tag = "settings",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Updated settings", body = SettingsResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_preferences(
    client: AuthClient,
    Json(payload): Json<UpdatePreferencesRequest>,
) -> Json<SettingsResponse> {
    {
        let mut preferences = client.context.preferences.lock().await;
        if let Some(notifications) = payload.notifications {
            preferences.notifications = notifications;
        }
        if let Some(dark_mode) = payload.dark_mode {
            preferences.dark_mode = dark_mode;
        }
    }

    Json(settings_view(&client.context).await)
}
