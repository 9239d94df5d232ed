use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Redirect, Sse,
    },
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use validator::Validate;

use super::{
    session_dto::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, ResetPasswordRequest},
    SessionStore,
};
use crate::{
    backend::OAuthProvider,
    context::ClientContext,
    error::Result,
    middleware::AuthClient,
    models::Identity,
    state::AppState,
};

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let context = ClientContext::open(state.connector.as_ref(), &state.config.app_origin).await?;
    let user = context
        .session
        .sign_in_with_credentials(&payload.email, &payload.password)
        .await?;
    let token = state.clients.insert(user.id, context);

    Ok(Json(AuthResponse { token, user }))
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered and signed in", body = AuthResponse),
        (status = 202, description = "Account awaits email confirmation", body = MessageResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let context = ClientContext::open(state.connector.as_ref(), &state.config.app_origin).await?;
    let registered = context
        .session
        .register(&payload.email, &payload.password, payload.full_name.trim())
        .await?;

    match registered {
        Some(user) => {
            let token = state.clients.insert(user.id, context);
            Ok((StatusCode::CREATED, Json(AuthResponse { token, user })).into_response())
        }
        None => Ok((
            StatusCode::ACCEPTED,
            Json(MessageResponse::new("Check your email to confirm your account")),
        )
            .into_response()),
    }
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let session = SessionStore::new(state.connector.connect(), &state.config.app_origin);
    session.reset_password(payload.email.trim()).await?;

    Ok(Json(MessageResponse::new(
        "Password reset instructions sent to your email",
    )))
}

/// Start an external identity provider flow
#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}",
    params(
        ("provider" = OAuthProvider, Path, description = "google, facebook or apple")
    ),
    responses(
        (status = 303, description = "Redirect to the provider"),
    ),
    tag = "auth"
)]
pub async fn oauth_sign_in(
    State(state): State<AppState>,
    Path(provider): Path<OAuthProvider>,
) -> Result<Redirect> {
    let session = SessionStore::new(state.connector.connect(), &state.config.app_origin);
    let url = session.sign_in_with_provider(provider)?;

    Ok(Redirect::to(&url))
}

/// Sign out and close the client context
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthClient { token, context, .. }: AuthClient,
) -> Result<impl IntoResponse> {
    context.session.sign_out().await?;
    state.clients.remove(&token);

    Ok(Json(MessageResponse::new("Signed out")))
}

/// Current session identity
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Signed-in identity", body = Identity),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "auth"
)]
pub async fn get_session(AuthClient { identity, .. }: AuthClient) -> Json<Identity> {
    Json(identity)
}

/// Auth state changes of this client (SSE)
#[utoipa::path(
    get,
    path = "/api/session/events",
    responses(
        (status = 200, description = "Auth event stream established"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "auth"
)]
pub async fn session_events(
    AuthClient { context, .. }: AuthClient,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = context.session.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&event).ok()?;
            Some(Ok(Event::default().event("auth").data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
