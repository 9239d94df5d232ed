use crate::{context::ClientContext, error::AppError, models::Identity, state::AppState};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Resolves the bearer token to a client context that holds a signed-in
/// identity.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or(AppError::Unauthorized("Not signed in".to_string()))?
        .to_string();

    let context = state
        .clients
        .get(&token)
        .ok_or(AppError::Unauthorized("Not signed in".to_string()))?;

    let identity = context
        .session
        .identity()
        .await
        .ok_or(AppError::Unauthorized("Session expired".to_string()))?;

    req.extensions_mut().insert(AuthClient {
        token,
        context,
        identity,
    });

    Ok(next.run(req).await)
}

// Extractor for the client resolved by the middleware
#[derive(Clone)]
pub struct AuthClient {
    pub token: String,
    pub context: Arc<ClientContext>,
    pub identity: Identity,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthClient
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthClient>()
            .cloned()
            .ok_or(AppError::Unauthorized("Not signed in".to_string()))
    }
}
