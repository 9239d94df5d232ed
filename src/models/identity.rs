use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The authenticated user as reported by the backend's auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserMetadata {
    pub full_name: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> &str {
        self.user_metadata
            .full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix time at which the access token lapses.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

/// Auth state changes emitted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "user", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn(Identity),
    SignedOut,
    UserUpdated(Identity),
    TokenRefreshed(Identity),
    /// The recovery link signs the user in so a new password can be set.
    PasswordRecovery(Identity),
}

impl AuthEvent {
    /// Identity the session store should hold after this event.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            AuthEvent::SignedIn(identity)
            | AuthEvent::UserUpdated(identity)
            | AuthEvent::TokenRefreshed(identity)
            | AuthEvent::PasswordRecovery(identity) => Some(identity.clone()),
            AuthEvent::SignedOut => None,
        }
    }
}
