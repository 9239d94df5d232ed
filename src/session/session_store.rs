use std::sync::Arc;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        RwLock,
    },
    task::JoinHandle,
};

use crate::{
    backend::{Backend, OAuthProvider, Table},
    error::Result,
    models::{AuthEvent, Identity, NewUser, UserStatus},
};

/// The signed-in identity of one client, and the auth actions that change it.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    identity: Arc<RwLock<Option<Identity>>>,
    origin: String,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>, origin: &str) -> Self {
        Self {
            backend,
            identity: Arc::new(RwLock::new(None)),
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.identity.read().await.clone()
    }

    /// Seeds the identity from whatever session the backend already holds.
    pub async fn restore(&self) -> Result<Option<Identity>> {
        let identity = self.backend.get_session().await?.map(|session| session.user);
        self.set_identity(identity.clone()).await;
        Ok(identity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.backend.subscribe()
    }

    /// Forwards backend auth events into [`SessionStore::set_identity`]. The
    /// task ends once the backend handle is dropped.
    pub fn listen(&self) -> JoinHandle<()> {
        let mut events = self.backend.subscribe();
        let identity = self.identity.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(?event, "auth state changed");
                        *identity.write().await = event.identity();
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "auth listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// URL of the external identity flow; the provider sends the browser
    /// back to the conversation view.
    pub fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<String> {
        let redirect_to = format!("{}/chat", self.origin);
        self.backend.authorize_url(provider, &redirect_to)
    }

    pub async fn sign_in_with_credentials(&self, email: &str, password: &str) -> Result<Identity> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        self.set_identity(Some(session.user.clone())).await;

        tracing::info!(user_id = %session.user.id, name = session.user.display_name(), "signed in");
        Ok(session.user)
    }

    /// Creates the auth identity and its `users` row. Returns `None` when the
    /// backend holds the account for email confirmation.
    ///
    /// A failed row insert is returned as-is: the auth identity already
    /// exists at that point and is not rolled back.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Option<Identity>> {
        let Some(identity) = self.backend.sign_up(email, password, display_name).await? else {
            return Ok(None);
        };

        let row = NewUser {
            id: identity.id,
            email: email.to_string(),
            full_name: display_name.to_string(),
            status: UserStatus::Online,
        };
        if let Err(e) = self
            .backend
            .insert_one::<_, serde_json::Value>(Table::Users, &row)
            .await
        {
            tracing::error!(user_id = %identity.id, "user row insert failed after sign-up: {}", e);
            return Err(e);
        }

        self.set_identity(Some(identity.clone())).await;
        tracing::info!(user_id = %identity.id, "registered");

        Ok(Some(identity))
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.backend.sign_out().await?;
        self.set_identity(None).await;
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<()> {
        self.backend.reset_password_for_email(email).await
    }

    pub async fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.write().await = identity;
    }

    pub async fn update_password(&self, new_password: &str) -> Result<()> {
        let identity = self.backend.update_password(new_password).await?;
        self.set_identity(Some(identity)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MemoryService, Query},
        error::AppError,
    };
    use serde_json::Value;
    use std::time::Duration;

    fn store(service: &MemoryService) -> SessionStore {
        SessionStore::new(Arc::new(service.handle()), "http://localhost:5173/")
    }

    #[tokio::test]
    async fn test_register_identity_matches_user_row() {
        let service = MemoryService::with_cost("secret", 4);
        let session = store(&service);

        let identity = session
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap()
            .unwrap();

        let backend: Arc<dyn Backend> = Arc::new(service.handle());
        backend
            .sign_in_with_password("alice@example.com", "password123")
            .await
            .unwrap();
        let user: Value = backend
            .fetch_one(&Query::from(Table::Users).eq("email", "alice@example.com"))
            .await
            .unwrap();

        assert_eq!(user["id"], identity.id.to_string());
        assert_eq!(user["status"], "online");
        assert_eq!(user["full_name"], "Alice");
        assert_eq!(session.identity().await, Some(identity));
    }

    #[tokio::test]
    async fn test_failed_sign_up_has_no_side_effect() {
        let service = MemoryService::with_cost("secret", 4);
        let session = store(&service);

        let result = session.register("alice@example.com", "short", "Alice").await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(session.identity().await.is_none());
        assert!(service.rows(Table::Users).is_empty());
    }

    #[tokio::test]
    async fn test_bad_credentials_leave_identity_unset() {
        let service = MemoryService::with_cost("secret", 4);
        store(&service)
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        let session = store(&service);
        let result = session
            .sign_in_with_credentials("alice@example.com", "nope-nope")
            .await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
        assert!(session.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_identity() {
        let service = MemoryService::with_cost("secret", 4);
        let session = store(&service);
        session
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap();

        session.sign_out().await.unwrap();

        assert!(session.identity().await.is_none());
        assert!(session.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_redirects_back_to_chat() {
        let service = MemoryService::with_cost("secret", 4);
        let url = store(&service)
            .sign_in_with_provider(OAuthProvider::Apple)
            .unwrap();

        assert!(url.contains("provider=apple"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A5173%2Fchat"));
    }

    #[tokio::test]
    async fn test_reset_password_reaches_backend() {
        let service = MemoryService::with_cost("secret", 4);
        store(&service)
            .reset_password("alice@example.com")
            .await
            .unwrap();

        assert!(service.recovery_requested("alice@example.com"));
    }

    #[tokio::test]
    async fn test_listener_follows_backend_events() {
        let service = MemoryService::with_cost("secret", 4);
        let backend = Arc::new(service.handle());
        let session = SessionStore::new(backend.clone(), "http://localhost:5173");
        let listener = session.listen();

        backend
            .sign_up("alice@example.com", "password123", "Alice")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.identity().await.is_some());

        backend.sign_out().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.identity().await.is_none());

        drop(session);
        drop(backend);
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_or_signed_out() {
        let service = MemoryService::with_cost("secret", 4);
        let backend = Arc::new(service.handle());
        let session = SessionStore::new(backend.clone(), "http://localhost:5173");
        let _listener = session.listen();
        session
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap();
        let rows: Arc<dyn Backend> = backend.clone();

        backend.expire_access_token().await;
        rows.select(&Query::from(Table::Users)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(session.identity().await.is_some());

        service.revoke_refresh_tokens();
        backend.expire_access_token().await;
        let result = rows.select(&Query::from(Table::Users)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(result, Err(AppError::Authentication(_))));
        assert!(session.identity().await.is_none());
    }

    #[test]
    fn test_password_recovery_event_signs_in() {
        let identity = Identity {
            id: uuid::Uuid::new_v4(),
            email: Some("alice@example.com".to_string()),
            user_metadata: Default::default(),
        };

        assert_eq!(
            AuthEvent::PasswordRecovery(identity.clone()).identity(),
            Some(identity)
        );
        assert_eq!(AuthEvent::SignedOut.identity(), None);
    }
}
