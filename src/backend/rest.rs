//! HTTP client for the hosted backend: `/auth/v1` for the auth service and
//! `/rest/v1/<table>` for rows.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use super::{
    query::{Query, Table},
    Backend, BackendConnector, OAuthProvider,
};
use crate::{
    error::{AppError, Result},
    models::{AuthEvent, Identity, Session},
};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
/// Refresh this long before the access token lapses.
const REFRESH_MARGIN_SECS: i64 = 10;

/// Shared HTTP pool and service coordinates; hands out one
/// [`RestBackend`] per client context.
#[derive(Clone)]
pub struct RestConnector {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl RestConnector {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

impl BackendConnector for RestConnector {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(RestBackend::new(self.clone()))
    }
}

pub struct RestBackend {
    conn: RestConnector,
    session: RwLock<Option<Session>>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

fn needs_refresh(session: &Session, now: i64) -> bool {
    session
        .expires_at
        .is_some_and(|expires_at| expires_at - REFRESH_MARGIN_SECS <= now)
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Sign-up answers with a full session when confirmation is disabled and
/// with the bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Session),
    User(Identity),
}

enum Service {
    Auth,
    Rows,
}

impl RestBackend {
    pub fn new(conn: RestConnector) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            conn,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.conn.base_url, path)
    }

    fn rows_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.conn.base_url, table)
    }

    async fn request(&self, method: Method, url: String) -> RequestBuilder {
        let bearer = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.conn.anon_key.clone());

        self.conn
            .http
            .request(method, url)
            .header("apikey", &self.conn.anon_key)
            .bearer_auth(bearer)
    }

    /// Like [`RestBackend::request`], after refreshing a session that is
    /// about to lapse.
    async fn authorized(&self, method: Method, url: String) -> Result<RequestBuilder> {
        let stale = self
            .session
            .read()
            .await
            .as_ref()
            .filter(|session| needs_refresh(session, Utc::now().timestamp()))
            .map(|session| session.access_token.clone());

        if let Some(stale) = stale {
            self.refresh_session(&stale).await?;
        }

        Ok(self.request(method, url).await)
    }

    async fn refresh_session(&self, stale: &str) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.session.read().await.clone();
        let Some(current) = current.filter(|session| session.access_token == stale) else {
            // Refreshed or signed out by a concurrent request.
            return Ok(());
        };
        let Some(refresh_token) = current.refresh_token else {
            self.end_session().await;
            return Err(AppError::Authentication("Session expired".into()));
        };

        let builder = self
            .conn
            .http
            .post(self.auth_url("token"))
            .header("apikey", &self.conn.anon_key)
            .bearer_auth(&self.conn.anon_key)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));

        match self.send(Service::Auth, builder).await {
            Ok(response) => {
                let session: Session = response.json().await?;
                let identity = session.user.clone();
                *self.session.write().await = Some(session);
                let _ = self.events.send(AuthEvent::TokenRefreshed(identity));
                tracing::debug!("session refreshed");
                Ok(())
            }
            Err(AppError::Authentication(message)) | Err(AppError::Validation(message)) => {
                self.end_session().await;
                Err(AppError::Authentication(message))
            }
            Err(e) => Err(e),
        }
    }

    async fn end_session(&self) {
        *self.session.write().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        tracing::info!("backend rejected the session, signed out");
    }

    /// Row requests; a 401 on a signed-in handle means the session is gone.
    async fn send_rows(&self, builder: RequestBuilder) -> Result<Response> {
        let result = self.send(Service::Rows, builder).await;

        if let Err(AppError::Unauthorized(_)) = &result {
            let signed_in = self.session.read().await.is_some();
            if signed_in {
                self.end_session().await;
                return Err(AppError::Authentication("Session expired".into()));
            }
        }

        result
    }

    async fn send(&self, service: Service, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or(text);
        tracing::warn!(status = status.as_u16(), %message, "backend request failed");

        Err(match (service, status) {
            (Service::Auth, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) => {
                AppError::Authentication(message)
            }
            (Service::Auth, StatusCode::UNPROCESSABLE_ENTITY) => AppError::Validation(message),
            (Service::Rows, StatusCode::NOT_ACCEPTABLE) => AppError::NotFound(message),
            (Service::Rows, StatusCode::UNAUTHORIZED) => AppError::Unauthorized(message),
            (_, StatusCode::FORBIDDEN) => AppError::Forbidden(message),
            _ => AppError::Backend {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn store_session(&self, session: Session) {
        let identity = session.user.clone();
        *self.session.write().await = Some(session);
        let _ = self.events.send(AuthEvent::SignedIn(identity));
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let builder = self
            .request(Method::POST, self.auth_url("token"))
            .await
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));

        let session: Session = self.send(Service::Auth, builder).await?.json().await?;
        self.store_session(session.clone()).await;

        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<Identity>> {
        let builder = self
            .request(Method::POST, self.auth_url("signup"))
            .await
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name },
            }));

        match self.send(Service::Auth, builder).await?.json::<SignUpResponse>().await? {
            SignUpResponse::Session(session) => {
                let identity = session.user.clone();
                self.store_session(session).await;
                Ok(Some(identity))
            }
            SignUpResponse::User(identity) => {
                tracing::info!(user_id = %identity.id, "sign-up awaiting email confirmation");
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let signed_in = self.session.read().await.is_some();
        if signed_in {
            let builder = self.request(Method::POST, self.auth_url("logout")).await;
            if let Err(e) = self.send(Service::Auth, builder).await {
                tracing::warn!("logout call failed, clearing the session anyway: {}", e);
            }
        }

        *self.session.write().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String> {
        reqwest::Url::parse_with_params(
            &self.auth_url("authorize"),
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map(String::from)
        .map_err(|e| AppError::Config(format!("invalid authorize url: {}", e)))
    }

    async fn update_password(&self, password: &str) -> Result<Identity> {
        if self.session.read().await.is_none() {
            return Err(AppError::Authentication("Auth session missing!".into()));
        }

        let builder = self
            .authorized(Method::PUT, self.auth_url("user"))
            .await?
            .json(&json!({ "password": password }));
        let identity: Identity = self.send(Service::Auth, builder).await?.json().await?;

        if let Some(session) = self.session.write().await.as_mut() {
            session.user = identity.clone();
        }
        let _ = self.events.send(AuthEvent::UserUpdated(identity.clone()));

        Ok(identity)
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        let builder = self
            .request(Method::POST, self.auth_url("recover"))
            .await
            .json(&json!({ "email": email }));
        self.send(Service::Auth, builder).await?;
        Ok(())
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        tracing::debug!(table = %query.table, "backend: select");
        let builder = self
            .authorized(Method::GET, self.rows_url(query.table))
            .await?
            .query(&query.to_params());

        Ok(self.send_rows(builder).await?.json().await?)
    }

    async fn select_single(&self, query: &Query) -> Result<Value> {
        tracing::debug!(table = %query.table, "backend: select single");
        let builder = self
            .authorized(Method::GET, self.rows_url(query.table))
            .await?
            .query(&query.to_params())
            .header(header::ACCEPT, SINGLE_OBJECT);

        Ok(self.send_rows(builder).await?.json().await?)
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        tracing::debug!(%table, rows = rows.len(), "backend: insert");
        let builder = self
            .authorized(Method::POST, self.rows_url(table))
            .await?
            .header("Prefer", "return=representation")
            .json(&rows);

        Ok(self.send_rows(builder).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> RestBackend {
        RestBackend::new(RestConnector::new("https://project.example.co/", "anon-key"))
    }

    #[test]
    fn test_urls_strip_trailing_slash() {
        let backend = backend();
        assert_eq!(
            backend.rows_url(Table::ChatParticipants),
            "https://project.example.co/rest/v1/chat_participants"
        );
        assert_eq!(
            backend.auth_url("token"),
            "https://project.example.co/auth/v1/token"
        );
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let url = backend()
            .authorize_url(OAuthProvider::Google, "http://localhost:5173/chat")
            .unwrap();
        assert_eq!(
            url,
            "https://project.example.co/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A5173%2Fchat"
        );
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let user = json!({
            "id": "7d4e1b9c-6f0a-4a53-9a1e-2b6f3c7d8e90",
            "email": "a@example.com",
            "user_metadata": { "full_name": "A" }
        });

        let pending: SignUpResponse = serde_json::from_value(user.clone()).unwrap();
        assert!(matches!(pending, SignUpResponse::User(_)));

        let active: SignUpResponse = serde_json::from_value(json!({
            "access_token": "token",
            "refresh_token": "refresh",
            "user": user,
        }))
        .unwrap();
        assert!(matches!(active, SignUpResponse::Session(_)));
    }

    #[test]
    fn test_error_body_prefers_msg() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));
    }
    #[test]
    fn test_session_refreshes_shortly_before_expiry() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "token",
            "refresh_token": "refresh",
            "expires_at": 1_700_000_000,
            "user": { "id": "7d4e1b9c-6f0a-4a53-9a1e-2b6f3c7d8e90" }
        }))
        .unwrap();

        assert!(!needs_refresh(&session, 1_700_000_000 - 60));
        assert!(needs_refresh(&session, 1_700_000_000 - 5));
        assert!(needs_refresh(&session, 1_700_000_000 + 3600));

        let open_ended = Session {
            expires_at: None,
            ..session
        };
        assert!(!needs_refresh(&open_ended, i64::MAX));
    }

    #[tokio::test]
    async fn test_rows_without_session_skip_refresh() {
        let backend = backend();
        let builder = backend
            .authorized(Method::GET, backend.rows_url(Table::Chats))
            .await
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(builder.headers()["authorization"], "Bearer anon-key");
    }
}
