//! In-process stand-in for the hosted backend. It keeps the four tables in
//! memory and reproduces the service-side behaviour the client depends on:
//! column defaults, key constraints, row-level access rules, password
//! hashing, signed access tokens and the last-message denormalization that
//! runs when a message is inserted.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use std::{cmp::Ordering, sync::Arc};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use super::{
    policy::{uuid_field, AccessPolicy, Memberships, Operation},
    query::{Direction, Query, Table},
    token::{create_token, verify_access_token, ACCESS_TOKEN_TTL_MINUTES},
    Backend, BackendConnector, OAuthProvider,
};
use crate::{
    error::{AppError, Result},
    models::{identity::UserMetadata, AuthEvent, Identity, Session},
};

pub const MEMORY_AUTH_URL: &str = "http://localhost:54321";
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    identity: Identity,
    password_hash: String,
}

struct ServiceState {
    tables: DashMap<Table, Vec<Value>>,
    accounts: DashMap<String, Account>,
    recovery_requests: DashMap<String, DateTime<Utc>>,
    // Outstanding refresh tokens; each is good for one refresh.
    refresh_tokens: DashMap<String, Uuid>,
    access_ttl: Duration,
    policy: AccessPolicy,
    jwt_secret: String,
    bcrypt_cost: u32,
}

/// The shared service; every [`MemoryBackend`] handle talks to one of these.
#[derive(Clone)]
pub struct MemoryService {
    inner: Arc<ServiceState>,
}

impl MemoryService {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self::with_cost(jwt_secret, bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(jwt_secret: impl Into<String>, bcrypt_cost: u32) -> Self {
        Self {
            inner: Arc::new(ServiceState {
                tables: DashMap::new(),
                accounts: DashMap::new(),
                recovery_requests: DashMap::new(),
                refresh_tokens: DashMap::new(),
                access_ttl: Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
                policy: AccessPolicy,
                jwt_secret: jwt_secret.into(),
                bcrypt_cost,
            }),
        }
    }

    pub fn handle(&self) -> MemoryBackend {
        MemoryBackend::new(self.clone())
    }

    // Snapshots are taken before any table entry is locked for writing,
    // since two tables may share a shard.
    fn snapshot(&self, table: Table) -> Vec<Value> {
        self.inner
            .tables
            .get(&table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    fn memberships(&self) -> Memberships {
        Memberships::from_rows(&self.snapshot(Table::ChatParticipants))
    }

    #[cfg(test)]
    pub fn recovery_requested(&self, email: &str) -> bool {
        self.inner
            .recovery_requests
            .contains_key(&normalize_email(email))
    }

    /// Invalidates every refresh token, as a server-side session revocation
    /// would.
    #[cfg(test)]
    pub fn revoke_refresh_tokens(&self) {
        self.inner.refresh_tokens.clear();
    }

    /// All rows of a table, bypassing access rules.
    #[cfg(test)]
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.snapshot(table)
    }
}

impl BackendConnector for MemoryService {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.handle())
    }
}

pub struct MemoryBackend {
    service: MemoryService,
    session: RwLock<Option<Session>>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryBackend {
    pub fn new(service: MemoryService) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            service,
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    fn state(&self) -> &ServiceState {
        &self.service.inner
    }

    /// Id of the signed-in caller. An expired access token is refreshed
    /// first; a failed refresh ends the session.
    async fn caller(&self) -> Result<Option<Uuid>> {
        let Some(session) = self.session.read().await.clone() else {
            return Ok(None);
        };

        match verify_access_token(&session.access_token, &self.state().jwt_secret) {
            Ok(id) => Ok(Some(id)),
            Err(AppError::Authentication(_)) => {
                let refreshed = self.refresh(&session.access_token).await?;
                Ok(Some(refreshed.user.id))
            }
            Err(e) => Err(e),
        }
    }

    fn issue(&self, identity: Identity) -> Result<Session> {
        let ttl = self.state().access_ttl;
        let access_token = create_token(
            identity.id,
            identity.email.as_deref().unwrap_or_default(),
            &self.state().jwt_secret,
            ttl,
        )?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.state()
            .refresh_tokens
            .insert(refresh_token.clone(), identity.id);

        Ok(Session {
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: Some((Utc::now() + ttl).timestamp()),
            user: identity,
        })
    }

    async fn establish(&self, identity: Identity) -> Result<Session> {
        let session = self.issue(identity.clone())?;

        *self.session.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(identity));

        Ok(session)
    }

    /// Trades the refresh token for a new session. `stale` is the access
    /// token the caller saw expire; if another request already replaced it,
    /// that session is returned as is.
    async fn refresh(&self, stale: &str) -> Result<Session> {
        let _guard = self.refresh_lock.lock().await;

        let Some(current) = self.session.read().await.clone() else {
            return Err(AppError::Authentication("Auth session missing!".into()));
        };
        if current.access_token != stale {
            return Ok(current);
        }

        let identity = current
            .refresh_token
            .as_deref()
            .and_then(|token| self.state().refresh_tokens.remove(token))
            .and_then(|(_, user_id)| {
                self.state()
                    .accounts
                    .iter()
                    .find(|account| account.identity.id == user_id)
                    .map(|account| account.identity.clone())
            });

        let Some(identity) = identity else {
            tracing::warn!(user_id = %current.user.id, "memory backend: refresh token rejected, signing out");
            *self.session.write().await = None;
            let _ = self.events.send(AuthEvent::SignedOut);
            return Err(AppError::Authentication(
                "Invalid Refresh Token: Refresh Token Not Found".into(),
            ));
        };

        let session = self.issue(identity.clone())?;
        *self.session.write().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::TokenRefreshed(identity));
        tracing::debug!(user_id = %session.user.id, "memory backend: session refreshed");

        Ok(session)
    }

    /// Swaps the access token for one that expired five minutes ago.
    #[cfg(test)]
    pub async fn expire_access_token(&self) {
        let mut session = self.session.write().await;
        if let Some(session) = session.as_mut() {
            session.access_token = create_token(
                session.user.id,
                session.user.email.as_deref().unwrap_or_default(),
                &self.state().jwt_secret,
                Duration::minutes(-5),
            )
            .unwrap();
            session.expires_at = Some((Utc::now() - Duration::minutes(5)).timestamp());
        }
    }

    fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(password, self.state().bcrypt_cost).map_err(|_| AppError::InternalError)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let account = self
            .state()
            .accounts
            .get(&normalize_email(email))
            .map(|account| account.clone())
            .ok_or_else(|| AppError::Authentication("Invalid login credentials".into()))?;

        let valid = bcrypt::verify(password, &account.password_hash)
            .map_err(|_| AppError::InternalError)?;
        if !valid {
            return Err(AppError::Authentication("Invalid login credentials".into()));
        }

        tracing::debug!(user_id = %account.identity.id, "memory backend: password sign-in");
        self.establish(account.identity).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<Identity>> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let key = normalize_email(email);
        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
            user_metadata: UserMetadata {
                full_name: Some(full_name.to_string()),
            },
        };
        let password_hash = self.hash(password)?;

        match self.state().accounts.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(AppError::Authentication("User already registered".into()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Account {
                    identity: identity.clone(),
                    password_hash,
                });
            }
        }

        tracing::debug!(user_id = %identity.id, "memory backend: account created");
        self.establish(identity.clone()).await?;

        Ok(Some(identity))
    }

    async fn sign_out(&self) -> Result<()> {
        let ended = self.session.write().await.take();
        if let Some(refresh_token) = ended.and_then(|session| session.refresh_token) {
            self.state().refresh_tokens.remove(&refresh_token);
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String> {
        reqwest::Url::parse_with_params(
            &format!("{}/auth/v1/authorize", MEMORY_AUTH_URL),
            &[("provider", provider.as_str()), ("redirect_to", redirect_to)],
        )
        .map(String::from)
        .map_err(|e| AppError::Config(format!("invalid authorize url: {}", e)))
    }

    async fn update_password(&self, password: &str) -> Result<Identity> {
        let caller = self
            .caller()
            .await?
            .ok_or_else(|| AppError::Authentication("Auth session missing!".into()))?;

        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        let password_hash = self.hash(password)?;

        let mut account = self
            .state()
            .accounts
            .iter_mut()
            .find(|account| account.identity.id == caller)
            .ok_or_else(|| AppError::Authentication("User not found".into()))?;
        account.password_hash = password_hash;
        let identity = account.identity.clone();
        drop(account);

        let _ = self.events.send(AuthEvent::UserUpdated(identity.clone()));
        Ok(identity)
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<()> {
        // The service answers the same whether or not the account exists.
        self.state()
            .recovery_requests
            .insert(normalize_email(email), Utc::now());
        tracing::info!("memory backend: password recovery requested");
        Ok(())
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let caller = self.caller().await?;
        let memberships = self.service.memberships();
        let policy = self.state().policy;

        let mut rows: Vec<Value> = self
            .service
            .snapshot(query.table)
            .into_iter()
            .filter(|row| query.matches(row))
            .filter(|row| policy.allows(query.table, Operation::Select, row, caller, &memberships))
            .collect();

        if let Some((column, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(a.get(column), b.get(column));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        tracing::debug!(table = %query.table, rows = rows.len(), "memory backend: select");
        Ok(rows.iter().map(|row| query.project(row)).collect())
    }

    async fn select_single(&self, query: &Query) -> Result<Value> {
        let mut rows = self.select(query).await?;
        if rows.len() != 1 {
            return Err(AppError::NotFound(
                "JSON object requested, multiple (or no) rows returned".into(),
            ));
        }
        Ok(rows.remove(0))
    }

    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>> {
        let caller = self.caller().await?;
        let memberships = self.service.memberships();
        let policy = self.state().policy;
        let chats = self.service.snapshot(Table::Chats);
        let users = self.service.snapshot(Table::Users);

        let now = timestamp();
        let rows = rows
            .into_iter()
            .map(|row| with_defaults(table, row, &now))
            .collect::<Result<Vec<_>>>()?;

        for row in &rows {
            if !policy.allows(table, Operation::Insert, row, caller, &memberships) {
                return Err(AppError::Forbidden(format!(
                    "new row violates row-level security policy for table \"{}\"",
                    table
                )));
            }
            check_foreign_keys(table, row, &chats, &users)?;
        }

        {
            let mut stored = self.state().tables.entry(table).or_default();
            for (index, row) in rows.iter().enumerate() {
                let clashes = |other: &Value| unique_key(table, other) == unique_key(table, row);
                let email_clash = |other: &Value| {
                    table == Table::Users && other.get("email") == row.get("email")
                };
                if stored.iter().chain(rows[..index].iter()).any(|other| clashes(other) || email_clash(other)) {
                    return Err(AppError::Backend {
                        status: 409,
                        message: format!(
                            "duplicate key value violates unique constraint \"{}_pkey\"",
                            table
                        ),
                    });
                }
            }
            stored.extend(rows.iter().cloned());
        }

        if table == Table::Messages {
            self.refresh_last_message(&rows);
        }

        tracing::debug!(%table, rows = rows.len(), "memory backend: insert");
        Ok(rows)
    }
}

impl MemoryBackend {
    // Mirrors the service-side trigger that denormalizes the newest message
    // onto its chat.
    fn refresh_last_message(&self, messages: &[Value]) {
        let Some(mut chats) = self.state().tables.get_mut(&Table::Chats) else {
            return;
        };
        for message in messages {
            let chat_id = message.get("chat_id");
            if let Some(Value::Object(chat)) = chats.iter_mut().find(|chat| chat.get("id") == chat_id) {
                chat.insert("last_message".into(), message["content"].clone());
                chat.insert("last_message_at".into(), message["created_at"].clone());
            }
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn not_null(column: &str) -> AppError {
    AppError::Backend {
        status: 400,
        message: format!("null value in column \"{}\" violates not-null constraint", column),
    }
}

fn with_defaults(table: Table, row: Value, now: &str) -> Result<Value> {
    let Value::Object(mut map) = row else {
        return Err(AppError::Backend {
            status: 400,
            message: "row must be a JSON object".into(),
        });
    };

    let (required, defaults): (&[&str], Vec<(&str, Value)>) = match table {
        Table::Users => (
            &["id", "email", "full_name"],
            vec![
                ("avatar_url", Value::Null),
                ("status", json!("offline")),
                ("last_seen", json!(now)),
                ("created_at", json!(now)),
            ],
        ),
        Table::Chats => (
            &["type"],
            vec![
                ("id", json!(Uuid::new_v4())),
                ("name", Value::Null),
                ("created_at", json!(now)),
                ("last_message", Value::Null),
                ("last_message_at", Value::Null),
            ],
        ),
        Table::ChatParticipants => (
            &["chat_id", "user_id"],
            vec![("joined_at", json!(now))],
        ),
        Table::Messages => (
            &["sender_id", "chat_id", "content"],
            vec![
                ("id", json!(Uuid::new_v4())),
                ("type", json!("text")),
                ("created_at", json!(now)),
                ("read_by", json!([])),
            ],
        ),
    };

    for (column, value) in defaults {
        map.entry(column).or_insert(value);
    }
    if let Some(column) = required
        .iter()
        .find(|column| map.get(**column).map_or(true, Value::is_null))
    {
        return Err(not_null(column));
    }

    Ok(Value::Object(map))
}

fn unique_key(table: Table, row: &Value) -> Vec<Option<Value>> {
    let columns: &[&str] = match table {
        Table::ChatParticipants => &["chat_id", "user_id"],
        _ => &["id"],
    };
    columns.iter().map(|column| row.get(*column).cloned()).collect()
}

fn check_foreign_keys(table: Table, row: &Value, chats: &[Value], users: &[Value]) -> Result<()> {
    let references: Vec<(&str, &[Value])> = match table {
        Table::ChatParticipants => vec![("chat_id", chats), ("user_id", users)],
        Table::Messages => vec![("chat_id", chats), ("sender_id", users)],
        _ => Vec::new(),
    };

    for (column, targets) in references {
        let id = uuid_field(row, column);
        let exists = targets.iter().any(|target| id.is_some() && uuid_field(target, "id") == id);
        if !exists {
            return Err(AppError::Backend {
                status: 409,
                message: format!(
                    "insert or update on table \"{}\" violates foreign key constraint \"{}_{}_fkey\"",
                    table, table, column
                ),
            });
        }
    }

    Ok(())
}

/// Nulls sort after every value, as they do in the row service.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
