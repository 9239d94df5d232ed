//! The hosted backend the client talks to: an auth service plus row storage
//! for the `users`, `chats`, `chat_participants` and `messages` tables.

pub mod memory;
pub mod policy;
pub mod query;
pub mod rest;
pub mod token;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::{
    error::{AppError, Result},
    models::{AuthEvent, Identity, Session},
};

pub use memory::MemoryService;
pub use query::{Direction, Query, Table};
pub use rest::RestConnector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Facebook,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
            OAuthProvider::Apple => "apple",
        }
    }
}

/// One client's handle on the backend. Each handle carries its own auth
/// session, so two handles never share a signed-in identity.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current session held by this handle, if any.
    async fn get_session(&self) -> Result<Option<Session>>;

    /// Auth state changes of this handle.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Returns `None` when the account was created but awaits confirmation,
    /// in which case no session is established.
    async fn sign_up(&self, email: &str, password: &str, full_name: &str)
        -> Result<Option<Identity>>;

    async fn sign_out(&self) -> Result<()>;

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str) -> Result<String>;

    async fn update_password(&self, password: &str) -> Result<Identity>;

    async fn reset_password_for_email(&self, email: &str) -> Result<()>;

    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Exactly one row, or `NotFound`.
    async fn select_single(&self, query: &Query) -> Result<Value>;

    /// Inserts all rows atomically and returns them as stored.
    async fn insert(&self, table: Table, rows: Vec<Value>) -> Result<Vec<Value>>;
}

/// Opens a fresh backend handle for each client context.
pub trait BackendConnector: Send + Sync {
    fn connect(&self) -> Arc<dyn Backend>;
}

impl dyn Backend {
    pub async fn fetch_all<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        self.select(query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .collect()
    }

    pub async fn fetch_one<T: DeserializeOwned>(&self, query: &Query) -> Result<T> {
        let row = self.select_single(query).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn insert_rows<T, R>(&self, table: Table, rows: &[T]) -> Result<Vec<R>>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let rows = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.insert(table, rows)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(AppError::from))
            .collect()
    }

    pub async fn insert_one<T, R>(&self, table: Table, row: &T) -> Result<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        self.insert_rows(table, std::slice::from_ref(row))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Backend {
                status: 500,
                message: format!("insert into {} returned no row", table),
            })
    }
}
