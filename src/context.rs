//! Per-browser client state. Each signed-in browser gets its own backend
//! handle, stores and transient view state, addressed by an opaque token.

use dashmap::DashMap;
use serde::Serialize;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    backend::BackendConnector,
    composer::ComposerState,
    conversation::ConversationStore,
    error::Result,
    models::Contact,
    session::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Preferences {
    pub notifications: bool,
    pub dark_mode: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            dark_mode: false,
        }
    }
}

pub struct ClientContext {
    pub session: SessionStore,
    pub conversations: ConversationStore,
    pub composer: Mutex<ComposerState>,
    pub contact_result: Mutex<Option<Contact>>,
    pub preferences: Mutex<Preferences>,
}

impl ClientContext {
    /// Opens a backend handle, seeds the identity from any existing session
    /// and starts following auth state changes.
    pub async fn open(connector: &dyn BackendConnector, origin: &str) -> Result<Self> {
        let backend = connector.connect();
        let session = SessionStore::new(backend.clone(), origin);
        session.restore().await?;
        session.listen();

        Ok(Self {
            session,
            conversations: ConversationStore::new(backend),
            composer: Mutex::new(ComposerState::default()),
            contact_result: Mutex::new(None),
            preferences: Mutex::new(Preferences::default()),
        })
    }
}

/// Open contexts kept per user; logging in again drops the oldest.
pub const MAX_CONTEXTS_PER_USER: usize = 5;

#[derive(Clone, Default)]
pub struct ClientRegistry {
    contexts: Arc<DashMap<String, Arc<ClientContext>>>,
    owners: Arc<DashMap<Uuid, VecDeque<String>>>,
}

impl ClientRegistry {
    /// Stores the context under a fresh token owned by `owner`.
    pub fn insert(&self, owner: Uuid, context: ClientContext) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.contexts.insert(token.clone(), Arc::new(context));

        let evicted: Vec<String> = {
            let mut tokens = self.owners.entry(owner).or_default();
            tokens.push_back(token.clone());
            let excess = tokens.len().saturating_sub(MAX_CONTEXTS_PER_USER);
            tokens.drain(..excess).collect()
        };
        for stale in &evicted {
            self.contexts.remove(stale);
        }
        if !evicted.is_empty() {
            tracing::debug!(user_id = %owner, evicted = evicted.len(), "oldest client contexts dropped");
        }

        tracing::debug!(clients = self.len(), "client context opened");
        token
    }

    pub fn get(&self, token: &str) -> Option<Arc<ClientContext>> {
        self.contexts.get(token).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, token: &str) -> Option<Arc<ClientContext>> {
        let (_, context) = self.contexts.remove(token)?;
        self.owners.retain(|_, tokens| {
            tokens.retain(|t| t != token);
            !tokens.is_empty()
        });
        Some(context)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Drops every context whose session has ended, e.g. after a failed
    /// token refresh. Returns how many were dropped.
    pub async fn prune(&self) -> usize {
        let contexts: Vec<(String, Arc<ClientContext>)> = self
            .contexts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut pruned = 0;
        for (token, context) in contexts {
            if context.session.identity().await.is_none() {
                self.remove(&token);
                pruned += 1;
            }
        }

        if pruned > 0 {
            tracing::info!(pruned, clients = self.len(), "signed-out client contexts pruned");
        }
        pruned
    }
}

pub async fn start_context_sweeper(
    clients: ClientRegistry,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let scheduler = JobScheduler::new().await?;

    // Every minute
    let job = Job::new_async("0 * * * * *", move |_uuid, _l| {
        let clients = clients.clone();

        Box::pin(async move {
            clients.prune().await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!("Client context sweeper started");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryService;

    #[tokio::test]
    async fn test_registry_round_trip() {
        let service = MemoryService::with_cost("secret", 4);
        let registry = ClientRegistry::default();

        let context = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
        assert!(context.session.identity().await.is_none());

        let token = registry.insert(Uuid::new_v4(), context);
        assert!(registry.get(&token).is_some());
        assert_eq!(registry.len(), 1);

        registry.remove(&token);
        assert!(registry.get(&token).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_repeated_logins_keep_contexts_bounded() {
        let service = MemoryService::with_cost("secret", 4);
        let registry = ClientRegistry::default();

        let context = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
        let user = context
            .session
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap()
            .unwrap();
        let first = registry.insert(user.id, context);

        let mut tokens = Vec::new();
        for _ in 0..50 {
            let context = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
            context
                .session
                .sign_in_with_credentials("alice@example.com", "password123")
                .await
                .unwrap();
            tokens.push(registry.insert(user.id, context));
        }

        assert_eq!(registry.len(), MAX_CONTEXTS_PER_USER);
        assert!(registry.get(&first).is_none());
        assert!(tokens
            .iter()
            .rev()
            .take(MAX_CONTEXTS_PER_USER)
            .all(|t| registry.get(t).is_some()));

        // Another user's contexts are counted separately.
        let other = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
        registry.insert(Uuid::new_v4(), other);
        assert_eq!(registry.len(), MAX_CONTEXTS_PER_USER + 1);
    }

    #[tokio::test]
    async fn test_prune_drops_signed_out_contexts() {
        let service = MemoryService::with_cost("secret", 4);
        let registry = ClientRegistry::default();

        let alice = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
        let alice_id = alice
            .session
            .register("alice@example.com", "password123", "Alice")
            .await
            .unwrap()
            .unwrap()
            .id;
        let bob = ClientContext::open(&service, "http://localhost:5173").await.unwrap();
        let bob_id = bob
            .session
            .register("bob@example.com", "password123", "Bob")
            .await
            .unwrap()
            .unwrap()
            .id;
        let alice_token = registry.insert(alice_id, alice);
        let bob_token = registry.insert(bob_id, bob);

        registry.get(&bob_token).unwrap().session.sign_out().await.unwrap();

        assert_eq!(registry.prune().await, 1);
        assert!(registry.get(&alice_token).is_some());
        assert!(registry.get(&bob_token).is_none());
        assert_eq!(registry.prune().await, 0);
    }

    #[test]
    fn test_default_preferences() {
        let preferences = Preferences::default();
        assert!(preferences.notifications);
        assert!(!preferences.dark_mode);
    }
}
