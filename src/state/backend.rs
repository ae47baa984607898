use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::models::StoreError;
use super::mutation::StateMutation;
use super::postgres::{PostgresActionStore, PostgresKvStore, PostgresSetStore, PostgresTreeStore};
use super::repository::{
    ActionStore, InMemoryActionStore, InMemoryKvStore, InMemorySetStore, InMemoryTreeStore,
    KvStore, SetStore, TreeStore,
};
use sqlx::PgPool;

/// Where a hub's state mutations end up
#[async_trait]
pub trait StateBackend: Send + Sync + 'static {
    async fn apply(&self, mutation: StateMutation) -> Result<(), StoreError>;
}

/// Backend of the dashboard hub. Dashboard rooms only relay.
#[derive(Debug, Default, Clone, Copy)]
pub struct DashboardBackend;

#[async_trait]
impl StateBackend for DashboardBackend {
    async fn apply(&self, _mutation: StateMutation) -> Result<(), StoreError> {
        Err(StoreError::Unsupported(
            "dashboard rooms do not persist state".to_string(),
        ))
    }
}

/// Backend of the app hub, routing each mutation to its store
#[derive(Clone)]
pub struct AppStateBackend {
    pub tree: Arc<dyn TreeStore>,
    pub kv: Arc<dyn KvStore>,
    pub set: Arc<dyn SetStore>,
    pub action: Arc<dyn ActionStore>,
}

impl AppStateBackend {
    pub fn new(
        tree: Arc<dyn TreeStore>,
        kv: Arc<dyn KvStore>,
        set: Arc<dyn SetStore>,
        action: Arc<dyn ActionStore>,
    ) -> Self {
        Self {
            tree,
            kv,
            set,
            action,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTreeStore::new()),
            Arc::new(InMemoryKvStore::new()),
            Arc::new(InMemorySetStore::new()),
            Arc::new(InMemoryActionStore::new()),
        )
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PostgresTreeStore::new(pool.clone())),
            Arc::new(PostgresKvStore::new(pool.clone())),
            Arc::new(PostgresSetStore::new(pool.clone())),
            Arc::new(PostgresActionStore::new(pool)),
        )
    }
}

#[async_trait]
impl StateBackend for AppStateBackend {
    async fn apply(&self, mutation: StateMutation) -> Result<(), StoreError> {
        debug!(?mutation, "Applying state mutation");
        match mutation {
            StateMutation::CreateNode(node) => self.tree.create(&node).await,
            StateMutation::UpsertNode(node) => self.tree.upsert(&node).await,
            StateMutation::MoveNode {
                app_ref_id,
                kind,
                name,
                parent_node,
            } => {
                self.tree
                    .move_node(app_ref_id, kind, &name, parent_node.as_deref())
                    .await
            }
            StateMutation::DeleteNode {
                app_ref_id,
                kind,
                name,
            } => self.tree.delete(app_ref_id, kind, &name).await,
            StateMutation::CreateKv(item) => self.kv.create(&item).await,
            StateMutation::UpsertKv(item) => self.kv.upsert_by_key(&item).await,
            StateMutation::DeleteKv {
                app_ref_id,
                kind,
                key,
            } => self.kv.delete_by_key(app_ref_id, kind, &key).await,
            StateMutation::CreateSetValue(item) => self.set.create(&item).await,
            StateMutation::ReplaceSetValue {
                app_ref_id,
                kind,
                before,
                after,
            } => {
                self.set
                    .replace_if_equals(app_ref_id, kind, &before, &after)
                    .await
            }
            StateMutation::DeleteSetValue {
                app_ref_id,
                kind,
                value,
            } => self.set.delete_by_value(app_ref_id, kind, &value).await,
            StateMutation::CreateAction(action) => self.action.create(&action).await,
            StateMutation::UpsertAction(action) => self.action.upsert(&action).await,
            StateMutation::DeleteAction {
                app_ref_id,
                display_name,
            } => self.action.delete_by_name(app_ref_id, &display_name).await,
        }
    }
}
