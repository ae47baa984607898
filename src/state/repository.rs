use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::models::{
    ActionDefinition, KvStateItem, KvStateKind, SetStateItem, SetStateKind, StoreError,
    TreeStateKind, TreeStateNode,
};

/// Component tree persistence
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Insert a node; fails if the name is taken within (app, kind)
    async fn create(&self, node: &TreeStateNode) -> Result<(), StoreError>;

    /// Insert or replace a node by name
    async fn upsert(&self, node: &TreeStateNode) -> Result<(), StoreError>;

    /// Re-parent an existing node
    async fn move_node(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
        parent_node: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, app_ref_id: i64, kind: TreeStateKind, name: &str)
        -> Result<(), StoreError>;

    async fn get(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
    ) -> Result<Option<TreeStateNode>, StoreError>;
}

/// Ephemeral key-value state persistence
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn create(&self, item: &KvStateItem) -> Result<(), StoreError>;

    async fn upsert_by_key(&self, item: &KvStateItem) -> Result<(), StoreError>;

    async fn delete_by_key(&self, app_ref_id: i64, kind: KvStateKind, key: &str)
        -> Result<(), StoreError>;

    async fn get_by_key(
        &self,
        app_ref_id: i64,
        kind: KvStateKind,
        key: &str,
    ) -> Result<Option<KvStateItem>, StoreError>;
}

/// Versioned set state persistence
#[async_trait]
pub trait SetStore: Send + Sync {
    async fn create(&self, item: &SetStateItem) -> Result<(), StoreError>;

    /// Atomically replace `before` with `after`.
    ///
    /// Fails with `StoreError::Conflict` and leaves the state untouched when
    /// `before` is not currently stored. This is the only place concurrent
    /// edits are detected, so implementations must not fall back to a blind
    /// overwrite.
    async fn replace_if_equals(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
        before: &str,
        after: &str,
    ) -> Result<(), StoreError>;

    async fn delete_by_value(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
        value: &str,
    ) -> Result<(), StoreError>;

    /// Items in insertion order
    async fn list(&self, app_ref_id: i64, kind: SetStateKind)
        -> Result<Vec<SetStateItem>, StoreError>;
}

/// Action definition persistence
#[async_trait]
pub trait ActionStore: Send + Sync {
    async fn create(&self, action: &ActionDefinition) -> Result<(), StoreError>;

    async fn upsert(&self, action: &ActionDefinition) -> Result<(), StoreError>;

    async fn delete_by_name(&self, app_ref_id: i64, display_name: &str) -> Result<(), StoreError>;

    async fn get_by_name(
        &self,
        app_ref_id: i64,
        display_name: &str,
    ) -> Result<Option<ActionDefinition>, StoreError>;
}

type TreeKey = (i64, TreeStateKind, String);
type KvKey = (i64, KvStateKind, String);

/// In-memory implementation of TreeStore for development and testing
#[derive(Default)]
pub struct InMemoryTreeStore {
    nodes: RwLock<HashMap<TreeKey, TreeStateNode>>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }
}

#[async_trait]
impl TreeStore for InMemoryTreeStore {
    #[instrument(skip(self, node), fields(app_ref_id = node.app_ref_id, name = %node.name))]
    async fn create(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write().await;
        let key = (node.app_ref_id, node.kind, node.name.clone());
        if nodes.contains_key(&key) {
            debug!("Tree node already exists");
            return Err(StoreError::AlreadyExists {
                entity: "tree node",
                name: node.name.clone(),
            });
        }
        nodes.insert(key, node.clone());
        debug!("Tree node created in memory");
        Ok(())
    }

    #[instrument(skip(self, node), fields(app_ref_id = node.app_ref_id, name = %node.name))]
    async fn upsert(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write().await;
        let key = (node.app_ref_id, node.kind, node.name.clone());
        match nodes.get_mut(&key) {
            Some(existing) => {
                existing.content = node.content.clone();
                existing.parent_node = node.parent_node.clone();
                existing.version += 1;
                existing.updated_at = Utc::now();
                debug!(version = existing.version, "Tree node updated in memory");
            }
            None => {
                nodes.insert(key, node.clone());
                debug!("Tree node inserted in memory");
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn move_node(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
        parent_node: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(&(app_ref_id, kind, name.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                entity: "tree node",
                name: name.to_string(),
            })?;
        node.parent_node = parent_node.map(str::to_string);
        node.version += 1;
        node.updated_at = Utc::now();
        debug!("Tree node moved in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
    ) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write().await;
        match nodes.remove(&(app_ref_id, kind, name.to_string())) {
            Some(_) => {
                debug!("Tree node deleted from memory");
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "tree node",
                name: name.to_string(),
            }),
        }
    }

    async fn get(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
    ) -> Result<Option<TreeStateNode>, StoreError> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(&(app_ref_id, kind, name.to_string())).cloned())
    }
}

/// In-memory implementation of KvStore for development and testing
#[derive(Default)]
pub struct InMemoryKvStore {
    items: RwLock<HashMap<KvKey, KvStateItem>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, key = %item.key))]
    async fn create(&self, item: &KvStateItem) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let key = (item.app_ref_id, item.kind, item.key.clone());
        if items.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                entity: "key-value state",
                name: item.key.clone(),
            });
        }
        items.insert(key, item.clone());
        debug!("Key-value state created in memory");
        Ok(())
    }

    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, key = %item.key))]
    async fn upsert_by_key(&self, item: &KvStateItem) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let key = (item.app_ref_id, item.kind, item.key.clone());
        match items.get_mut(&key) {
            Some(existing) => {
                existing.value = item.value.clone();
                existing.version += 1;
                existing.updated_at = Utc::now();
            }
            None => {
                items.insert(key, item.clone());
            }
        }
        debug!("Key-value state upserted in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_key(
        &self,
        app_ref_id: i64,
        kind: KvStateKind,
        key: &str,
    ) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        items
            .remove(&(app_ref_id, kind, key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "key-value state",
                name: key.to_string(),
            })
    }

    async fn get_by_key(
        &self,
        app_ref_id: i64,
        kind: KvStateKind,
        key: &str,
    ) -> Result<Option<KvStateItem>, StoreError> {
        let items = self.items.read().await;
        Ok(items.get(&(app_ref_id, kind, key.to_string())).cloned())
    }
}

/// In-memory implementation of SetStore for development and testing
///
/// Every operation runs under one write lock, which makes the
/// compare-and-swap in `replace_if_equals` atomic.
#[derive(Default)]
pub struct InMemorySetStore {
    sets: RwLock<HashMap<(i64, SetStateKind), Vec<SetStateItem>>>,
}

impl InMemorySetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SetStore for InMemorySetStore {
    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, value = %item.value))]
    async fn create(&self, item: &SetStateItem) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        let set = sets.entry((item.app_ref_id, item.kind)).or_default();
        if set.iter().any(|existing| existing.value == item.value) {
            return Err(StoreError::AlreadyExists {
                entity: "set state",
                name: item.value.clone(),
            });
        }
        set.push(item.clone());
        debug!("Set state value created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn replace_if_equals(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
        before: &str,
        after: &str,
    ) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        let found = sets.get_mut(&(app_ref_id, kind)).and_then(|set| {
            let position = set.iter().position(|item| item.value == before)?;
            Some((set, position))
        });

        let Some((set, position)) = found else {
            info!("Set state compare-and-swap lost: expected value is gone");
            return Err(StoreError::Conflict {
                expected: before.to_string(),
            });
        };
        if before != after && set.iter().any(|item| item.value == after) {
            return Err(StoreError::AlreadyExists {
                entity: "set state",
                name: after.to_string(),
            });
        }

        let item = &mut set[position];
        item.value = after.to_string();
        item.version += 1;
        item.updated_at = Utc::now();
        debug!(version = item.version, "Set state value replaced in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_value(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut sets = self.sets.write().await;
        let key = (app_ref_id, kind);
        let Some(set) = sets.get_mut(&key) else {
            return Err(StoreError::NotFound {
                entity: "set state",
                name: value.to_string(),
            });
        };
        let before = set.len();
        set.retain(|item| item.value != value);
        if set.len() == before {
            return Err(StoreError::NotFound {
                entity: "set state",
                name: value.to_string(),
            });
        }
        if set.is_empty() {
            sets.remove(&key);
        }
        Ok(())
    }

    async fn list(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
    ) -> Result<Vec<SetStateItem>, StoreError> {
        let sets = self.sets.read().await;
        Ok(sets.get(&(app_ref_id, kind)).cloned().unwrap_or_default())
    }
}

/// In-memory implementation of ActionStore for development and testing
#[derive(Default)]
pub struct InMemoryActionStore {
    actions: RwLock<HashMap<(i64, String), ActionDefinition>>,
}

impl InMemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActionStore for InMemoryActionStore {
    #[instrument(skip(self, action), fields(app_ref_id = action.app_ref_id, name = %action.display_name))]
    async fn create(&self, action: &ActionDefinition) -> Result<(), StoreError> {
        let mut actions = self.actions.write().await;
        let key = (action.app_ref_id, action.display_name.clone());
        if actions.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                entity: "action",
                name: action.display_name.clone(),
            });
        }
        actions.insert(key, action.clone());
        debug!("Action created in memory");
        Ok(())
    }

    #[instrument(skip(self, action), fields(app_ref_id = action.app_ref_id, name = %action.display_name))]
    async fn upsert(&self, action: &ActionDefinition) -> Result<(), StoreError> {
        let mut actions = self.actions.write().await;
        let key = (action.app_ref_id, action.display_name.clone());
        match actions.get_mut(&key) {
            Some(existing) => {
                let version = existing.version + 1;
                let created_at = existing.created_at;
                *existing = action.clone();
                existing.version = version;
                existing.created_at = created_at;
            }
            None => {
                actions.insert(key, action.clone());
            }
        }
        debug!("Action upserted in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_name(&self, app_ref_id: i64, display_name: &str) -> Result<(), StoreError> {
        let mut actions = self.actions.write().await;
        actions
            .remove(&(app_ref_id, display_name.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                entity: "action",
                name: display_name.to_string(),
            })
    }

    async fn get_by_name(
        &self,
        app_ref_id: i64,
        display_name: &str,
    ) -> Result<Option<ActionDefinition>, StoreError> {
        let actions = self.actions.read().await;
        Ok(actions.get(&(app_ref_id, display_name.to_string())).cloned())
    }
}
