#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use statehub::state::{
    AppStateBackend, InMemoryActionStore, InMemoryKvStore, InMemorySetStore, StoreError,
    TreeStateKind, TreeStateNode, TreeStore,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Tree store that records every call and fails on one chosen node name
#[derive(Clone, Default)]
pub struct RecordingTreeStore {
    attempted: Arc<RwLock<Vec<String>>>,
    fail_on: Option<String>,
}

impl RecordingTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(name: &str) -> Self {
        Self {
            attempted: Arc::new(RwLock::new(Vec::new())),
            fail_on: Some(name.to_string()),
        }
    }

    /// Node names the store was asked to write, in order
    pub async fn attempted(&self) -> Vec<String> {
        self.attempted.read().await.clone()
    }

    /// Backend using this store for components and in-memory stores otherwise
    pub fn into_backend(self) -> AppStateBackend {
        AppStateBackend::new(
            Arc::new(self),
            Arc::new(InMemoryKvStore::new()),
            Arc::new(InMemorySetStore::new()),
            Arc::new(InMemoryActionStore::new()),
        )
    }

    async fn record(&self, name: &str) -> Result<(), StoreError> {
        self.attempted.write().await.push(name.to_string());
        if self.fail_on.as_deref() == Some(name) {
            return Err(StoreError::Database("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TreeStore for RecordingTreeStore {
    async fn create(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        self.record(&node.name).await
    }

    async fn upsert(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        self.record(&node.name).await
    }

    async fn move_node(
        &self,
        _app_ref_id: i64,
        _kind: TreeStateKind,
        name: &str,
        _parent_node: Option<&str>,
    ) -> Result<(), StoreError> {
        self.record(name).await
    }

    async fn delete(
        &self,
        _app_ref_id: i64,
        _kind: TreeStateKind,
        name: &str,
    ) -> Result<(), StoreError> {
        self.record(name).await
    }

    async fn get(
        &self,
        _app_ref_id: i64,
        _kind: TreeStateKind,
        _name: &str,
    ) -> Result<Option<TreeStateNode>, StoreError> {
        Ok(None)
    }
}
