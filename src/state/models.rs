use chrono::{DateTime, Utc};
use thiserror::Error;

/// Tree state type tag, stored as `state_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum TreeStateKind {
    Components = 1,
}

/// Ephemeral key-value state kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum KvStateKind {
    Dependencies = 1,
    DragShadow = 2,
    DottedLineSquare = 3,
}

/// Versioned set state kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(i16)]
pub enum SetStateKind {
    DisplayName = 1,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("{entity} already exists: {name}")]
    AlreadyExists { entity: &'static str, name: String },

    #[error("stale value: {expected:?} is no longer stored")]
    Conflict { expected: String },

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("database error: {0}")]
    Database(String),
}

/// A node of the component tree of an app
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStateNode {
    pub app_ref_id: i64,
    pub kind: TreeStateKind,
    pub name: String,
    pub parent_node: Option<String>,
    /// Serialized component
    pub content: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TreeStateNode {
    pub fn new(
        app_ref_id: i64,
        kind: TreeStateKind,
        name: String,
        parent_node: Option<String>,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            app_ref_id,
            kind,
            name,
            parent_node,
            content,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KvStateItem {
    pub app_ref_id: i64,
    pub kind: KvStateKind,
    pub key: String,
    /// Serialized JSON value
    pub value: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KvStateItem {
    pub fn new(app_ref_id: i64, kind: KvStateKind, key: String, value: String) -> Self {
        let now = Utc::now();
        Self {
            app_ref_id,
            kind,
            key,
            value,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One member of an app's ordered set state (e.g. a display name in use)
#[derive(Debug, Clone, PartialEq)]
pub struct SetStateItem {
    pub app_ref_id: i64,
    pub kind: SetStateKind,
    pub value: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SetStateItem {
    pub fn new(app_ref_id: i64, kind: SetStateKind, value: String) -> Self {
        let now = Utc::now();
        Self {
            app_ref_id,
            kind,
            value,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionDefinition {
    pub app_ref_id: i64,
    pub display_name: String,
    pub action_type: String,
    pub resource_ref_id: i64,
    /// Serialized action template
    pub template: String,
    /// Serialized transformer
    pub transformer: String,
    pub trigger_mode: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActionDefinition {
    pub fn new(
        app_ref_id: i64,
        display_name: String,
        action_type: String,
        resource_ref_id: i64,
        template: String,
        transformer: String,
        trigger_mode: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            app_ref_id,
            display_name,
            action_type,
            resource_ref_id,
            template,
            transformer,
            trigger_mode,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
