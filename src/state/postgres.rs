use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info, instrument, warn};

use super::models::{
    ActionDefinition, KvStateItem, KvStateKind, SetStateItem, SetStateKind, StoreError,
    TreeStateKind, TreeStateNode,
};
use super::repository::{ActionStore, KvStore, SetStore, TreeStore};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS tree_states (
        app_ref_id BIGINT NOT NULL,
        state_type SMALLINT NOT NULL,
        name TEXT NOT NULL,
        parent_node TEXT,
        content TEXT NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (app_ref_id, state_type, name)
    )",
    "CREATE TABLE IF NOT EXISTS kv_states (
        app_ref_id BIGINT NOT NULL,
        state_type SMALLINT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (app_ref_id, state_type, key)
    )",
    "CREATE TABLE IF NOT EXISTS set_states (
        id BIGSERIAL PRIMARY KEY,
        app_ref_id BIGINT NOT NULL,
        state_type SMALLINT NOT NULL,
        value TEXT NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        UNIQUE (app_ref_id, state_type, value)
    )",
    "CREATE TABLE IF NOT EXISTS actions (
        app_ref_id BIGINT NOT NULL,
        display_name TEXT NOT NULL,
        action_type TEXT NOT NULL,
        resource_ref_id BIGINT NOT NULL DEFAULT 0,
        template TEXT NOT NULL,
        transformer TEXT NOT NULL,
        trigger_mode TEXT NOT NULL,
        version BIGINT NOT NULL DEFAULT 1,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (app_ref_id, display_name)
    )",
];

/// Create the state tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("State schema ready");
    Ok(())
}

fn database_error(e: sqlx::Error) -> StoreError {
    warn!(error = %e, "State store query failed");
    StoreError::Database(e.to_string())
}

fn corrupt_kind(table: &str, raw: i16) -> StoreError {
    warn!(table, state_type = raw, "Unknown state_type in database row");
    StoreError::Database(format!("unknown state_type {raw} in {table}"))
}

/// PostgreSQL implementation of TreeStore
pub struct PostgresTreeStore {
    pool: PgPool,
}

impl PostgresTreeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<TreeStateNode, StoreError> {
        let raw: i16 = row.get("state_type");
        Ok(TreeStateNode {
            app_ref_id: row.get("app_ref_id"),
            kind: TreeStateKind::from_repr(raw).ok_or_else(|| corrupt_kind("tree_states", raw))?,
            name: row.get("name"),
            parent_node: row.get("parent_node"),
            content: row.get("content"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl TreeStore for PostgresTreeStore {
    #[instrument(skip(self, node), fields(app_ref_id = node.app_ref_id, name = %node.name))]
    async fn create(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tree_states (app_ref_id, state_type, name, parent_node, content, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT DO NOTHING",
        )
        .bind(node.app_ref_id)
        .bind(node.kind as i16)
        .bind(&node.name)
        .bind(&node.parent_node)
        .bind(&node.content)
        .bind(node.version)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "tree node",
                name: node.name.clone(),
            });
        }
        debug!("Tree node created in database");
        Ok(())
    }

    #[instrument(skip(self, node), fields(app_ref_id = node.app_ref_id, name = %node.name))]
    async fn upsert(&self, node: &TreeStateNode) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tree_states (app_ref_id, state_type, name, parent_node, content, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (app_ref_id, state_type, name) DO UPDATE
             SET parent_node = EXCLUDED.parent_node,
                 content = EXCLUDED.content,
                 version = tree_states.version + 1,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(node.app_ref_id)
        .bind(node.kind as i16)
        .bind(&node.name)
        .bind(&node.parent_node)
        .bind(&node.content)
        .bind(node.version)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        debug!("Tree node upserted in database");
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
        let result = sqlx::query(
            "UPDATE tree_states SET parent_node = $4, version = version + 1, updated_at = $5
             WHERE app_ref_id = $1 AND state_type = $2 AND name = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(name)
        .bind(parent_node)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "tree node",
                name: name.to_string(),
            });
        }
        debug!("Tree node moved in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM tree_states WHERE app_ref_id = $1 AND state_type = $2 AND name = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "tree node",
                name: name.to_string(),
            });
        }
        debug!("Tree node deleted from database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        app_ref_id: i64,
        kind: TreeStateKind,
        name: &str,
    ) -> Result<Option<TreeStateNode>, StoreError> {
        let row = sqlx::query(
            "SELECT app_ref_id, state_type, name, parent_node, content, version, created_at, updated_at
             FROM tree_states WHERE app_ref_id = $1 AND state_type = $2 AND name = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(Self::from_row).transpose()
    }
}

/// PostgreSQL implementation of KvStore
pub struct PostgresKvStore {
    pool: PgPool,
}

impl PostgresKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for PostgresKvStore {
    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, key = %item.key))]
    async fn create(&self, item: &KvStateItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO kv_states (app_ref_id, state_type, key, value, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT DO NOTHING",
        )
        .bind(item.app_ref_id)
        .bind(item.kind as i16)
        .bind(&item.key)
        .bind(&item.value)
        .bind(item.version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "key-value state",
                name: item.key.clone(),
            });
        }
        debug!("Key-value state created in database");
        Ok(())
    }

    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, key = %item.key))]
    async fn upsert_by_key(&self, item: &KvStateItem) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO kv_states (app_ref_id, state_type, key, value, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (app_ref_id, state_type, key) DO UPDATE
             SET value = EXCLUDED.value,
                 version = kv_states.version + 1,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(item.app_ref_id)
        .bind(item.kind as i16)
        .bind(&item.key)
        .bind(&item.value)
        .bind(item.version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        debug!("Key-value state upserted in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_key(
        &self,
        app_ref_id: i64,
        kind: KvStateKind,
        key: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM kv_states WHERE app_ref_id = $1 AND state_type = $2 AND key = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "key-value state",
                name: key.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_key(
        &self,
        app_ref_id: i64,
        kind: KvStateKind,
        key: &str,
    ) -> Result<Option<KvStateItem>, StoreError> {
        let row = sqlx::query(
            "SELECT app_ref_id, state_type, key, value, version, created_at, updated_at
             FROM kv_states WHERE app_ref_id = $1 AND state_type = $2 AND key = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: i16 = row.get("state_type");
        Ok(Some(KvStateItem {
            app_ref_id: row.get("app_ref_id"),
            kind: KvStateKind::from_repr(raw).ok_or_else(|| corrupt_kind("kv_states", raw))?,
            key: row.get("key"),
            value: row.get("value"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}

/// PostgreSQL implementation of SetStore
pub struct PostgresSetStore {
    pool: PgPool,
}

impl PostgresSetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SetStore for PostgresSetStore {
    #[instrument(skip(self, item), fields(app_ref_id = item.app_ref_id, value = %item.value))]
    async fn create(&self, item: &SetStateItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO set_states (app_ref_id, state_type, value, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT DO NOTHING",
        )
        .bind(item.app_ref_id)
        .bind(item.kind as i16)
        .bind(&item.value)
        .bind(item.version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "set state",
                name: item.value.clone(),
            });
        }
        debug!("Set state value created in database");
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
        // Single conditional statement: the row lock taken by UPDATE
        // serializes concurrent swaps of the same value.
        let result = sqlx::query(
            "UPDATE set_states SET value = $4, version = version + 1, updated_at = $5
             WHERE app_ref_id = $1 AND state_type = $2 AND value = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(before)
        .bind(after)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::AlreadyExists {
                        entity: "set state",
                        name: after.to_string(),
                    };
                }
            }
            database_error(e)
        })?;

        if result.rows_affected() == 0 {
            info!("Set state compare-and-swap lost: expected value is gone");
            return Err(StoreError::Conflict {
                expected: before.to_string(),
            });
        }
        debug!("Set state value replaced in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_value(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
        value: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM set_states WHERE app_ref_id = $1 AND state_type = $2 AND value = $3",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "set state",
                name: value.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        app_ref_id: i64,
        kind: SetStateKind,
    ) -> Result<Vec<SetStateItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT app_ref_id, value, version, created_at, updated_at
             FROM set_states WHERE app_ref_id = $1 AND state_type = $2 ORDER BY id",
        )
        .bind(app_ref_id)
        .bind(kind as i16)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(rows
            .iter()
            .map(|row| SetStateItem {
                app_ref_id: row.get("app_ref_id"),
                kind,
                value: row.get("value"),
                version: row.get("version"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}

/// PostgreSQL implementation of ActionStore
pub struct PostgresActionStore {
    pool: PgPool,
}

impl PostgresActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionStore for PostgresActionStore {
    #[instrument(skip(self, action), fields(app_ref_id = action.app_ref_id, name = %action.display_name))]
    async fn create(&self, action: &ActionDefinition) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO actions (app_ref_id, display_name, action_type, resource_ref_id, template, transformer, trigger_mode, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT DO NOTHING",
        )
        .bind(action.app_ref_id)
        .bind(&action.display_name)
        .bind(&action.action_type)
        .bind(action.resource_ref_id)
        .bind(&action.template)
        .bind(&action.transformer)
        .bind(&action.trigger_mode)
        .bind(action.version)
        .bind(action.created_at)
        .bind(action.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "action",
                name: action.display_name.clone(),
            });
        }
        debug!("Action created in database");
        Ok(())
    }

    #[instrument(skip(self, action), fields(app_ref_id = action.app_ref_id, name = %action.display_name))]
    async fn upsert(&self, action: &ActionDefinition) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO actions (app_ref_id, display_name, action_type, resource_ref_id, template, transformer, trigger_mode, version, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (app_ref_id, display_name) DO UPDATE
             SET action_type = EXCLUDED.action_type,
                 resource_ref_id = EXCLUDED.resource_ref_id,
                 template = EXCLUDED.template,
                 transformer = EXCLUDED.transformer,
                 trigger_mode = EXCLUDED.trigger_mode,
                 version = actions.version + 1,
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(action.app_ref_id)
        .bind(&action.display_name)
        .bind(&action.action_type)
        .bind(action.resource_ref_id)
        .bind(&action.template)
        .bind(&action.transformer)
        .bind(&action.trigger_mode)
        .bind(action.version)
        .bind(action.created_at)
        .bind(action.updated_at)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        debug!("Action upserted in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_name(&self, app_ref_id: i64, display_name: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM actions WHERE app_ref_id = $1 AND display_name = $2")
            .bind(app_ref_id)
            .bind(display_name)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "action",
                name: display_name.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_name(
        &self,
        app_ref_id: i64,
        display_name: &str,
    ) -> Result<Option<ActionDefinition>, StoreError> {
        let row = sqlx::query(
            "SELECT app_ref_id, display_name, action_type, resource_ref_id, template, transformer, trigger_mode, version, created_at, updated_at
             FROM actions WHERE app_ref_id = $1 AND display_name = $2",
        )
        .bind(app_ref_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row.map(|row| ActionDefinition {
            app_ref_id: row.get("app_ref_id"),
            display_name: row.get("display_name"),
            action_type: row.get("action_type"),
            resource_ref_id: row.get("resource_ref_id"),
            template: row.get("template"),
            transformer: row.get("transformer"),
            trigger_mode: row.get("trigger_mode"),
            version: row.get("version"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}
