// Public API
pub use backend::{AppStateBackend, DashboardBackend, StateBackend};
pub use models::{
    ActionDefinition, KvStateItem, KvStateKind, SetStateItem, SetStateKind, StoreError,
    TreeStateKind, TreeStateNode,
};
pub use mutation::StateMutation;
pub use postgres::{
    ensure_schema, PostgresActionStore, PostgresKvStore, PostgresSetStore, PostgresTreeStore,
};
pub use repository::{
    ActionStore, InMemoryActionStore, InMemoryKvStore, InMemorySetStore, InMemoryTreeStore,
    KvStore, SetStore, TreeStore,
};

// Internal modules
mod backend;
mod models;
mod mutation;
mod postgres;
mod repository;
