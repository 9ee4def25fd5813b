use async_trait::async_trait;
use harvest_types::{EntityKind, NewRecord, Record, RowId};
use thiserror::Error;

mod codec;

pub mod memory;
pub use memory::InMemoryDataStore;

pub mod sqlite;
pub use sqlite::SqliteDataStore;

pub mod rest;
pub use rest::RestDataStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table {0} does not exist")]
    MissingTable(String),
    #[error("{} {id} not found", .kind.label())]
    NotFound { kind: EntityKind, id: RowId },
    #[error("unresolved reference: {0}")]
    ForeignKey(String),
    #[error("invalid row: {0}")]
    Validation(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("unsupported by {backend} backend: {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },
}

/// A demo row tagged with the stable key that keeps seeding idempotent.
#[derive(Clone, Debug)]
pub struct SeedRow {
    pub key: String,
    pub record: NewRecord,
}

impl SeedRow {
    pub fn new(key: impl Into<String>, record: impl Into<NewRecord>) -> Self {
        Self {
            key: key.into(),
            record: record.into(),
        }
    }
}

/// Persistence interface shared by every backend. Rows come back in primary-key order.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create any missing tables. Never touches existing rows.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Drop every table, children first.
    async fn drop_schema(&self) -> Result<(), StoreError>;

    /// Connectivity failures are returned as errors, never as `false`.
    async fn table_exists(&self, kind: EntityKind) -> Result<bool, StoreError>;

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError>;

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError>;

    async fn fetch_by_id(&self, kind: EntityKind, id: RowId) -> Result<Record, StoreError>;

    /// Store one row, stamping `created_at`/`updated_at`. Unresolved references write nothing.
    async fn insert(&self, record: NewRecord) -> Result<Record, StoreError>;

    /// Insert rows whose `seed_key` is not yet present, in one guarded operation.
    /// Returns how many rows were actually written.
    async fn seed(&self, kind: EntityKind, rows: Vec<SeedRow>) -> Result<usize, StoreError>;

    /// Release backend resources on shutdown.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Check constraints enforced before a row reaches the backend.
pub(crate) fn check_constraints(record: &NewRecord) -> Result<(), StoreError> {
    match record {
        NewRecord::CommunityFeedback(fb) => match fb.rating {
            Some(r) if !(1..=5).contains(&r) => Err(StoreError::Validation(format!(
                "community_feedback: rating {r} outside 1..=5"
            ))),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

pub(crate) fn seed_kind_mismatch(kind: EntityKind, row: &SeedRow) -> Option<StoreError> {
    (row.record.kind() != kind).then(|| {
        StoreError::Validation(format!(
            "seed row {} is a {} row, not {}",
            row.key,
            row.record.kind().label(),
            kind.label()
        ))
    })
}
