use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use harvest_types::{EntityKind, NewRecord, Record, RowId};
use tokio::sync::Mutex;

use crate::{check_constraints, seed_kind_mismatch, DataStore, SeedRow, StoreError};

#[derive(Default)]
struct Table {
    rows: Vec<Record>,
    seed_keys: HashSet<String>,
    last_id: RowId,
}

impl Table {
    fn push(&mut self, record: NewRecord) -> Record {
        self.last_id += 1;
        let stored = record.into_record(self.last_id, Utc::now());
        self.rows.push(stored.clone());
        stored
    }
}

/// Process-local data store.
///
/// Tables do not exist until `ensure_schema` runs, mirroring a fresh database. Every operation
/// holds the lock for its whole duration, so reference checks and inserts cannot interleave.
///
/// NOTE: not durable; contents vanish with the process.
pub struct InMemoryDataStore {
    tables: Mutex<HashMap<EntityKind, Table>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(kind: EntityKind) -> StoreError {
    StoreError::MissingTable(kind.table_name().to_string())
}

fn check_references(
    tables: &HashMap<EntityKind, Table>,
    record: &NewRecord,
) -> Result<(), StoreError> {
    for (column, parent, id) in record.references() {
        let table = tables.get(&parent).ok_or_else(|| missing(parent))?;
        if !table.rows.iter().any(|r| r.id() == id) {
            return Err(StoreError::ForeignKey(format!(
                "{column} {id} does not match any {}",
                parent.label()
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut inner = self.tables.lock().await;
        for kind in EntityKind::ALL {
            inner.entry(kind).or_default();
        }
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), StoreError> {
        self.tables.lock().await.clear();
        Ok(())
    }

    async fn table_exists(&self, kind: EntityKind) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.contains_key(&kind))
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let inner = self.tables.lock().await;
        inner.get(&kind).map(|t| t.rows.len()).ok_or_else(|| missing(kind))
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        let inner = self.tables.lock().await;
        inner.get(&kind).map(|t| t.rows.clone()).ok_or_else(|| missing(kind))
    }

    async fn fetch_by_id(&self, kind: EntityKind, id: RowId) -> Result<Record, StoreError> {
        let inner = self.tables.lock().await;
        let table = inner.get(&kind).ok_or_else(|| missing(kind))?;
        table
            .rows
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn insert(&self, record: NewRecord) -> Result<Record, StoreError> {
        check_constraints(&record)?;
        let kind = record.kind();
        let mut inner = self.tables.lock().await;
        if !inner.contains_key(&kind) {
            return Err(missing(kind));
        }
        check_references(&inner, &record)?;
        let table = inner.get_mut(&kind).ok_or_else(|| missing(kind))?;
        Ok(table.push(record))
    }

    async fn seed(&self, kind: EntityKind, rows: Vec<SeedRow>) -> Result<usize, StoreError> {
        if let Some(err) = rows.iter().find_map(|r| seed_kind_mismatch(kind, r)) {
            return Err(err);
        }
        for row in &rows {
            check_constraints(&row.record)?;
        }

        let mut inner = self.tables.lock().await;
        if !inner.contains_key(&kind) {
            return Err(missing(kind));
        }
        for row in &rows {
            check_references(&inner, &row.record)?;
        }
        let table = inner.get_mut(&kind).ok_or_else(|| missing(kind))?;
        let mut inserted = 0;
        for row in rows {
            if table.seed_keys.insert(row.key) {
                table.push(row.record);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_types::{NewGuidebook, NewImplementationPlan, NewPersonaCard};

    fn persona(name: &str) -> NewRecord {
        NewPersonaCard {
            name: name.into(),
            ..Default::default()
        }
        .into()
    }

    #[tokio::test]
    async fn tables_missing_until_schema() {
        let store = InMemoryDataStore::new();
        assert!(!store.table_exists(EntityKind::Persona).await.unwrap());
        let err = store.fetch_all(EntityKind::Persona).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingTable(_)));

        store.ensure_schema().await.unwrap();
        assert!(store.table_exists(EntityKind::Persona).await.unwrap());
        assert_eq!(store.count(EntityKind::Persona).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ids_follow_insertion_order() {
        let store = InMemoryDataStore::new();
        store.ensure_schema().await.unwrap();
        let a = store.insert(persona("A")).await.unwrap();
        let b = store.insert(persona("B")).await.unwrap();
        assert!(a.id() < b.id());

        let all = store.fetch_all(EntityKind::Persona).await.unwrap();
        assert_eq!(all, vec![a.clone(), b]);
        assert_eq!(store.fetch_by_id(EntityKind::Persona, a.id()).await.unwrap(), a);
        assert!(matches!(
            store.fetch_by_id(EntityKind::Persona, 99).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn unresolved_guidebook_writes_nothing() {
        let store = InMemoryDataStore::new();
        store.ensure_schema().await.unwrap();
        let plan = NewImplementationPlan {
            name: "Orphan".into(),
            guidebook_id: 5,
            ..Default::default()
        };
        let err = store.insert(plan.into()).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKey(_)));
        assert_eq!(store.count(EntityKind::ImplementationPlan).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn seed_skips_known_keys() {
        let store = InMemoryDataStore::new();
        store.ensure_schema().await.unwrap();
        let rows = || {
            vec![SeedRow::new(
                "guidebook:composting",
                NewGuidebook {
                    title: "Composting".into(),
                    ..Default::default()
                },
            )]
        };
        assert_eq!(store.seed(EntityKind::Guidebook, rows()).await.unwrap(), 1);
        assert_eq!(store.seed(EntityKind::Guidebook, rows()).await.unwrap(), 0);
        assert_eq!(store.count(EntityKind::Guidebook).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn seed_rejects_rows_of_other_kind() {
        let store = InMemoryDataStore::new();
        store.ensure_schema().await.unwrap();
        let rows = vec![SeedRow::new("persona:x", NewPersonaCard::default())];
        assert!(store.seed(EntityKind::Guidebook, rows).await.is_err());
    }
}
