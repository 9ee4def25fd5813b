use std::{collections::HashMap, future::Future, sync::Arc};

use harvest_store::{DataStore, StoreError};
use harvest_types::{
    Entity, EntityKind, Guidebook, ImplementationPlan, NewRecord, Record, RowId,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub mod config;
pub mod error;
pub mod forms;
pub mod seed;

pub use config::{BackendConfig, Config, ConfigError};
pub use error::AppError;
pub use forms::EntityForm;

/// Rows written per table by one bootstrap run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub inserted: Vec<(EntityKind, usize)>,
}

impl BootstrapReport {
    pub fn total(&self) -> usize {
        self.inserted.iter().map(|(_, n)| n).sum()
    }
}

/// Existence and size of one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub kind: EntityKind,
    pub exists: bool,
    pub rows: Option<usize>,
}

/// A plan with its guidebook inlined, for display.
#[derive(Clone, Debug, Serialize)]
pub struct PlanDetail {
    #[serde(flatten)]
    pub plan: ImplementationPlan,
    pub guidebook: Option<Guidebook>,
}

/// The application service: every read and write the handlers perform goes through here.
///
/// Wraps the injected `DataStore` and owns the bootstrap routine. A missing table triggers one
/// bootstrap and one retry; with seeding enabled an empty seeded table does too.
pub struct Catalog {
    store: Arc<dyn DataStore>,
    auto_seed: bool,
    /// Serializes bootstrap runs inside this process.
    bootstrap_lock: Mutex<()>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DataStore>, auto_seed: bool) -> Self {
        Self {
            store,
            auto_seed,
            bootstrap_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn DataStore> {
        &self.store
    }

    pub fn auto_seed(&self) -> bool {
        self.auto_seed
    }

    /// Create missing tables, then seed empty ones when seeding is enabled.
    pub async fn bootstrap(&self) -> Result<BootstrapReport, AppError> {
        Ok(self.run_bootstrap(self.auto_seed).await?)
    }

    /// Create missing tables and seed empty ones regardless of the seeding flag.
    pub async fn seed_demo_data(&self) -> Result<BootstrapReport, AppError> {
        Ok(self.run_bootstrap(true).await?)
    }

    /// Drop every table and recreate the schema, optionally reseeding.
    pub async fn reset(&self, seed: bool) -> Result<BootstrapReport, AppError> {
        {
            let _guard = self.bootstrap_lock.lock().await;
            self.store.drop_schema().await?;
            warn!(backend = self.store.backend(), "schema dropped");
        }
        Ok(self.run_bootstrap(seed).await?)
    }

    async fn run_bootstrap(&self, seed: bool) -> Result<BootstrapReport, StoreError> {
        let _guard = self.bootstrap_lock.lock().await;
        self.store.ensure_schema().await?;

        let mut report = BootstrapReport::default();
        if !seed {
            return Ok(report);
        }
        for kind in seed::SEEDED_KINDS {
            let empty = !self.store.table_exists(kind).await? || self.store.count(kind).await? == 0;
            if !empty {
                continue;
            }
            let inserted = self.store.seed(kind, seed::demo_rows(kind)).await?;
            if inserted > 0 {
                info!(table = kind.table_name(), inserted, "sample data added");
            }
            report.inserted.push((kind, inserted));
        }
        info!(
            backend = self.store.backend(),
            rows = report.total(),
            "bootstrap completed"
        );
        Ok(report)
    }

    /// Run `op`; if its table is missing, bootstrap once and retry once.
    async fn with_bootstrap<T, F, Fut>(&self, op: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match op().await {
            Err(StoreError::MissingTable(table)) => {
                warn!(table, "table missing, running bootstrap");
                self.run_bootstrap(self.auto_seed).await?;
                Ok(op().await?)
            }
            other => Ok(other?),
        }
    }

    pub async fn list_records(&self, kind: EntityKind) -> Result<Vec<Record>, AppError> {
        let rows = self.with_bootstrap(|| self.store.fetch_all(kind)).await?;
        if rows.is_empty() && self.auto_seed && seed::SEEDED_KINDS.contains(&kind) {
            info!(table = kind.table_name(), "table empty, running bootstrap");
            self.run_bootstrap(true).await?;
            return Ok(self.store.fetch_all(kind).await?);
        }
        Ok(rows)
    }

    pub async fn get_record(&self, kind: EntityKind, id: RowId) -> Result<Record, AppError> {
        self.with_bootstrap(|| self.store.fetch_by_id(kind, id)).await
    }

    pub async fn insert_record(&self, record: NewRecord) -> Result<Record, AppError> {
        self.with_bootstrap(|| self.store.insert(record.clone()))
            .await
    }

    pub async fn list<E: Entity>(&self) -> Result<Vec<E>, AppError> {
        self.list_records(E::KIND)
            .await?
            .into_iter()
            .map(expect_kind::<E>)
            .collect()
    }

    pub async fn get<E: Entity>(&self, id: RowId) -> Result<E, AppError> {
        expect_kind(self.get_record(E::KIND, id).await?)
    }

    pub async fn create<E: Entity>(&self, new: E::New) -> Result<E, AppError> {
        let stored = self.insert_record(new.into()).await?;
        info!(table = E::KIND.table_name(), id = stored.id(), "row created");
        expect_kind(stored)
    }

    /// Decode, validate and store a request body.
    pub async fn submit<F: EntityForm>(&self, body: serde_json::Value) -> Result<F::Entity, AppError> {
        let form: F = forms::parse(F::WHAT, body)?;
        let new = form.validate()?;
        self.create::<F::Entity>(new).await
    }

    /// Plans with their guidebook resolved.
    pub async fn plan_details(&self) -> Result<Vec<PlanDetail>, AppError> {
        let plans: Vec<ImplementationPlan> = self.list().await?;
        let guidebooks: HashMap<RowId, Guidebook> = self
            .list::<Guidebook>()
            .await?
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        Ok(plans
            .into_iter()
            .map(|plan| PlanDetail {
                guidebook: guidebooks.get(&plan.guidebook_id).cloned(),
                plan,
            })
            .collect())
    }

    /// Existence and row count per table, without bootstrapping.
    pub async fn status(&self) -> Result<Vec<TableStatus>, AppError> {
        let mut out = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let exists = self.store.table_exists(kind).await?;
            let rows = if exists {
                Some(self.store.count(kind).await?)
            } else {
                None
            };
            out.push(TableStatus { kind, exists, rows });
        }
        Ok(out)
    }

    pub async fn close(&self) -> Result<(), AppError> {
        self.store.close().await?;
        info!(backend = self.store.backend(), "store closed");
        Ok(())
    }
}

fn expect_kind<E: Entity>(record: Record) -> Result<E, AppError> {
    let kind = record.kind();
    E::from_record(record).ok_or_else(|| {
        AppError::Storage(StoreError::Backend(format!(
            "expected a {} row, got {}",
            E::KIND.label(),
            kind.label()
        )))
    })
}
