#![forbid(unsafe_code)]

pub mod macros;

use harvest_types::EntityKind;

/// Storage class of a payload column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    /// Ordered string list kept as JSON array text.
    JsonText,
    /// RFC 3339 text.
    Timestamp,
    /// `YYYY-MM-DD` text.
    Date,
}

impl ColumnType {
    pub const fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text | ColumnType::JsonText | ColumnType::Timestamp | ColumnType::Date => {
                "TEXT"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: EntityKind,
}

/// One table: spine columns (`id`, `seed_key`, `created_at`) plus the declared payload.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub kind: EntityKind,
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
    pub checks: &'static [&'static str],
}

/// Spine columns present on every table, written by the store rather than the caller.
pub const SPINE_COLUMNS: [Column; 3] = [
    Column { name: "id", ty: ColumnType::Integer, required: true },
    Column { name: "seed_key", ty: ColumnType::Text, required: false },
    Column { name: "created_at", ty: ColumnType::Timestamp, required: true },
];

impl TableDef {
    pub const fn name(&self) -> &'static str {
        self.kind.table_name()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        SPINE_COLUMNS
            .iter()
            .chain(self.columns.iter())
            .find(|c| c.name == name)
    }

    /// Spine and payload columns in storage order.
    pub fn all_columns(&self) -> impl Iterator<Item = &Column> {
        SPINE_COLUMNS.iter().chain(self.columns.iter())
    }

    /// Columns supplied on insert: everything but `id`.
    pub fn insert_columns(&self) -> Vec<&'static str> {
        SPINE_COLUMNS[1..]
            .iter()
            .chain(self.columns.iter())
            .map(|c| c.name)
            .collect()
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().filter(|c| c.required).map(|c| c.name)
    }

    pub fn has_updated_at(&self) -> bool {
        self.columns.iter().any(|c| c.name == "updated_at")
    }

    pub fn create_sql(&self) -> String {
        let mut parts = vec![
            "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            "seed_key TEXT UNIQUE".to_string(),
            "created_at TEXT NOT NULL".to_string(),
        ];
        for c in self.columns {
            let null = if c.required { " NOT NULL" } else { "" };
            parts.push(format!("{} {}{}", c.name, c.ty.sql(), null));
        }
        for fk in self.foreign_keys {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} (id)",
                fk.column,
                fk.references.table_name()
            ));
        }
        for check in self.checks {
            parts.push(format!("CHECK ({check})"));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.name(),
            parts.join(",\n    ")
        )
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name())
    }

    /// Positional insert; `or_ignore` skips rows hitting the `seed_key` unique constraint.
    pub fn insert_sql(&self, or_ignore: bool) -> String {
        let cols = self.insert_columns();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT {}INTO {} ({}) VALUES ({})",
            if or_ignore { "OR IGNORE " } else { "" },
            self.name(),
            cols.join(", "),
            placeholders.join(", ")
        )
    }

    pub fn select_all_sql(&self) -> String {
        format!("SELECT * FROM {} ORDER BY id", self.name())
    }

    pub fn select_by_id_sql(&self) -> String {
        format!("SELECT * FROM {} WHERE id = ?1", self.name())
    }
}

/// Table definitions for the site.
pub mod generated {
    use crate::define_tables;
    use harvest_types::EntityKind;

    define_tables! {
        table PERSONA_CARDS {
            kind: EntityKind::Persona,
            fields: {
                name: Text required,
                age: Integer,
                occupation: Text,
                background: Text,
                challenges: Text,
                dietary_preferences: Text,
                household_size: Integer,
                location: Text,
                climate_impact_concerns: Text,
                updated_at: Timestamp required,
            },
            references: {},
            checks: [],
        },

        table GUIDEBOOKS {
            kind: EntityKind::Guidebook,
            fields: {
                title: Text required,
                description: Text,
                steps: JsonText required,
                estimated_time: Text,
                difficulty_level: Text,
                key_considerations: Text,
                resources_needed: Text,
                updated_at: Timestamp required,
            },
            references: {},
            checks: [],
        },

        table IMPLEMENTATION_PLANS {
            kind: EntityKind::ImplementationPlan,
            fields: {
                name: Text required,
                guidebook_id: Integer required,
                timeline: Text,
                stakeholders: Text,
                resources: Text,
                success_metrics: Text,
                status: Text required,
                updated_at: Timestamp required,
            },
            references: {
                guidebook_id -> EntityKind::Guidebook,
            },
            checks: ["status IN ('draft', 'in_progress', 'completed')"],
        },

        table COMMUNITY_FEEDBACK {
            kind: EntityKind::CommunityFeedback,
            fields: {
                implementation_plan_id: Integer required,
                persona_id: Integer,
                feedback_text: Text required,
                rating: Integer,
            },
            references: {
                implementation_plan_id -> EntityKind::ImplementationPlan,
                persona_id -> EntityKind::Persona,
            },
            checks: ["rating IS NULL OR rating BETWEEN 1 AND 5"],
        },

        table CLIMATE_IMPACTS {
            kind: EntityKind::ClimateImpact,
            fields: {
                implementation_plan_id: Integer required,
                metric_name: Text required,
                value: Real required,
                unit: Text required,
                date_measured: Date required,
            },
            references: {
                implementation_plan_id -> EntityKind::ImplementationPlan,
            },
            checks: [],
        },
    }
}

pub use generated::*;

/// Definition of the table backing `kind`.
pub fn table_for(kind: EntityKind) -> &'static TableDef {
    match kind {
        EntityKind::Persona => &PERSONA_CARDS,
        EntityKind::Guidebook => &GUIDEBOOKS,
        EntityKind::ImplementationPlan => &IMPLEMENTATION_PLANS,
        EntityKind::CommunityFeedback => &COMMUNITY_FEEDBACK,
        EntityKind::ClimateImpact => &CLIMATE_IMPACTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sql_numbers_every_column() {
        let sql = PERSONA_CARDS.insert_sql(false);
        assert!(sql.starts_with("INSERT INTO persona_cards (seed_key, created_at, name, age,"));
        assert!(sql.ends_with("?12)"));
        assert!(GUIDEBOOKS.insert_sql(true).starts_with("INSERT OR IGNORE INTO guidebooks"));
    }

    #[test]
    fn create_sql_carries_constraints() {
        let sql = COMMUNITY_FEEDBACK.create_sql();
        assert!(sql.contains("seed_key TEXT UNIQUE"));
        assert!(sql.contains("feedback_text TEXT NOT NULL"));
        assert!(sql.contains("FOREIGN KEY (persona_id) REFERENCES persona_cards (id)"));
        assert!(sql.contains("CHECK (rating IS NULL OR rating BETWEEN 1 AND 5)"));
    }

    #[test]
    fn required_columns_follow_markers() {
        let required: Vec<_> = CLIMATE_IMPACTS.required_columns().collect();
        assert_eq!(
            required,
            ["implementation_plan_id", "metric_name", "value", "unit", "date_measured"]
        );
        assert!(!COMMUNITY_FEEDBACK.has_updated_at());
        assert!(GUIDEBOOKS.has_updated_at());
    }
}
