use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod steps;
pub use steps::Steps;

/// Row identifier generated by the store.
pub type RowId = i64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown plan status: {0}")]
    PlanStatus(String),
    #[error("unknown entity: {0}")]
    EntityKind(String),
}

/// The five tables of the site.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Persona,
    Guidebook,
    ImplementationPlan,
    CommunityFeedback,
    ClimateImpact,
}

impl EntityKind {
    /// Parent tables come before children.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Persona,
        EntityKind::Guidebook,
        EntityKind::ImplementationPlan,
        EntityKind::CommunityFeedback,
        EntityKind::ClimateImpact,
    ];

    pub const fn table_name(self) -> &'static str {
        match self {
            EntityKind::Persona => "persona_cards",
            EntityKind::Guidebook => "guidebooks",
            EntityKind::ImplementationPlan => "implementation_plans",
            EntityKind::CommunityFeedback => "community_feedback",
            EntityKind::ClimateImpact => "climate_impacts",
        }
    }

    /// Path segment used by pages and the JSON API.
    pub const fn slug(self) -> &'static str {
        match self {
            EntityKind::Persona => "personas",
            EntityKind::Guidebook => "guidebooks",
            EntityKind::ImplementationPlan => "implementation-plans",
            EntityKind::CommunityFeedback => "community-feedback",
            EntityKind::ClimateImpact => "climate-impacts",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Persona => "persona",
            EntityKind::Guidebook => "guidebook",
            EntityKind::ImplementationPlan => "implementation plan",
            EntityKind::CommunityFeedback => "community feedback",
            EntityKind::ClimateImpact => "climate impact",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl Serialize for EntityKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.table_name())
    }
}

impl FromStr for EntityKind {
    type Err = ParseError;

    /// Accepts either the table name or the URL slug.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.table_name() == s || k.slug() == s)
            .ok_or_else(|| ParseError::EntityKind(s.to_string()))
    }
}

/// Lifecycle of an implementation plan.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
}

impl PlanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PlanStatus::Draft),
            "in_progress" => Ok(PlanStatus::InProgress),
            "completed" => Ok(PlanStatus::Completed),
            other => Err(ParseError::PlanStatus(other.to_string())),
        }
    }
}

/// Demographic/behavioral profile of a food bank client archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonaCard {
    pub id: RowId,
    pub name: String,
    pub age: Option<i32>,
    pub occupation: Option<String>,
    pub background: Option<String>,
    pub challenges: Option<String>,
    pub dietary_preferences: Option<String>,
    pub household_size: Option<i32>,
    pub location: Option<String>,
    pub climate_impact_concerns: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewPersonaCard {
    pub name: String,
    pub age: Option<i32>,
    pub occupation: Option<String>,
    pub background: Option<String>,
    pub challenges: Option<String>,
    pub dietary_preferences: Option<String>,
    pub household_size: Option<i32>,
    pub location: Option<String>,
    pub climate_impact_concerns: Option<String>,
}

/// Structured how-to document with ordered steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guidebook {
    pub id: RowId,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Steps,
    pub estimated_time: Option<String>,
    pub difficulty_level: Option<String>,
    pub key_considerations: Option<String>,
    pub resources_needed: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewGuidebook {
    pub title: String,
    pub description: Option<String>,
    pub steps: Steps,
    pub estimated_time: Option<String>,
    pub difficulty_level: Option<String>,
    pub key_considerations: Option<String>,
    pub resources_needed: Option<String>,
}

/// A guidebook instantiated for a specific effort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImplementationPlan {
    pub id: RowId,
    pub name: String,
    pub guidebook_id: RowId,
    pub timeline: Option<String>,
    pub stakeholders: Option<String>,
    pub resources: Option<String>,
    pub success_metrics: Option<String>,
    #[serde(default)]
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewImplementationPlan {
    pub name: String,
    pub guidebook_id: RowId,
    pub timeline: Option<String>,
    pub stakeholders: Option<String>,
    pub resources: Option<String>,
    pub success_metrics: Option<String>,
    pub status: PlanStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityFeedback {
    pub id: RowId,
    pub implementation_plan_id: RowId,
    pub persona_id: Option<RowId>,
    pub feedback_text: String,
    /// 1 to 5 when present.
    pub rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCommunityFeedback {
    pub implementation_plan_id: RowId,
    pub persona_id: Option<RowId>,
    pub feedback_text: String,
    pub rating: Option<u8>,
}

/// One measured climate metric for a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClimateImpact {
    pub id: RowId,
    pub implementation_plan_id: RowId,
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
    pub date_measured: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewClimateImpact {
    pub implementation_plan_id: RowId,
    pub metric_name: String,
    pub value: f64,
    pub unit: String,
    pub date_measured: NaiveDate,
}

/// Any stored row.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Persona(PersonaCard),
    Guidebook(Guidebook),
    ImplementationPlan(ImplementationPlan),
    CommunityFeedback(CommunityFeedback),
    ClimateImpact(ClimateImpact),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Persona(_) => EntityKind::Persona,
            Record::Guidebook(_) => EntityKind::Guidebook,
            Record::ImplementationPlan(_) => EntityKind::ImplementationPlan,
            Record::CommunityFeedback(_) => EntityKind::CommunityFeedback,
            Record::ClimateImpact(_) => EntityKind::ClimateImpact,
        }
    }

    pub fn id(&self) -> RowId {
        match self {
            Record::Persona(r) => r.id,
            Record::Guidebook(r) => r.id,
            Record::ImplementationPlan(r) => r.id,
            Record::CommunityFeedback(r) => r.id,
            Record::ClimateImpact(r) => r.id,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Record::Persona(r) => r.created_at,
            Record::Guidebook(r) => r.created_at,
            Record::ImplementationPlan(r) => r.created_at,
            Record::CommunityFeedback(r) => r.created_at,
            Record::ClimateImpact(r) => r.created_at,
        }
    }
}

/// Any insertable row shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NewRecord {
    Persona(NewPersonaCard),
    Guidebook(NewGuidebook),
    ImplementationPlan(NewImplementationPlan),
    CommunityFeedback(NewCommunityFeedback),
    ClimateImpact(NewClimateImpact),
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewRecord::Persona(_) => EntityKind::Persona,
            NewRecord::Guidebook(_) => EntityKind::Guidebook,
            NewRecord::ImplementationPlan(_) => EntityKind::ImplementationPlan,
            NewRecord::CommunityFeedback(_) => EntityKind::CommunityFeedback,
            NewRecord::ClimateImpact(_) => EntityKind::ClimateImpact,
        }
    }

    /// Attach the generated id and timestamp, producing the stored form.
    pub fn into_record(self, id: RowId, now: DateTime<Utc>) -> Record {
        match self {
            NewRecord::Persona(n) => Record::Persona(PersonaCard {
                id,
                name: n.name,
                age: n.age,
                occupation: n.occupation,
                background: n.background,
                challenges: n.challenges,
                dietary_preferences: n.dietary_preferences,
                household_size: n.household_size,
                location: n.location,
                climate_impact_concerns: n.climate_impact_concerns,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::Guidebook(n) => Record::Guidebook(Guidebook {
                id,
                title: n.title,
                description: n.description,
                steps: n.steps,
                estimated_time: n.estimated_time,
                difficulty_level: n.difficulty_level,
                key_considerations: n.key_considerations,
                resources_needed: n.resources_needed,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::ImplementationPlan(n) => Record::ImplementationPlan(ImplementationPlan {
                id,
                name: n.name,
                guidebook_id: n.guidebook_id,
                timeline: n.timeline,
                stakeholders: n.stakeholders,
                resources: n.resources,
                success_metrics: n.success_metrics,
                status: n.status,
                created_at: now,
                updated_at: now,
            }),
            NewRecord::CommunityFeedback(n) => Record::CommunityFeedback(CommunityFeedback {
                id,
                implementation_plan_id: n.implementation_plan_id,
                persona_id: n.persona_id,
                feedback_text: n.feedback_text,
                rating: n.rating,
                created_at: now,
            }),
            NewRecord::ClimateImpact(n) => Record::ClimateImpact(ClimateImpact {
                id,
                implementation_plan_id: n.implementation_plan_id,
                metric_name: n.metric_name,
                value: n.value,
                unit: n.unit,
                date_measured: n.date_measured,
                created_at: now,
            }),
        }
    }

    /// Foreign keys this row carries, as (column, referenced table, id).
    pub fn references(&self) -> Vec<(&'static str, EntityKind, RowId)> {
        match self {
            NewRecord::Persona(_) | NewRecord::Guidebook(_) => Vec::new(),
            NewRecord::ImplementationPlan(n) => {
                vec![("guidebook_id", EntityKind::Guidebook, n.guidebook_id)]
            }
            NewRecord::CommunityFeedback(n) => {
                let mut refs = vec![(
                    "implementation_plan_id",
                    EntityKind::ImplementationPlan,
                    n.implementation_plan_id,
                )];
                if let Some(persona_id) = n.persona_id {
                    refs.push(("persona_id", EntityKind::Persona, persona_id));
                }
                refs
            }
            NewRecord::ClimateImpact(n) => vec![(
                "implementation_plan_id",
                EntityKind::ImplementationPlan,
                n.implementation_plan_id,
            )],
        }
    }
}

/// Typed view over one table.
pub trait Entity: Serialize + Sized + Send + 'static {
    const KIND: EntityKind;
    type New: Into<NewRecord> + Send;

    fn id(&self) -> RowId;
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! impl_entity {
    ($Ty:ident, $New:ident, $variant:ident) => {
        impl Entity for $Ty {
            const KIND: EntityKind = EntityKind::$variant;
            type New = $New;

            fn id(&self) -> RowId {
                self.id
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$variant(r) => Some(r),
                    _ => None,
                }
            }
        }

        impl From<$New> for NewRecord {
            fn from(n: $New) -> Self {
                NewRecord::$variant(n)
            }
        }

        impl From<$Ty> for Record {
            fn from(r: $Ty) -> Self {
                Record::$variant(r)
            }
        }
    };
}

impl_entity!(PersonaCard, NewPersonaCard, Persona);
impl_entity!(Guidebook, NewGuidebook, Guidebook);
impl_entity!(ImplementationPlan, NewImplementationPlan, ImplementationPlan);
impl_entity!(CommunityFeedback, NewCommunityFeedback, CommunityFeedback);
impl_entity!(ClimateImpact, NewClimateImpact, ClimateImpact);
