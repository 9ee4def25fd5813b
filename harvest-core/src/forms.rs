//! Request payloads and their validation into insertable rows.
//!
//! Every field is optional at the serde level so a missing field is reported by name rather
//! than as a generic decode failure. Numbers may arrive as JSON numbers or numeric strings.

use chrono::NaiveDate;
use harvest_types::{
    ClimateImpact, CommunityFeedback, Entity, Guidebook, ImplementationPlan, NewClimateImpact,
    NewCommunityFeedback, NewGuidebook, NewImplementationPlan, NewPersonaCard, PersonaCard,
    PlanStatus, RowId, Steps,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::AppError;

/// Decode a JSON body into a form, mapping decode failures to validation errors.
pub fn parse<T: DeserializeOwned>(what: &str, body: Value) -> Result<T, AppError> {
    serde_json::from_value(body)
        .map_err(|e| AppError::validation(format!("invalid {what} payload: {e}")))
}

/// A request body that validates into one insertable row.
pub trait EntityForm: DeserializeOwned + Send + 'static {
    type Entity: Entity;
    /// Used in decode error messages.
    const WHAT: &'static str;

    fn validate(self) -> Result<<Self::Entity as Entity>::New, AppError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    use serde::de::Error;
    match Option::<Lenient>::deserialize(d)? {
        None => Ok(None),
        Some(Lenient::Int(i)) => Ok(Some(i)),
        Some(Lenient::Float(f)) if f.fract() == 0.0 => Ok(Some(f as i64)),
        Some(Lenient::Float(f)) => Err(D::Error::custom(format!("expected an integer, got {f}"))),
        Some(Lenient::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Lenient::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, got {s:?}"))),
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    use serde::de::Error;
    match Option::<Lenient>::deserialize(d)? {
        None => Ok(None),
        Some(Lenient::Int(i)) => Ok(Some(i as f64)),
        Some(Lenient::Float(f)) => Ok(Some(f)),
        Some(Lenient::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Lenient::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, got {s:?}"))),
    }
}

fn required_text(field: &'static str, value: Option<String>) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("missing required field: {field}")))
}

fn required<T>(field: &'static str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::validation(format!("missing required field: {field}")))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn small_int(field: &'static str, value: Option<i64>) -> Result<Option<i32>, AppError> {
    value
        .map(|v| {
            i32::try_from(v)
                .ok()
                .filter(|v| *v >= 0)
                .ok_or_else(|| AppError::validation(format!("{field} out of range: {v}")))
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct PersonaForm {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub age: Option<i64>,
    pub occupation: Option<String>,
    pub background: Option<String>,
    pub challenges: Option<String>,
    pub dietary_preferences: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub household_size: Option<i64>,
    pub location: Option<String>,
    pub climate_impact_concerns: Option<String>,
}

impl EntityForm for PersonaForm {
    type Entity = PersonaCard;
    const WHAT: &'static str = "persona";

    fn validate(self) -> Result<NewPersonaCard, AppError> {
        Ok(NewPersonaCard {
            name: required_text("name", self.name)?,
            age: small_int("age", self.age)?,
            occupation: optional_text(self.occupation),
            background: optional_text(self.background),
            challenges: optional_text(self.challenges),
            dietary_preferences: optional_text(self.dietary_preferences),
            household_size: small_int("household_size", self.household_size)?,
            location: optional_text(self.location),
            climate_impact_concerns: optional_text(self.climate_impact_concerns),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GuidebookForm {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Option<Steps>,
    pub estimated_time: Option<String>,
    pub difficulty_level: Option<String>,
    pub key_considerations: Option<String>,
    pub resources_needed: Option<String>,
}

impl EntityForm for GuidebookForm {
    type Entity = Guidebook;
    const WHAT: &'static str = "guidebook";

    fn validate(self) -> Result<NewGuidebook, AppError> {
        Ok(NewGuidebook {
            title: required_text("title", self.title)?,
            description: optional_text(self.description),
            steps: self.steps.unwrap_or_default(),
            estimated_time: optional_text(self.estimated_time),
            difficulty_level: optional_text(self.difficulty_level),
            key_considerations: optional_text(self.key_considerations),
            resources_needed: optional_text(self.resources_needed),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlanForm {
    /// `title` is accepted as an alias used by older clients.
    #[serde(alias = "title")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub guidebook_id: Option<RowId>,
    pub timeline: Option<String>,
    pub stakeholders: Option<String>,
    pub resources: Option<String>,
    pub success_metrics: Option<String>,
    pub status: Option<String>,
}

impl EntityForm for PlanForm {
    type Entity = ImplementationPlan;
    const WHAT: &'static str = "implementation plan";

    fn validate(self) -> Result<NewImplementationPlan, AppError> {
        let status = match optional_text(self.status) {
            Some(s) => s
                .parse::<PlanStatus>()
                .map_err(|e| AppError::validation(e.to_string()))?,
            None => PlanStatus::default(),
        };
        Ok(NewImplementationPlan {
            name: required_text("name", self.name)?,
            guidebook_id: required("guidebook_id", self.guidebook_id)?,
            timeline: optional_text(self.timeline),
            stakeholders: optional_text(self.stakeholders),
            resources: optional_text(self.resources),
            success_metrics: optional_text(self.success_metrics),
            status,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackForm {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub implementation_plan_id: Option<RowId>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub persona_id: Option<RowId>,
    pub feedback_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub rating: Option<i64>,
}

impl EntityForm for FeedbackForm {
    type Entity = CommunityFeedback;
    const WHAT: &'static str = "community feedback";

    fn validate(self) -> Result<NewCommunityFeedback, AppError> {
        let rating = match self.rating {
            Some(r) if (1..=5).contains(&r) => Some(r as u8),
            Some(r) => {
                return Err(AppError::validation(format!(
                    "rating must be between 1 and 5, got {r}"
                )))
            }
            None => None,
        };
        Ok(NewCommunityFeedback {
            implementation_plan_id: required("implementation_plan_id", self.implementation_plan_id)?,
            persona_id: self.persona_id,
            feedback_text: required_text("feedback_text", self.feedback_text)?,
            rating,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClimateImpactForm {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub implementation_plan_id: Option<RowId>,
    pub metric_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub date_measured: Option<String>,
}

impl EntityForm for ClimateImpactForm {
    type Entity = ClimateImpact;
    const WHAT: &'static str = "climate impact";

    fn validate(self) -> Result<NewClimateImpact, AppError> {
        let implementation_plan_id =
            required("implementation_plan_id", self.implementation_plan_id)?;
        let metric_name = required_text("metric_name", self.metric_name)?;
        let value = required("value", self.value)?;
        if !value.is_finite() {
            return Err(AppError::validation("value must be a finite number"));
        }
        let unit = required_text("unit", self.unit)?;
        let raw_date = required_text("date_measured", self.date_measured)?;
        let date_measured = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            AppError::validation(format!("date_measured must be YYYY-MM-DD, got {raw_date:?}"))
        })?;
        Ok(NewClimateImpact {
            implementation_plan_id,
            metric_name,
            value,
            unit,
            date_measured,
        })
    }
}
