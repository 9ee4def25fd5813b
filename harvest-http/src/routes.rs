use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::Html,
    Json,
};
use harvest_core::{AppError, EntityForm};
use harvest_store::StoreError;
use harvest_types::{
    ClimateImpact, CommunityFeedback, Entity, Guidebook, PersonaCard, RowId,
};
use serde_json::Value;

use crate::error::{ApiError, PageError};
use crate::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    static_page(&state, "index", "index.html")
}

pub async fn process(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    static_page(&state, "process", "process.html")
}

fn static_page(
    state: &AppState,
    route: &'static str,
    template: &str,
) -> Result<Html<String>, PageError> {
    state
        .pages
        .page(template)
        .map(Html)
        .map_err(PageError::render(route, &state.pages))
}

/// List page for one table; rows are bound to `rows` in the template.
async fn list_page<E: Entity>(state: &AppState, template: &str) -> Result<Html<String>, PageError> {
    let route = E::KIND.slug();
    let rows: Vec<E> = state
        .catalog
        .list()
        .await
        .map_err(PageError::at(route, &state.pages))?;
    state
        .pages
        .list(template, "rows", &rows)
        .map(Html)
        .map_err(PageError::render(route, &state.pages))
}

pub async fn personas_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    list_page::<PersonaCard>(&state, "personas.html").await
}

pub async fn guidebooks_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    list_page::<Guidebook>(&state, "guidebooks.html").await
}

pub async fn plans_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    let route = "implementation-plans";
    let plans = state
        .catalog
        .plan_details()
        .await
        .map_err(PageError::at(route, &state.pages))?;
    state
        .pages
        .list("implementation_plans.html", "rows", &plans)
        .map(Html)
        .map_err(PageError::render(route, &state.pages))
}

pub async fn feedback_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    list_page::<CommunityFeedback>(&state, "community_feedback.html").await
}

pub async fn climate_impacts_page(State(state): State<AppState>) -> Result<Html<String>, PageError> {
    list_page::<ClimateImpact>(&state, "climate_impacts.html").await
}

pub async fn list_json<E: Entity>(State(state): State<AppState>) -> Result<Json<Vec<E>>, ApiError> {
    state
        .catalog
        .list()
        .await
        .map(Json)
        .map_err(ApiError::at(E::KIND.slug()))
}

pub async fn show_json<E: Entity>(
    State(state): State<AppState>,
    path: Result<Path<RowId>, PathRejection>,
) -> Result<Json<E>, ApiError> {
    let route = E::KIND.slug();
    let Path(id) = path.map_err(|rejection| ApiError::bad_path(route, rejection))?;
    state
        .catalog
        .get(id)
        .await
        .map(Json)
        .map_err(ApiError::at(route))
}

/// Create one row from a JSON body. Responds with the stored row plus `message`.
pub async fn create_json<F: EntityForm>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let route = <F::Entity as Entity>::KIND.slug();
    let Json(body) = body.map_err(|rejection| ApiError::malformed(route, rejection))?;
    let created = state
        .catalog
        .submit::<F>(body)
        .await
        .map_err(ApiError::at(route))?;
    with_message(&created, F::WHAT).map(Json).map_err(ApiError::at(route))
}

fn with_message<E: Entity>(created: &E, what: &str) -> Result<Value, AppError> {
    let mut out = serde_json::to_value(created)
        .map_err(|e| AppError::Storage(StoreError::Backend(format!("encode {what}: {e}"))))?;
    let Value::Object(map) = &mut out else {
        return Err(AppError::Storage(StoreError::Backend(format!(
            "{what} did not encode as an object"
        ))));
    };
    map.insert(
        "message".into(),
        Value::String(format!("{what} {} created", created.id())),
    );
    Ok(out)
}
