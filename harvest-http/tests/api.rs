use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use harvest_core::Catalog;
use harvest_http::{router, AppState};
use harvest_store::{DataStore, InMemoryDataStore, SqliteDataStore};
use harvest_types::EntityKind;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(store: Arc<dyn DataStore>, auto_seed: bool) -> (Router, Arc<Catalog>) {
    let catalog = Arc::new(Catalog::new(store, auto_seed));
    let state = AppState::new(Arc::clone(&catalog)).unwrap();
    (router(state), catalog)
}

fn memory_app(auto_seed: bool) -> (Router, Arc<Catalog>) {
    app_with(Arc::new(InMemoryDataStore::new()), auto_seed)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_html(app: &Router, uri: &str) -> (StatusCode, String) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, req).await;
    (status, String::from_utf8(body).unwrap())
}

#[tokio::test]
async fn create_persona_returns_record() {
    let (app, _) = memory_app(false);
    let (status, body) = post_json(
        &app,
        "/api/personas",
        json!({"name": "Sarah Johnson", "age": 35, "occupation": "Single Mother", "household_size": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sarah Johnson");
    assert!(body["id"].as_i64().is_some());
    assert!(body["message"].is_string());

    let (status, list) = get_json(&app, "/api/personas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_store_serves_seed_guidebook() {
    let (app, _) = memory_app(true);
    let (status, body) = get_json(&app, "/api/guidebooks").await;
    assert_eq!(status, StatusCode::OK);
    let books = body.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Reducing Food Waste in Food Banks");
    assert_eq!(books[0]["steps"][0], "Audit current waste levels");
    assert_eq!(books[0]["steps"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn plan_with_unknown_guidebook_creates_nothing() {
    let (app, catalog) = memory_app(true);
    let (status, body) = post_json(
        &app,
        "/api/implementation-plans",
        json!({"name": "Pilot", "guidebook_id": 999}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("guidebook_id"));
    assert_eq!(
        catalog.store().count(EntityKind::ImplementationPlan).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn bad_climate_date_is_reported() {
    let (app, _) = memory_app(true);
    let (status, body) = post_json(
        &app,
        "/api/climate-impact",
        json!({
            "implementation_plan_id": 1,
            "metric_name": "Food waste diverted",
            "value": 120.5,
            "unit": "kg",
            "date_measured": "last tuesday"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("date_measured"));

    // The server keeps answering.
    let (status, _) = get_json(&app, "/api/climate-impacts").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn plan_feedback_and_impact_chain() {
    let (app, _) = memory_app(true);
    let (_, books) = get_json(&app, "/api/guidebooks").await;
    let guidebook_id = books[0]["id"].as_i64().unwrap();

    let (status, plan) = post_json(
        &app,
        "/api/implementation-plans",
        json!({"title": "Warehouse audit", "guidebook_id": guidebook_id.to_string(), "status": "in_progress"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["name"], "Warehouse audit");
    assert_eq!(plan["status"], "in_progress");
    let plan_id = plan["id"].as_i64().unwrap();

    let (status, fb) = post_json(
        &app,
        "/api/community-feedback",
        json!({"implementation_plan_id": plan_id, "feedback_text": "Much less spoilage", "rating": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fb["rating"], 5);

    let (status, impact) = post_json(
        &app,
        "/api/climate-impacts",
        json!({
            "implementation_plan_id": plan_id,
            "metric_name": "Food waste diverted",
            "value": "120.5",
            "unit": "kg",
            "date_measured": "2024-03-01"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(impact["date_measured"], "2024-03-01");

    let (status, html) = get_html(&app, "/implementation-plans").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Warehouse audit"));
    assert!(html.contains("Train staff and volunteers"));
}

#[tokio::test]
async fn rating_out_of_range_is_rejected() {
    let (app, _) = memory_app(false);
    let (status, body) = post_json(
        &app,
        "/api/community-feedback",
        json!({"implementation_plan_id": 1, "feedback_text": "meh", "rating": 9}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("rating"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, _) = memory_app(false);
    let req = Request::post("/api/personas")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("malformed JSON body"));
}

#[tokio::test]
async fn missing_record_and_unknown_path_are_404() {
    let (app, _) = memory_app(false);
    let (status, body) = get_json(&app, "/api/personas/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "persona 42 not found");

    let (status, html) = get_html(&app, "/no-such-page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("404"));
}

#[tokio::test]
async fn non_numeric_id_is_json_bad_request() {
    let (app, _) = memory_app(false);
    let (status, body) = get_json(&app, "/api/personas/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("invalid path"));
}

#[tokio::test]
async fn pages_render_seed_data() {
    let (app, _) = memory_app(true);
    let (status, html) = get_html(&app, "/personas").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Sarah Johnson"));
    assert!(html.contains("Emma Thompson"));

    for uri in ["/", "/process", "/guidebooks", "/community-feedback", "/climate-impacts"] {
        let (status, _) = get_html(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }

    let (status, body) = get_html(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn sqlite_backend_round_trips_steps() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteDataStore::open(dir.path().join("harvest.db")).unwrap();
    let (app, _) = app_with(Arc::new(store), false);

    let (status, created) = post_json(
        &app,
        "/api/guidebooks",
        json!({"title": "Composting", "steps": ["Collect scraps", "Turn weekly", "Harvest soil"]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = get_json(&app, &format!("/api/guidebooks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        fetched["steps"],
        json!(["Collect scraps", "Turn weekly", "Harvest soil"])
    );
    assert!(fetched["created_at"].as_str().unwrap() <= fetched["updated_at"].as_str().unwrap());
}
