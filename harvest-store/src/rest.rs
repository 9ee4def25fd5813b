use async_trait::async_trait;
use chrono::Utc;
use harvest_types::{EntityKind, NewRecord, Record, RowId};
use reqwest::{header::HeaderValue, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::codec::{insert_columns, record_from_row};
use crate::{check_constraints, seed_kind_mismatch, DataStore, SeedRow, StoreError};

/// Hosted Postgres reached through its PostgREST interface (Supabase style).
///
/// The remote service owns the schema: tables must be created there, with `seed_key` as a unique
/// column so `seed` can rely on `on_conflict=seed_key`.
pub struct RestDataStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestDataStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table_name())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, kind: EntityKind, req: RequestBuilder) -> Result<Response, StoreError> {
        let resp = req.send().await.map_err(|e| {
            StoreError::Backend(format!("{} request error: {e}", kind.table_name()))
        })?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.json::<PostgrestError>().await.ok();
        Err(classify_error(kind, status, body))
    }

    async fn rows(&self, kind: EntityKind, resp: Response) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<Value> = resp.json().await.map_err(|e| {
            StoreError::Backend(format!("{} parse error: {e}", kind.table_name()))
        })?;
        rows.into_iter().map(|r| record_from_row(kind, r)).collect()
    }
}

/// Error body returned by PostgREST.
#[derive(Deserialize, Debug, Default)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

fn classify_error(kind: EntityKind, status: StatusCode, body: Option<PostgrestError>) -> StoreError {
    let table = kind.table_name();
    let body = body.unwrap_or_default();
    let message = match (&body.message, &body.details) {
        (Some(m), Some(d)) => format!("{m} ({d})"),
        (Some(m), None) => m.clone(),
        (None, _) => status.to_string(),
    };
    match body.code.as_deref() {
        Some("42P01") | Some("PGRST205") => StoreError::MissingTable(table.to_string()),
        Some("23503") => StoreError::ForeignKey(format!("{table}: {message}")),
        Some("23502") | Some("23514") | Some("22P02") | Some("PGRST204") => {
            StoreError::Validation(format!("{table}: {message}"))
        }
        _ if status == StatusCode::NOT_FOUND => StoreError::MissingTable(table.to_string()),
        _ => StoreError::Backend(format!("{table} status {status}: {message}")),
    }
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl DataStore for RestDataStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    /// Tables cannot be created through PostgREST; this only verifies they exist.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for kind in EntityKind::ALL {
            if !self.table_exists(kind).await? {
                return Err(StoreError::MissingTable(kind.table_name().to_string()));
            }
        }
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported {
            backend: "rest",
            operation: "drop_schema",
        })
    }

    async fn table_exists(&self, kind: EntityKind) -> Result<bool, StoreError> {
        let url = format!("{}?select=id&limit=0", self.table_url(kind));
        match self.send(kind, self.request(Method::GET, &url)).await {
            Ok(_) => Ok(true),
            Err(StoreError::MissingTable(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, StoreError> {
        let url = format!("{}?select=id&limit=1", self.table_url(kind));
        let req = self
            .request(Method::GET, &url)
            .header("Prefer", "count=exact");
        let resp = self.send(kind, req).await?;
        resp.headers()
            .get("content-range")
            .and_then(|h: &HeaderValue| h.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| {
                StoreError::Backend(format!("{} count missing content-range", kind.table_name()))
            })
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        let url = format!("{}?select=*&order=id.asc", self.table_url(kind));
        let resp = self.send(kind, self.request(Method::GET, &url)).await?;
        self.rows(kind, resp).await
    }

    async fn fetch_by_id(&self, kind: EntityKind, id: RowId) -> Result<Record, StoreError> {
        let url = format!("{}?select=*&id=eq.{id}", self.table_url(kind));
        let resp = self.send(kind, self.request(Method::GET, &url)).await?;
        self.rows(kind, resp)
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NotFound { kind, id })
    }

    async fn insert(&self, record: NewRecord) -> Result<Record, StoreError> {
        check_constraints(&record)?;
        let kind = record.kind();
        let body = insert_columns(&record, None, Utc::now())?;
        let req = self
            .request(Method::POST, &self.table_url(kind))
            .header("Prefer", "return=representation")
            .json(&body);
        let resp = self.send(kind, req).await?;
        self.rows(kind, resp).await?.into_iter().next().ok_or_else(|| {
            StoreError::Backend(format!("{} insert returned no rows", kind.table_name()))
        })
    }

    async fn seed(&self, kind: EntityKind, rows: Vec<SeedRow>) -> Result<usize, StoreError> {
        if let Some(err) = rows.iter().find_map(|r| seed_kind_mismatch(kind, r)) {
            return Err(err);
        }
        if rows.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let mut body = Vec::with_capacity(rows.len());
        for row in &rows {
            check_constraints(&row.record)?;
            body.push(insert_columns(&row.record, Some(&row.key), now)?);
        }
        let url = format!("{}?on_conflict=seed_key", self.table_url(kind));
        let req = self
            .request(Method::POST, &url)
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&body);
        let resp = self.send(kind, req).await?;
        Ok(self.rows(kind, resp).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, message: &str) -> Option<PostgrestError> {
        Some(PostgrestError {
            code: Some(code.into()),
            message: Some(message.into()),
            details: None,
        })
    }

    #[test]
    fn missing_table_codes() {
        let err = classify_error(
            EntityKind::Guidebook,
            StatusCode::NOT_FOUND,
            body("PGRST205", "Could not find the table"),
        );
        assert!(matches!(err, StoreError::MissingTable(t) if t == "guidebooks"));
        let err = classify_error(EntityKind::Persona, StatusCode::NOT_FOUND, None);
        assert!(matches!(err, StoreError::MissingTable(_)));
    }

    #[test]
    fn constraint_codes() {
        let err = classify_error(
            EntityKind::ImplementationPlan,
            StatusCode::CONFLICT,
            body("23503", "violates foreign key constraint"),
        );
        assert!(matches!(err, StoreError::ForeignKey(_)));
        let err = classify_error(
            EntityKind::CommunityFeedback,
            StatusCode::BAD_REQUEST,
            body("23514", "violates check constraint"),
        );
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn other_failures_are_backend_errors() {
        let err = classify_error(
            EntityKind::Persona,
            StatusCode::UNAUTHORIZED,
            body("PGRST301", "JWT expired"),
        );
        assert!(matches!(err, StoreError::Backend(m) if m.contains("JWT expired")));
    }

    #[test]
    fn content_range_parsing() {
        assert_eq!(content_range_total("0-0/12"), Some(12));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-0/*"), None);
    }

    #[test]
    fn urls_trim_trailing_slash() {
        let store = RestDataStore::new("https://db.example.org/", "key");
        assert_eq!(
            store.table_url(EntityKind::ClimateImpact),
            "https://db.example.org/rest/v1/climate_impacts"
        );
    }

    mod postgrest {
        use super::*;
        use harvest_types::{NewGuidebook, NewPersonaCard, Steps};
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, header, header_regex, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const STAMP: &str = "2024-03-01T09:30:00Z";

        fn guidebook_row(id: RowId) -> Value {
            json!({
                "id": id,
                "title": "Reducing Food Waste in Food Banks",
                "description": null,
                "steps": "[\"Audit current waste levels\",\"Train staff and volunteers\"]",
                "estimated_time": "4-6 weeks",
                "difficulty_level": "Intermediate",
                "key_considerations": null,
                "resources_needed": null,
                "seed_key": "guidebook:food-waste",
                "created_at": STAMP,
                "updated_at": STAMP
            })
        }

        fn persona_row(id: RowId, name: &str) -> Value {
            json!({
                "id": id,
                "name": name,
                "age": 35,
                "occupation": null,
                "background": null,
                "challenges": null,
                "dietary_preferences": null,
                "household_size": 3,
                "location": null,
                "climate_impact_concerns": null,
                "created_at": STAMP,
                "updated_at": STAMP
            })
        }

        fn authed(table: &str, verb: &str) -> wiremock::MockBuilder {
            Mock::given(method(verb))
                .and(path(format!("/rest/v1/{table}")))
                .and(header("apikey", "service-key"))
                .and(header("authorization", "Bearer service-key"))
        }

        async fn store() -> (MockServer, RestDataStore) {
            let server = MockServer::start().await;
            let store = RestDataStore::new(server.uri(), "service-key");
            (server, store)
        }

        #[tokio::test]
        async fn fetch_all_orders_by_id_and_decodes_text_steps() {
            let (server, store) = store().await;
            authed("guidebooks", "GET")
                .and(query_param("select", "*"))
                .and(query_param("order", "id.asc"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([guidebook_row(1)])))
                .expect(1)
                .mount(&server)
                .await;

            let rows = store.fetch_all(EntityKind::Guidebook).await.unwrap();
            assert_eq!(rows.len(), 1);
            let Record::Guidebook(gb) = &rows[0] else { panic!("wrong kind") };
            assert_eq!(
                gb.steps.as_slice(),
                ["Audit current waste levels", "Train staff and volunteers"]
            );
            assert_eq!(gb.created_at.to_rfc3339(), "2024-03-01T09:30:00+00:00");
        }

        #[tokio::test]
        async fn fetch_by_id_filters_on_id() {
            let (server, store) = store().await;
            authed("personas", "GET")
                .and(query_param("id", "eq.7"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!([persona_row(7, "Sarah Johnson")])),
                )
                .expect(1)
                .mount(&server)
                .await;
            authed("personas", "GET")
                .and(query_param("id", "eq.8"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .expect(1)
                .mount(&server)
                .await;

            let Record::Persona(p) = store.fetch_by_id(EntityKind::Persona, 7).await.unwrap() else {
                panic!("wrong kind")
            };
            assert_eq!(p.id, 7);
            assert_eq!(p.name, "Sarah Johnson");

            let err = store.fetch_by_id(EntityKind::Persona, 8).await.unwrap_err();
            assert!(matches!(err, StoreError::NotFound { id: 8, .. }));
        }

        #[tokio::test]
        async fn count_reads_content_range() {
            let (server, store) = store().await;
            authed("climate_impacts", "GET")
                .and(header("prefer", "count=exact"))
                .respond_with(
                    ResponseTemplate::new(206)
                        .insert_header("content-range", "0-0/7")
                        .set_body_json(json!([{"id": 1}])),
                )
                .expect(1)
                .mount(&server)
                .await;

            assert_eq!(store.count(EntityKind::ClimateImpact).await.unwrap(), 7);
        }

        #[tokio::test]
        async fn table_exists_maps_missing_table_to_false() {
            let (server, store) = store().await;
            authed("personas", "GET")
                .and(query_param("limit", "0"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(&server)
                .await;
            authed("guidebooks", "GET")
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                    "code": "PGRST205",
                    "message": "Could not find the table 'public.guidebooks' in the schema cache"
                })))
                .mount(&server)
                .await;
            authed("implementation_plans", "GET")
                .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                    "code": "PGRST301",
                    "message": "JWT expired"
                })))
                .mount(&server)
                .await;

            assert!(store.table_exists(EntityKind::Persona).await.unwrap());
            assert!(!store.table_exists(EntityKind::Guidebook).await.unwrap());
            assert!(matches!(
                store.table_exists(EntityKind::ImplementationPlan).await,
                Err(StoreError::Backend(_))
            ));
        }

        #[tokio::test]
        async fn insert_asks_for_the_stored_row() {
            let (server, store) = store().await;
            authed("personas", "POST")
                .and(header("prefer", "return=representation"))
                .and(body_partial_json(json!({"name": "Emma Thompson", "household_size": 3})))
                .respond_with(
                    ResponseTemplate::new(201).set_body_json(json!([persona_row(12, "Emma Thompson")])),
                )
                .expect(1)
                .mount(&server)
                .await;

            let record = NewRecord::from(NewPersonaCard {
                name: "Emma Thompson".into(),
                household_size: Some(3),
                ..Default::default()
            });
            let stored = store.insert(record).await.unwrap();
            assert_eq!(stored.kind(), EntityKind::Persona);
            let Record::Persona(p) = stored else { panic!("wrong kind") };
            assert_eq!(p.id, 12);
        }

        #[tokio::test]
        async fn seed_ignores_duplicate_keys_and_counts_inserted_rows() {
            let (server, store) = store().await;
            authed("guidebooks", "POST")
                .and(query_param("on_conflict", "seed_key"))
                .and(header_regex("prefer", "resolution=ignore-duplicates"))
                .and(header_regex("prefer", "return=representation"))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!([guidebook_row(1)])))
                .expect(1)
                .mount(&server)
                .await;

            let rows = vec![
                SeedRow::new(
                    "guidebook:food-waste",
                    NewGuidebook {
                        title: "Reducing Food Waste in Food Banks".into(),
                        steps: Steps::from(vec!["Audit current waste levels"]),
                        ..Default::default()
                    },
                ),
                SeedRow::new(
                    "guidebook:cold-chain",
                    NewGuidebook {
                        title: "Cold chain".into(),
                        ..Default::default()
                    },
                ),
            ];
            // The second key already exists remotely, so only one row comes back.
            assert_eq!(store.seed(EntityKind::Guidebook, rows).await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn drop_schema_is_unsupported() {
        let store = RestDataStore::new("http://localhost:1", "key");
        assert!(matches!(
            store.drop_schema().await,
            Err(StoreError::Unsupported { .. })
        ));
    }
}
