use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use harvest_core::{
    forms::{ClimateImpactForm, FeedbackForm, GuidebookForm, PersonaForm, PlanForm},
    Catalog,
};
use harvest_types::{ClimateImpact, CommunityFeedback, Guidebook, ImplementationPlan, PersonaCard};
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod pages;
pub mod routes;

use pages::Pages;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Result<Self, pages::RenderError> {
        Ok(Self {
            catalog,
            pages: Arc::new(Pages::new()?),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let pages = Router::new()
        .route("/", get(routes::index))
        .route("/process", get(routes::process))
        .route("/personas", get(routes::personas_page))
        .route("/guidebooks", get(routes::guidebooks_page))
        .route("/implementation-plans", get(routes::plans_page))
        .route("/community-feedback", get(routes::feedback_page))
        .route("/climate-impacts", get(routes::climate_impacts_page));

    let api = Router::new()
        .route(
            "/api/personas",
            get(routes::list_json::<PersonaCard>).post(routes::create_json::<PersonaForm>),
        )
        .route("/api/personas/:id", get(routes::show_json::<PersonaCard>))
        .route(
            "/api/guidebooks",
            get(routes::list_json::<Guidebook>).post(routes::create_json::<GuidebookForm>),
        )
        .route("/api/guidebooks/:id", get(routes::show_json::<Guidebook>))
        .route(
            "/api/implementation-plans",
            get(routes::list_json::<ImplementationPlan>).post(routes::create_json::<PlanForm>),
        )
        .route(
            "/api/implementation-plans/:id",
            get(routes::show_json::<ImplementationPlan>),
        )
        .route(
            "/api/community-feedback",
            get(routes::list_json::<CommunityFeedback>).post(routes::create_json::<FeedbackForm>),
        )
        .route(
            "/api/community-feedback/:id",
            get(routes::show_json::<CommunityFeedback>),
        )
        .route(
            "/api/climate-impacts",
            get(routes::list_json::<ClimateImpact>).post(routes::create_json::<ClimateImpactForm>),
        )
        .route(
            "/api/climate-impacts/:id",
            get(routes::show_json::<ClimateImpact>),
        )
        // Singular path kept for existing form posts.
        .route(
            "/api/climate-impact",
            post(routes::create_json::<ClimateImpactForm>),
        );

    let not_found_pages = Arc::clone(&state.pages);
    Router::new()
        .route("/healthz", get(routes::healthz))
        .merge(pages)
        .merge(api)
        .fallback(move || {
            let pages = Arc::clone(&not_found_pages);
            async move {
                (
                    StatusCode::NOT_FOUND,
                    Html(pages.error(404, "The requested page was not found.")),
                )
                    .into_response()
            }
        })
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl+C or SIGTERM, then close the store.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let catalog = Arc::clone(&state.catalog);
    let app = router(state);

    info!("Server running on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    catalog.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
