use std::sync::Arc;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use harvest_core::AppError;
use serde::Serialize;

use crate::pages::{Pages, RenderError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Storage(_) | AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Failure of a JSON route; renders as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub route: &'static str,
    pub error: AppError,
}

impl ApiError {
    pub fn at(route: &'static str) -> impl FnOnce(AppError) -> Self {
        move |error| Self { route, error }
    }

    /// Unparseable request bodies go through the same boundary as field errors.
    pub fn malformed(route: &'static str, rejection: JsonRejection) -> Self {
        Self {
            route,
            error: AppError::validation(format!("malformed JSON body: {}", rejection.body_text())),
        }
    }

    pub fn bad_path(route: &'static str, rejection: PathRejection) -> Self {
        Self {
            route,
            error: AppError::validation(format!("invalid path: {}", rejection.body_text())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        log_failure(self.route, status, &self.error);
        let body = ErrorResponse {
            error: self.error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Failure of an HTML route; renders the error page.
pub struct PageError {
    pub route: &'static str,
    pub error: AppError,
    pub pages: Arc<Pages>,
}

impl PageError {
    pub fn at(route: &'static str, pages: &Arc<Pages>) -> impl FnOnce(AppError) -> Self {
        let pages = Arc::clone(pages);
        move |error| Self { route, error, pages }
    }

    pub fn render(route: &'static str, pages: &Arc<Pages>) -> impl FnOnce(RenderError) -> Self {
        let pages = Arc::clone(pages);
        move |e| Self {
            route,
            error: AppError::Storage(harvest_store::StoreError::Backend(e.to_string())),
            pages,
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        log_failure(self.route, status, &self.error);
        let html = self.pages.error(status.as_u16(), &self.error.to_string());
        (status, Html(html)).into_response()
    }
}

fn log_failure(route: &str, status: StatusCode, error: &AppError) {
    tracing::error!(route, status = status.as_u16(), %error, "request failed");
}
