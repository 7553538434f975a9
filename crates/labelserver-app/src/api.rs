// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON HTTP API over the printer registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tower_http::trace::TraceLayer;

use labelserver_core::error::LabelError;
use labelserver_core::types::{JobId, JobInfo, LabelTypeInfo};
use labelserver_print::Registry;

type Shared = Arc<Registry>;

/// Build the API router.
pub fn router(registry: Shared) -> Router {
    Router::new()
        .route("/api/printers", get(list_printers))
        .route("/api/printers/{printer}", get(get_printer))
        .route(
            "/api/printers/{printer}/jobs",
            get(list_jobs).post(submit_job),
        )
        .route(
            "/api/printers/{printer}/jobs/completed",
            get(list_completed_jobs),
        )
        .route(
            "/api/printers/{printer}/jobs/{id}",
            get(get_job).delete(cancel_job),
        )
        .with_state(registry)
        .layer(TraceLayer::new_for_http())
}

// -- Errors ------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Label(LabelError),
    BadRequest(String),
}

impl From<LabelError> for ApiError {
    fn from(err: LabelError) -> Self {
        ApiError::Label(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(msg) => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response();
            }
            ApiError::Label(err) => err,
        };

        let status = match &err {
            LabelError::PrinterNotFound(_) | LabelError::JobNotFound { .. } => StatusCode::NOT_FOUND,
            LabelError::LabelTypeNotFound { .. } | LabelError::Queue(_) => StatusCode::BAD_REQUEST,
            LabelError::Validation(v) => {
                let body = json!({ "error": err.to_string(), "fields": v.fields });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            other => {
                tracing::error!(error = %other, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": err.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// -- Response bodies ---------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct PrinterSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrinterDetail {
    pub id: String,
    pub name: String,
    pub label_types: BTreeMap<String, LabelTypeInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuery {
    #[serde(rename = "type")]
    pub label_type: Option<String>,
}

// -- Handlers ----------------------------------------------------------

/// GET /api/printers
async fn list_printers(State(registry): State<Shared>) -> Json<Vec<PrinterSummary>> {
    Json(
        registry
            .printers()
            .map(|p| PrinterSummary {
                id: p.id().to_string(),
                name: p.name().to_string(),
            })
            .collect(),
    )
}

/// GET /api/printers/{printer}
async fn get_printer(
    State(registry): State<Shared>,
    Path(printer): Path<String>,
) -> ApiResult<Json<PrinterDetail>> {
    let p = registry.get(&printer)?;
    Ok(Json(PrinterDetail {
        id: p.id().to_string(),
        name: p.name().to_string(),
        label_types: p
            .label_types()
            .into_iter()
            .map(|info| (info.id.clone(), info))
            .collect(),
    }))
}

/// GET /api/printers/{printer}/jobs
async fn list_jobs(
    State(registry): State<Shared>,
    Path(printer): Path<String>,
) -> ApiResult<Json<Vec<JobInfo>>> {
    let jobs = registry.pending_jobs(&printer)?;
    Ok(Json(jobs.iter().map(|j| j.info()).collect()))
}

/// GET /api/printers/{printer}/jobs/completed
async fn list_completed_jobs(
    State(registry): State<Shared>,
    Path(printer): Path<String>,
) -> ApiResult<Json<Vec<JobInfo>>> {
    let jobs = registry.completed_jobs(&printer)?;
    Ok(Json(jobs.iter().map(|j| j.info()).collect()))
}

/// POST /api/printers/{printer}/jobs?type={label_type}
async fn submit_job(
    State(registry): State<Shared>,
    Path(printer): Path<String>,
    Query(query): Query<SubmitQuery>,
    Json(data): Json<Map<String, Value>>,
) -> ApiResult<Json<JobInfo>> {
    let label_type = query
        .label_type
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing query parameter: type".into()))?;
    tracing::debug!(%printer, %label_type, "job submitted");
    let job = registry.submit(&printer, &label_type, &data)?;
    Ok(Json(job.info()))
}

/// GET /api/printers/{printer}/jobs/{id}
async fn get_job(
    State(registry): State<Shared>,
    Path((printer, id)): Path<(String, JobId)>,
) -> ApiResult<Json<JobInfo>> {
    Ok(Json(registry.job(&printer, id)?.info()))
}

/// DELETE /api/printers/{printer}/jobs/{id}
async fn cancel_job(
    State(registry): State<Shared>,
    Path((printer, id)): Path<(String, JobId)>,
) -> ApiResult<Json<CancelResponse>> {
    let cancelled = registry.cancel(&printer, id)?;
    Ok(Json(CancelResponse { cancelled }))
}
