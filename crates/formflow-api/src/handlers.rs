//! API Handlers
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use formflow_core::{
    FormFilter, FormRecord, FormflowError, LogEntry, LogFilter, LogLevel, Page, PageRequest,
    ParsedFields, SubmissionFilter, SubmissionRecord, SubmissionStatus, TargetConfig,
    TargetOverrides, FORMFLOW_VERSION,
};

use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: usize = 20;

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": FORMFLOW_VERSION })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| ApiError::Internal(format!("metrics encoding failed: {}", e)))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

// ---- forms ----

#[derive(Debug, Deserialize)]
pub struct RegisterFormRequest {
    #[serde(default)]
    pub source_file_name: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub parsed_fields: ParsedFields,
}

pub async fn register_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<RegisterFormRequest>,
) -> Result<(StatusCode, Json<FormRecord>), ApiError> {
    if payload.source_file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("source_file_name is required".into()));
    }

    let form = state
        .forms
        .save(FormRecord::new(
            payload.source_file_name,
            payload.size_bytes,
            &current.user.id,
            payload.parsed_fields,
        ))
        .await?;

    append(
        &state,
        LogEntry::new(LogLevel::Info, "form registered")
            .with_form(&form.id)
            .with_user(&current.user.id)
            .with_meta("field_count", json!(form.parsed_fields.len()))
            .with_meta("source_file", json!(form.source_file_name)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(form)))
}

#[derive(Debug, Default, Deserialize)]
pub struct FormListQuery {
    pub status: Option<String>,
    pub uploaded_by: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_forms(
    State(state): State<AppState>,
    Query(query): Query<FormListQuery>,
) -> Result<Json<Page<FormRecord>>, ApiError> {
    let filter = FormFilter {
        status: parse_status(query.status.as_deref())?,
        uploaded_by: query.uploaded_by,
    };
    let page = page_request(query.page, query.limit, PageRequest::default().limit);
    Ok(Json(state.forms.list(&filter, page).await?))
}

pub async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FormRecord>, ApiError> {
    state
        .forms
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("form {} not found", id)))
}

// ---- submissions ----

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    pub form_id: Option<String>,
    pub target_website: Option<String>,
    /// Catalog entry name
    pub target: Option<String>,
    pub config: Option<TargetOverrides>,
}

pub async fn submit(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form_id = payload
        .form_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("form_id is required".into()))?;
    let target = state.catalog.resolve(
        payload.target.as_deref(),
        payload.config,
        payload.target_website.as_deref(),
    )?;

    let (record, _) = state.service.request(&form_id, current.user, target).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "submission_id": record.id, "status": record.status })),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryRequest {
    pub target_website: Option<String>,
    pub target: Option<String>,
    pub config: Option<TargetOverrides>,
}

pub async fn retry_submission(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    payload: Option<Json<RetryRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let original = state.service.submission(&id).await?;
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let target = retry_target(&state, &original, payload).await?;

    let (record, _) = state.service.retry(original, current.user, target).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "submission_id": record.id, "retry_of": id })),
    ))
}

/// The original attempt's target, with anything the request names layered on.
async fn retry_target(
    state: &AppState,
    original: &SubmissionRecord,
    payload: RetryRequest,
) -> Result<TargetConfig, ApiError> {
    let base = match payload.target.as_deref() {
        Some(name) => state
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| FormflowError::Config(format!("unknown target '{}'", name)))?,
        None => state.service.target_for(original).await,
    };
    let mut target = match payload.config {
        Some(overrides) => overrides.apply_to(base),
        None => base,
    };
    if let Some(url) = payload.target_website.filter(|u| !u.trim().is_empty()) {
        target.url = url;
    }
    if target.url.trim().is_empty() {
        target.url = original.target_website.clone();
    }
    target.validate()?;
    Ok(target)
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionListQuery {
    pub form_id: Option<String>,
    pub status: Option<String>,
    pub submitted_by: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<Json<Page<SubmissionRecord>>, ApiError> {
    let filter = SubmissionFilter {
        form_id: query.form_id,
        status: parse_status(query.status.as_deref())?,
        submitted_by: query.submitted_by,
    };
    let page = page_request(query.page, query.limit, PageRequest::default().limit);
    Ok(Json(state.submissions.list(&filter, page).await?))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionRecord>, ApiError> {
    Ok(Json(state.service.submission(&id).await?))
}

// ---- logs ----

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub level: Option<String>,
    pub submission_id: Option<String>,
    pub form_id: Option<String>,
    pub user_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Page<LogEntry>>, ApiError> {
    let filter = LogFilter {
        level: query
            .level
            .as_deref()
            .map(str::parse::<LogLevel>)
            .transpose()?,
        submission_id: query.submission_id,
        form_id: query.form_id,
        user_id: query.user_id,
        since: query.since,
        until: query.until,
        search: query.q.filter(|q| !q.trim().is_empty()),
    };
    let page = page_request(query.page, query.limit, DEFAULT_LOG_LIMIT);
    Ok(Json(state.log.query(&filter, page).await?))
}

#[derive(Debug, Deserialize)]
pub struct ManualLogRequest {
    pub level: LogLevel,
    pub message: String,
    pub submission_id: Option<String>,
    pub form_id: Option<String>,
    pub metadata: Option<HashMap<String, Value>>,
}

pub async fn create_log(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ManualLogRequest>,
) -> Result<(StatusCode, Json<LogEntry>), ApiError> {
    if !current.is_admin() {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message is required".into()));
    }

    let mut entry = LogEntry::new(payload.level, payload.message).with_user(&current.user.id);
    if let Some(id) = payload.submission_id {
        entry = entry.with_submission(id);
    }
    if let Some(id) = payload.form_id {
        entry = entry.with_form(id);
    }
    for (key, value) in payload.metadata.unwrap_or_default() {
        entry = entry.with_meta(key, value);
    }

    let entry = state.log.append(entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

fn parse_status(status: Option<&str>) -> Result<Option<SubmissionStatus>, ApiError> {
    Ok(status.map(str::parse::<SubmissionStatus>).transpose()?)
}

fn page_request(page: Option<usize>, limit: Option<usize>, default_limit: usize) -> PageRequest {
    PageRequest::new(page.unwrap_or(1), limit.unwrap_or(default_limit))
}

async fn append(state: &AppState, entry: LogEntry) {
    if let Err(e) = state.log.append(entry).await {
        tracing::warn!(error = %e, "event log append failed");
    }
}
