use super::{pdf_attachment, render_pdf, AppState};
use crate::error::{AppError, AppResult};
use crate::models::{NewQuotation, Quotation, QUOTATION_STATUSES};
use crate::pdf::{quotation_file_name, quotation_list_file_name};
use crate::service::calendar::start_of_day;
use crate::service::validation::non_blank;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/buscar", get(search))
        .route("/rango", get(between))
        .route("/estados", get(statuses))
        .route("/contador-estados", get(count_by_status))
        .route("/exportar-pdf", get(export_list))
        .route("/estado/:estado", get(by_status))
        .route("/email/:email", get(by_email))
        .route("/:id", get(get_one).delete(delete))
        .route("/:id/estado", put(update_status))
        .route("/:id/pdf", get(export_one))
}

/// `{success, data, total}`
#[derive(Debug, Serialize)]
pub struct QuotationList {
    pub success: bool,
    pub data: Vec<Quotation>,
    pub total: usize,
}

impl From<Vec<Quotation>> for QuotationList {
    fn from(data: Vec<Quotation>) -> Self {
        Self {
            success: true,
            total: data.len(),
            data,
        }
    }
}

fn one(q: Quotation) -> Json<Value> {
    Json(json!({ "success": true, "data": q }))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<QuotationList>> {
    Ok(Json(state.quotations.list().await?.into()))
}

pub async fn create(State(state): State<AppState>, Json(req): Json<NewQuotation>) -> AppResult<Json<Value>> {
    let saved = state.quotations.create(&req).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cotización registrada correctamente",
        "data": saved,
    })))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    Ok(one(state.quotations.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub estado: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> AppResult<Json<Value>> {
    let updated = state.quotations.update_status(id, body.estado.as_deref()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Estado actualizado correctamente",
        "data": updated,
    })))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    state.quotations.delete(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cotización eliminada correctamente",
    })))
}

pub async fn by_status(State(state): State<AppState>, Path(estado): Path<String>) -> AppResult<Json<QuotationList>> {
    Ok(Json(state.quotations.by_status(&estado).await?.into()))
}

pub async fn by_email(State(state): State<AppState>, Path(email): Path<String>) -> AppResult<Json<QuotationList>> {
    Ok(Json(state.quotations.by_email(&email).await?.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub termino: Option<String>,
    pub estado: Option<String>,
}

pub async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> AppResult<Json<QuotationList>> {
    Ok(Json(state.quotations.search(q.termino.as_deref()).await?.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    #[serde(rename = "fechaInicio")]
    pub from: Option<String>,
    #[serde(rename = "fechaFin")]
    pub to: Option<String>,
}

fn required_day(v: Option<&str>, field: &str) -> AppResult<NaiveDate> {
    let s = non_blank(v).ok_or_else(|| AppError::BadRequest(format!("{} es requerido", field)))?;
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| AppError::BadRequest(format!("Fecha inválida: {}", s)))
}

/// 按创建日期 (整天) 查询
pub async fn between(State(state): State<AppState>, Query(q): Query<RangeQuery>) -> AppResult<Json<QuotationList>> {
    let from = required_day(q.from.as_deref(), "fechaInicio")?;
    let to = required_day(q.to.as_deref(), "fechaFin")?;
    if from > to {
        return Err(AppError::BadRequest(
            "La fecha de inicio no puede ser posterior a la fecha fin".to_string(),
        ));
    }
    let list = state
        .quotations
        .between(start_of_day(from), start_of_day(to) + Duration::days(1))
        .await?;
    Ok(Json(list.into()))
}

pub async fn statuses() -> Json<[&'static str; 5]> {
    Json(QUOTATION_STATUSES)
}

pub async fn count_by_status(State(state): State<AppState>) -> AppResult<Json<Value>> {
    Ok(Json(json!({
        "success": true,
        "data": state.quotations.count_by_status().await?,
    })))
}

pub async fn export_one(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Response> {
    let q = state.quotations.get(id).await?;
    let bytes = render_pdf(&state, move |pdf| pdf.quotation(&q)).await?;
    Ok(pdf_attachment(bytes, &quotation_file_name(id, Utc::now().date_naive())))
}

/// 可按状态筛选
pub async fn export_list(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> AppResult<Response> {
    let status = non_blank(q.estado.as_deref()).map(str::to_string);
    let list = match &status {
        Some(s) => state.quotations.by_status(s).await?,
        None => state.quotations.list().await?,
    };
    let bytes = render_pdf(&state, move |pdf| pdf.quotation_list(&list, status.as_deref())).await?;
    Ok(pdf_attachment(bytes, &quotation_list_file_name(Utc::now())))
}
