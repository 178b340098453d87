use super::{pdf_attachment, render_pdf, AppState};
use crate::error::AppResult;
use crate::pdf::report_file_name;
use crate::service::report::{
    available_months, CategorySales, ClosedQuotation, MonthOption, MonthlySales, ReportFilter,
    ReportQuery, ReportSummary, SellerReport, SoldProduct, TopProduct,
};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use indexmap::IndexMap;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/resumen", get(summary))
        .route("/ventas-mensuales", get(monthly))
        .route("/estado-cotizaciones", get(quotation_statuses))
        .route("/ventas-categoria", get(by_category))
        .route("/top-productos", get(top_products))
        .route("/vendedores", get(sellers))
        .route("/categorias", get(categories))
        .route("/productos-vendidos", get(products_sold))
        .route("/cotizaciones-cerradas", get(closed_quotations))
        .route("/meses-disponibles", get(months))
        .route("/exportar-pdf", get(export_pdf))
}

pub async fn summary(State(state): State<AppState>, Query(q): Query<ReportQuery>) -> AppResult<Json<ReportSummary>> {
    let filter = ReportFilter::parse(&q)?;
    Ok(Json(state.reports.summary(&filter, Utc::now().date_naive()).await?))
}

pub async fn monthly(State(state): State<AppState>) -> AppResult<Json<Vec<MonthlySales>>> {
    Ok(Json(state.reports.monthly(Utc::now().date_naive()).await?))
}

pub async fn quotation_statuses(State(state): State<AppState>) -> AppResult<Json<IndexMap<&'static str, usize>>> {
    Ok(Json(state.reports.quotation_statuses().await?))
}

pub async fn by_category(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> AppResult<Json<Vec<CategorySales>>> {
    Ok(Json(state.reports.by_category(&ReportFilter::parse(&q)?).await?))
}

pub async fn top_products(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> AppResult<Json<Vec<TopProduct>>> {
    Ok(Json(state.reports.top_products(&ReportFilter::parse(&q)?).await?))
}

pub async fn sellers(State(state): State<AppState>) -> AppResult<Json<Vec<SellerReport>>> {
    Ok(Json(state.reports.sellers().await?))
}

pub async fn categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.reports.categories().await?))
}

/// 销售明细 + 已成交报价单的商品
pub async fn products_sold(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> AppResult<Json<Vec<SoldProduct>>> {
    Ok(Json(state.reports.products_sold(&ReportFilter::parse(&q)?).await?))
}

pub async fn closed_quotations(
    State(state): State<AppState>,
    Query(q): Query<ReportQuery>,
) -> AppResult<Json<Vec<ClosedQuotation>>> {
    Ok(Json(state.reports.closed_quotations(&ReportFilter::parse(&q)?).await?))
}

pub async fn months() -> Json<Vec<MonthOption>> {
    Json(available_months(Utc::now().date_naive()))
}

pub async fn export_pdf(State(state): State<AppState>, Query(q): Query<ReportQuery>) -> AppResult<Response> {
    let filter = ReportFilter::parse(&q)?;
    let today = Utc::now().date_naive();
    let report = state.reports.full(&filter, today).await?;
    let bytes = render_pdf(&state, move |pdf| pdf.report(&report)).await?;
    Ok(pdf_attachment(bytes, &report_file_name(today)))
}
