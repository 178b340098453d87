use super::{pdf_attachment, render_pdf, AppState};
use crate::auth::CurrentUser;
use crate::db::SaleFilter;
use crate::error::{AppError, AppResult};
use crate::models::{RegisterSaleRequest, Sale, SaleStatus};
use crate::pdf::{sale_file_name, sales_history_file_name, HistoryFilters};
use crate::service::calendar::start_of_day;
use crate::service::sale::{day_bounds, DailyReport};
use crate::service::validation::non_blank;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/registrar", post(register))
        .route("/exportar-pdf", get(export_history))
        .route("/reportes/dia", get(daily_report))
        .route("/estados/:estado", get(by_status))
        .route("/:id", get(get_one).delete(cancel))
        .route("/:id/estado", put(update_status))
        .route("/:id/pdf", get(receipt))
}

/// 列表筛选参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleQuery {
    #[serde(rename = "vendedorId")]
    pub seller_id: Option<i64>,
    #[serde(rename = "estado")]
    pub status: Option<String>,
    #[serde(rename = "fechaInicio")]
    pub from: Option<String>,
    #[serde(rename = "fechaFin")]
    pub to: Option<String>,
}

fn parse_status(s: &str) -> AppResult<SaleStatus> {
    s.parse()
        .map_err(|_| AppError::BadRequest(format!("Estado inválido: {}", s)))
}

fn parse_day(s: Option<&str>) -> AppResult<Option<NaiveDate>> {
    non_blank(s)
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| AppError::BadRequest(format!("Fecha inválida: {}", d)))
        })
        .transpose()
}

impl SaleQuery {
    /// 销售员只能看到自己的销售单, `vendedorId` 对其无效
    pub fn to_filter(&self, user: &CurrentUser) -> AppResult<SaleFilter> {
        let seller_id = if user.is_admin() {
            self.seller_id
        } else {
            Some(user.id())
        };
        let status = non_blank(self.status.as_deref())
            .map(parse_status)
            .transpose()?;
        let from = parse_day(self.from.as_deref())?;
        let to = parse_day(self.to.as_deref())?;
        Ok(SaleFilter {
            seller_id,
            status,
            from: from.map(start_of_day),
            to: to.map(|d| start_of_day(d) + Duration::days(1)),
        })
    }
}

/// 取销售单并检查归属
async fn owned_sale(state: &AppState, user: &CurrentUser, id: i64) -> AppResult<Sale> {
    let sale = state.sales.get(id).await?;
    if !user.can_access_seller(Some(sale.seller_id)) {
        tracing::warn!(username = %user.0.username, sale_id = id, "sale of another seller");
        return Err(AppError::Forbidden(
            "No tienes permisos para acceder a esta venta".to_string(),
        ));
    }
    Ok(sale)
}

pub async fn register(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RegisterSaleRequest>,
) -> AppResult<Json<Value>> {
    let sale = state.sales.register(&req, user.id()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Venta registrada exitosamente",
        "ventaId": sale.id,
        "total": sale.total,
        "estado": sale.status.as_str(),
    })))
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SaleQuery>,
) -> AppResult<Json<Vec<Sale>>> {
    let filter = query.to_filter(&user)?;
    Ok(Json(state.sales.list(&filter).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Sale>> {
    Ok(Json(owned_sale(&state, &user, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub estado: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdate>,
) -> AppResult<Json<Value>> {
    let next = non_blank(body.estado.as_deref())
        .ok_or_else(|| AppError::BadRequest("El estado es requerido".to_string()))
        .and_then(parse_status)?;
    owned_sale(&state, &user, id).await?;
    let sale = state.sales.update_status(id, next).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Estado actualizado exitosamente",
        "estado": sale.status.as_str(),
    })))
}

/// 取消而不是删除
pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    owned_sale(&state, &user, id).await?;
    let sale = state.sales.update_status(id, SaleStatus::Cancelled).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Venta cancelada exitosamente",
        "estado": sale.status.as_str(),
    })))
}

pub async fn daily_report(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<DailyReport>> {
    if user.is_admin() {
        return Ok(Json(state.sales.daily_report().await?));
    }
    let (from, to) = day_bounds(Utc::now());
    let own = state
        .sales
        .list(&SaleFilter {
            seller_id: Some(user.id()),
            from: Some(from),
            to: Some(to),
            ..Default::default()
        })
        .await?;
    Ok(Json(DailyReport::from_sales(&own)))
}

pub async fn by_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(estado): Path<String>,
) -> AppResult<Json<Vec<Sale>>> {
    let query = SaleQuery {
        status: Some(estado),
        ..Default::default()
    };
    Ok(Json(state.sales.list(&query.to_filter(&user)?).await?))
}

pub async fn receipt(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let sale = owned_sale(&state, &user, id).await?;
    let bytes = render_pdf(&state, move |pdf| pdf.sale_receipt(&sale)).await?;
    Ok(pdf_attachment(bytes, &sale_file_name(id, Utc::now().date_naive())))
}

pub async fn export_history(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SaleQuery>,
) -> AppResult<Response> {
    let filter = query.to_filter(&user)?;
    let seller = match filter.seller_id {
        Some(id) if id == user.id() => Some(user.0.display_name().to_string()),
        Some(id) => Some(state.users.get(id).await?.display_name().to_string()),
        None => None,
    };
    let filters = HistoryFilters {
        seller,
        status: filter.status.map(|s| s.label().to_string()),
    };
    let sales = state.sales.list(&filter).await?;
    let bytes = render_pdf(&state, move |pdf| pdf.sales_history(&sales, &filters)).await?;
    Ok(pdf_attachment(bytes, &sales_history_file_name(Utc::now())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, ADMIN_ROLE, SELLER_ROLE};

    fn user(id: i64, role: &str) -> CurrentUser {
        CurrentUser(User {
            id,
            username: format!("user{id}"),
            password_hash: String::new(),
            full_name: None,
            email: None,
            phone: None,
            role_id: 1,
            role: role.into(),
        })
    }

    #[test]
    fn seller_filter_is_forced_to_own_sales() {
        let q = SaleQuery {
            seller_id: Some(99),
            ..Default::default()
        };
        assert_eq!(q.to_filter(&user(5, SELLER_ROLE)).unwrap().seller_id, Some(5));
        assert_eq!(q.to_filter(&user(1, ADMIN_ROLE)).unwrap().seller_id, Some(99));
        assert_eq!(
            SaleQuery::default().to_filter(&user(1, ADMIN_ROLE)).unwrap().seller_id,
            None
        );
    }

    #[test]
    fn date_range_covers_whole_days() {
        let q = SaleQuery {
            from: Some("2024-05-01".into()),
            to: Some("2024-05-31".into()),
            status: Some("pendiente".into()),
            ..Default::default()
        };
        let f = q.to_filter(&user(1, ADMIN_ROLE)).unwrap();
        assert_eq!(f.status, Some(SaleStatus::Pending));
        assert_eq!(f.from.unwrap().to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(f.to.unwrap().to_rfc3339(), "2024-06-01T00:00:00+00:00");
    }

    #[test]
    fn bad_status_or_date_is_rejected() {
        let admin = user(1, ADMIN_ROLE);
        let q = SaleQuery {
            status: Some("PAGADA".into()),
            ..Default::default()
        };
        assert!(matches!(q.to_filter(&admin), Err(AppError::BadRequest(_))));
        let q = SaleQuery {
            from: Some("01/05/2024".into()),
            ..Default::default()
        };
        assert!(matches!(q.to_filter(&admin), Err(AppError::BadRequest(_))));
    }
}
