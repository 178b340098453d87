use super::AppState;
use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::service::dashboard::Dashboard;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

pub fn routes() -> Router<AppState> {
    Router::new().route("/estadisticas", get(statistics))
}

/// 按角色返回管理员或销售员视图
pub async fn statistics(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Dashboard>> {
    let today = Utc::now().date_naive();
    Ok(Json(state.dashboard.for_user(&user.0, today).await?))
}
