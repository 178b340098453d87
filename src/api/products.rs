use super::AppState;
use crate::auth::require_admin;
use crate::error::AppResult;
use crate::models::{Product, ProductForm};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{middleware, Json, Router};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};

/// 读: 管理员与销售员; 写: 仅管理员
pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/", get(list))
        .route("/buscar", get(search))
        .route("/filtrar", get(filter))
        .route("/precio", get(by_price))
        .route("/disponibles", get(available))
        .route("/categorias", get(categories))
        .route("/estados", get(statuses))
        .route("/:id", get(get_one));

    let write = Router::new()
        .route("/", post(create))
        .route("/:id", put(update).delete(discontinue))
        .route_layer(middleware::from_fn(require_admin));

    read.merge(write)
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.list().await?))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Product>> {
    Ok(Json(state.products.get(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub termino: Option<String>,
    pub categoria: Option<String>,
    pub estado: Option<String>,
}

pub async fn search(State(state): State<AppState>, Query(q): Query<FilterQuery>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.search(q.termino.as_deref()).await?))
}

/// 空值表示不限
pub async fn filter(State(state): State<AppState>, Query(q): Query<FilterQuery>) -> AppResult<Json<Vec<Product>>> {
    let found = state
        .products
        .filter(q.termino.as_deref(), q.categoria.as_deref(), q.estado.as_deref())
        .await?;
    Ok(Json(found))
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceQuery {
    pub min: Option<BigDecimal>,
    pub max: Option<BigDecimal>,
}

pub async fn by_price(State(state): State<AppState>, Query(q): Query<PriceQuery>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.by_price(q.min, q.max).await?))
}

pub async fn available(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(state.products.available().await?))
}

pub async fn categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(state.products.categories().await?))
}

pub async fn statuses(State(state): State<AppState>) -> Json<Vec<&'static str>> {
    Json(state.products.statuses())
}

pub async fn create(State(state): State<AppState>, Json(form): Json<ProductForm>) -> AppResult<Json<Value>> {
    let id = state.products.create(&form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Producto agregado exitosamente",
        "id": id,
    })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<ProductForm>,
) -> AppResult<Json<Value>> {
    state.products.update(id, &form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Producto actualizado exitosamente",
        "id": id,
    })))
}

/// 停售, 不删除
pub async fn discontinue(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    state.products.discontinue(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Producto descontinuado exitosamente",
    })))
}
