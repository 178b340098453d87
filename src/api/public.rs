//! 公开接口: 购物车计算, 展示辅助, 商品图片, 报价单提交

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{NewQuotation, ProductImages};
use crate::service::cart::{apply_discount, cart_total, count_items, validate_cart, CartRequest};
use crate::service::util::{
    decimal_value, filter_list, format_date, format_money, list_stats, status_badge,
};
use crate::service::validation::is_sale_email;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/carrito/calcular-total", post(cart_total_handler))
        .route("/carrito/contar-items", post(cart_count))
        .route("/carrito/validar", post(cart_validate))
        .route("/carrito/aplicar-descuento", post(cart_discount))
        .route("/imagen/:kind/:id", get(image))
        .route("/util/formatear-fecha", post(format_date_handler))
        .route("/util/estado-badge/:estado", get(badge))
        .route("/util/calcular-estadisticas", post(quotation_stats))
        .route("/util/filtrar-cotizaciones", post(filter_quotations))
        .route("/util/validar-email", post(validate_email))
        .route("/util/formatear-dinero", post(format_money_handler))
}

/// `{success: true, ...data}`
#[derive(Debug, Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

pub async fn cart_total_handler(Json(req): Json<CartRequest>) -> AppResult<Json<Value>> {
    let total = cart_total(&req.items)
        .map_err(|item| AppError::BadRequest(format!("Error al calcular total: {}", item)))?;
    Ok(Json(json!({
        "success": true,
        "formateado": format_money(&total),
        "total": total,
    })))
}

pub async fn cart_count(Json(req): Json<CartRequest>) -> AppResult<Json<Value>> {
    let total = count_items(&req.items)
        .map_err(|item| AppError::BadRequest(format!("Error al contar items: {}", item)))?;
    Ok(Json(json!({ "success": true, "total": total })))
}

pub async fn cart_validate(Json(req): Json<CartRequest>) -> Json<Value> {
    let errors = validate_cart(&req.items);
    let valid = errors.is_empty();
    Json(json!({ "success": valid, "valido": valid, "errores": errors }))
}

#[derive(Debug, Deserialize)]
pub struct DiscountRequest {
    pub total: Option<Value>,
    pub codigo: Option<String>,
}

pub async fn cart_discount(Json(req): Json<DiscountRequest>) -> AppResult<Response> {
    let total = req
        .total
        .as_ref()
        .and_then(decimal_value)
        .ok_or_else(|| AppError::BadRequest("Error al aplicar descuento: total inválido".to_string()))?;
    let result = apply_discount(&total, req.codigo.as_deref());
    Ok(Json(Success { success: true, data: result }).into_response())
}

/// base64 解码失败时原样返回文本字节
pub fn image_bytes(stored: &str) -> Vec<u8> {
    STANDARD
        .decode(stored.trim())
        .unwrap_or_else(|_| stored.as_bytes().to_vec())
}

/// 技术图缺失时退回主图
pub fn pick_image<'a>(images: &'a ProductImages, kind: &str) -> AppResult<Option<&'a str>> {
    let non_empty = |v: &'a Option<String>| v.as_deref().filter(|s| !s.trim().is_empty());
    let main = non_empty(&images.main_image);
    match kind {
        "principal" => Ok(main),
        "tecnica1" => Ok(non_empty(&images.tech_image_1).or(main)),
        "tecnica2" => Ok(non_empty(&images.tech_image_2).or(main)),
        other => Err(AppError::NotFound(format!("Tipo de imagen desconocido: {}", other))),
    }
}

pub async fn image(State(state): State<AppState>, Path((kind, id)): Path<(String, i64)>) -> AppResult<Response> {
    let images = state.products.images(id).await?;
    let stored = pick_image(&images, &kind)?
        .ok_or_else(|| AppError::NotFound("Imagen no encontrada".to_string()))?;
    Ok(([(CONTENT_TYPE, "image/jpeg")], image_bytes(stored)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct DateRequest {
    pub fecha: Option<String>,
}

pub async fn format_date_handler(Json(req): Json<DateRequest>) -> AppResult<Json<Value>> {
    let raw = req.fecha.unwrap_or_default();
    let formatted = format_date(&raw)
        .ok_or_else(|| AppError::BadRequest(format!("Error al formatear fecha: {}", raw)))?;
    Ok(Json(json!({ "success": true, "data": formatted })))
}

pub async fn badge(Path(estado): Path<String>) -> Json<Value> {
    Json(json!({ "success": true, "data": status_badge(&estado) }))
}

#[derive(Debug, Deserialize)]
pub struct QuotationListRequest {
    #[serde(default)]
    pub cotizaciones: Vec<Value>,
    pub termino: Option<String>,
    pub estado: Option<String>,
}

pub async fn quotation_stats(Json(req): Json<QuotationListRequest>) -> Json<Value> {
    Json(json!({ "success": true, "data": list_stats(&req.cotizaciones) }))
}

pub async fn filter_quotations(Json(req): Json<QuotationListRequest>) -> Json<Value> {
    let found = filter_list(req.cotizaciones, req.termino.as_deref(), req.estado.as_deref());
    Json(json!({ "success": true, "total": found.len(), "data": found }))
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

pub async fn validate_email(Json(req): Json<EmailRequest>) -> AppResult<Json<Value>> {
    let email = req
        .email
        .ok_or_else(|| AppError::BadRequest("Error al validar email".to_string()))?;
    Ok(Json(json!({
        "success": true,
        "valido": is_sale_email(&email),
        "email": email,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MoneyRequest {
    pub cantidad: Option<Value>,
}

pub async fn format_money_handler(Json(req): Json<MoneyRequest>) -> AppResult<Json<Value>> {
    let amount = req
        .cantidad
        .as_ref()
        .and_then(decimal_value)
        .ok_or_else(|| AppError::BadRequest("Error al formatear dinero".to_string()))?;
    Ok(Json(json!({
        "success": true,
        "data": format_money(&amount),
        "cantidad": amount,
    })))
}

/// 购物车页面提交报价单, 状态一律从待处理开始
pub async fn submit_quotation(
    State(state): State<AppState>,
    Json(mut req): Json<NewQuotation>,
) -> AppResult<Json<Value>> {
    req.status = None;
    let saved = state.quotations.create(&req).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Cotización enviada exitosamente",
        "id": saved.id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(main: Option<&str>, t1: Option<&str>, t2: Option<&str>) -> ProductImages {
        ProductImages {
            main_image: main.map(str::to_string),
            tech_image_1: t1.map(str::to_string),
            tech_image_2: t2.map(str::to_string),
        }
    }

    #[test]
    fn technical_images_fall_back_to_main() {
        let imgs = images(Some("bWFpbg=="), None, Some("dDI="));
        assert_eq!(pick_image(&imgs, "principal").unwrap(), Some("bWFpbg=="));
        assert_eq!(pick_image(&imgs, "tecnica1").unwrap(), Some("bWFpbg=="));
        assert_eq!(pick_image(&imgs, "tecnica2").unwrap(), Some("dDI="));
        assert_eq!(pick_image(&images(None, None, None), "tecnica1").unwrap(), None);
        assert!(matches!(pick_image(&imgs, "lateral"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn undecodable_image_is_served_raw() {
        assert_eq!(image_bytes("bWFpbg=="), b"main".to_vec());
        assert_eq!(image_bytes("no es base64!"), b"no es base64!".to_vec());
    }
}
