use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;

/// 字段级校验错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// 统一错误类型
///
/// - 业务错误原样返回给客户端
/// - 数据库 / PDF / 内部错误只记录日志, 客户端拿到通用提示
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Errores de validación")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    BadRequest(String),
    #[error("No autenticado")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Pdf(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("{} no encontrado con ID: {}", what, id))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(errors) => {
                let details: IndexMap<&str, &str> = errors
                    .iter()
                    .map(|e| (e.field, e.message.as_str()))
                    .collect();
                json!({ "success": false, "error": self.to_string(), "detalles": details })
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                json!({ "success": false, "error": "Error interno del servidor" })
            }
            AppError::Pdf(e) | AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                json!({ "success": false, "error": "Error interno del servidor" })
            }
            _ => json!({ "success": false, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_lists_fields_in_order() {
        let (status, body) = body_json(AppError::Validation(vec![
            FieldError::new("username", "El nombre de usuario es obligatorio"),
            FieldError::new("password", "La contraseña es obligatoria"),
        ]))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        let keys: Vec<_> = body["detalles"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["username", "password"]);
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let (status, body) = body_json(AppError::Internal("secret path /etc".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error interno del servidor");
    }

    #[tokio::test]
    async fn business_errors_pass_message_through() {
        let (status, body) =
            body_json(AppError::Conflict("El usuario ya existe".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "El usuario ya existe");
        assert_eq!(AppError::not_found("Producto", 7).to_string(), "Producto no encontrado con ID: 7");
    }
}
