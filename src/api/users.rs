use super::AppState;
use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::{Role, User, UserForm};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/roles", get(roles))
        .route("/:id", get(get_one).put(update).delete(delete))
        .route("/:id/reset-password", post(reset_password))
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list().await?))
}

pub async fn roles(State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    Ok(Json(state.users.roles().await?))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<User>> {
    Ok(Json(state.users.get(id).await?))
}

pub async fn create(State(state): State<AppState>, Json(form): Json<UserForm>) -> AppResult<Json<Value>> {
    let user = state.users.create(&form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Usuario creado exitosamente",
        "data": user,
    })))
}

/// 密码留空则保持不变
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<UserForm>,
) -> AppResult<Json<Value>> {
    let user = state.users.update(id, &form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Usuario actualizado exitosamente",
        "data": user,
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    state.users.delete(id, current.id()).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Usuario eliminado exitosamente",
    })))
}

pub async fn reset_password(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Value>> {
    state.users.reset_password(id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Contraseña restablecida exitosamente",
    })))
}
