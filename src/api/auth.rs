use super::AppState;
use crate::auth::jwt::{expired_cookie, session_cookie};
use crate::auth::CurrentUser;
use crate::error::AppResult;
use crate::models::UserInfo;
use crate::service::user::{validate_login, LoginRequest};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub rol: String,
    pub roles: Vec<String>,
}

/// 登录: 签发 JWT 并写入 HttpOnly cookie
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> AppResult<Response> {
    let (username, password) = validate_login(&req)?;

    let Some(user) = state.users.authenticate(&username, &password).await? else {
        let body = json!({ "authentication": "Usuario y/o contraseña incorrectos" });
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    };

    let token = state.jwt.generate_token(&user.username, &user.role)?;
    let cookie = session_cookie(&state.config.auth.cookie_name, &token, state.jwt.ttl_secs());
    let body = LoginResponse {
        roles: vec![format!("ROLE_{}", user.role)],
        rol: user.role,
        username: user.username,
        token,
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn me(user: CurrentUser) -> Json<UserInfo> {
    Json(UserInfo::from(&user.0))
}

pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, expired_cookie(&state.config.auth.cookie_name))],
        Json(json!({ "success": true, "message": "Sesión cerrada" })),
    )
        .into_response()
}
