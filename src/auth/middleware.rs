use crate::api::AppState;
use crate::auth::jwt::{extract_bearer_token, extract_cookie};
use crate::db::users;
use crate::error::AppError;
use crate::models::{User, ADMIN_ROLE, SELLER_ROLE};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

/// 已认证的当前用户, 由 [`require_auth`] 写入请求扩展
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin()
    }

    /// 是否可查看某个销售员的数据
    pub fn can_access_seller(&self, seller_id: Option<i64>) -> bool {
        self.is_admin() || seller_id == Some(self.0.id)
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 依次从 `Authorization: Bearer` 和会话 cookie 取令牌
fn token_from_headers<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .or_else(|| {
            headers
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|c| extract_cookie(c, cookie_name))
        })
}

/// 校验令牌并按用户名重新加载用户, 角色以数据库为准
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = token_from_headers(headers, &state.config.auth.cookie_name).ok_or_else(|| {
        tracing::debug!("request without token");
        AppError::Unauthorized
    })?;

    let claims = state.jwt.validate_token(token)?;

    match users::find_by_username(&state.pool, &claims.sub).await? {
        Some(user) => Ok(CurrentUser(user)),
        None => {
            tracing::warn!(username = %claims.sub, "token for unknown user");
            Err(AppError::Unauthorized)
        }
    }
}

/// API 认证中间件: 失败返回 401
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // CORS 预检不带令牌
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    let user = authenticate(&state, req.headers()).await.map_err(|e| {
        tracing::warn!(uri = %req.uri(), "authentication failed");
        e
    })?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// 页面认证中间件: 未登录时跳转登录页
pub async fn require_page_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AppError::Unauthorized) => Redirect::to("/intranet/login").into_response(),
        Err(e) => e.into_response(),
    }
}

fn check_role(req: &Request, allowed: &[&str]) -> Result<(), AppError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::Unauthorized)?;

    if !allowed.contains(&user.0.role.as_str()) {
        tracing::warn!(
            username = %user.0.username,
            role = %user.0.role,
            uri = %req.uri(),
            "access denied"
        );
        return Err(AppError::Forbidden("Acceso denegado".to_string()));
    }
    Ok(())
}

/// 仅管理员
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    check_role(&req, &[ADMIN_ROLE])?;
    Ok(next.run(req).await)
}

/// 管理员或销售员
pub async fn require_staff(req: Request, next: Next) -> Result<Response, AppError> {
    check_role(&req, &[ADMIN_ROLE, SELLER_ROLE])?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: &str) -> CurrentUser {
        CurrentUser(User {
            id: 7,
            username: "lucia".into(),
            password_hash: String::new(),
            full_name: Some("Lucía Torres".into()),
            email: None,
            phone: None,
            role_id: 2,
            role: role.into(),
        })
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("jwt_token=from-cookie"));
        assert_eq!(token_from_headers(&headers, "jwt_token"), Some("from-header"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("a=1; jwt_token=from-cookie"));
        assert_eq!(token_from_headers(&headers, "jwt_token"), Some("from-cookie"));
        assert_eq!(token_from_headers(&HeaderMap::new(), "jwt_token"), None);
    }

    #[test]
    fn seller_only_sees_own_sales() {
        let seller = user(SELLER_ROLE);
        assert!(seller.can_access_seller(Some(7)));
        assert!(!seller.can_access_seller(Some(8)));
        assert!(!seller.can_access_seller(None));
        assert!(user(ADMIN_ROLE).can_access_seller(Some(8)));
    }

    #[test]
    fn role_check_uses_request_extension() {
        let mut req = Request::new(axum::body::Body::empty());
        assert!(matches!(check_role(&req, &[ADMIN_ROLE]), Err(AppError::Unauthorized)));

        req.extensions_mut().insert(user(SELLER_ROLE));
        assert!(matches!(check_role(&req, &[ADMIN_ROLE]), Err(AppError::Forbidden(_))));
        assert!(check_role(&req, &[ADMIN_ROLE, SELLER_ROLE]).is_ok());
    }
}
