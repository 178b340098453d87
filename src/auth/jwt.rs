use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户名
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 令牌签发与校验
pub struct JwtManager {
    secret: String,
    ttl_secs: i64,
}

impl JwtManager {
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn generate_token(&self, username: &str, role: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_secs)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// 签名或过期校验失败一律返回 401, 具体原因只写日志
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!(error = %e, "invalid token");
            AppError::Unauthorized
        })
    }
}

/// `Authorization: Bearer <token>`
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 从 `Cookie` 头中取指定名字的值
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// 登录成功后写入的 cookie
pub fn session_cookie(name: &str, token: &str, max_age_secs: i64) -> String {
    format!("{name}={token}; Path=/; HttpOnly; Max-Age={max_age_secs}; SameSite=Lax")
}

/// 退出登录时让 cookie 立即过期
pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; Max-Age=0; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let jwt = JwtManager::new("test-secret", 3600);
        let token = jwt.generate_token("admin", "ADMIN").unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, "ADMIN");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = JwtManager::new("secret-a", 3600).generate_token("admin", "ADMIN").unwrap();
        assert!(matches!(
            JwtManager::new("secret-b", 3600).validate_token(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        // 默认校验有 60 秒宽限
        let jwt = JwtManager::new("test-secret", -120);
        let token = jwt.generate_token("vendedor", "VENDEDOR").unwrap();
        assert!(jwt.validate_token(&token).is_err());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn cookie_extraction() {
        let header = "theme=dark; jwt_token=abc.def.ghi; lang=es";
        assert_eq!(extract_cookie(header, "jwt_token"), Some("abc.def.ghi"));
        assert_eq!(extract_cookie(header, "missing"), None);
        assert_eq!(extract_cookie("jwt_token=", "jwt_token"), None);
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            session_cookie("jwt_token", "t", 86400),
            "jwt_token=t; Path=/; HttpOnly; Max-Age=86400; SameSite=Lax"
        );
        assert!(expired_cookie("jwt_token").contains("Max-Age=0"));
    }
}
