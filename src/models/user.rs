use crate::service::validation::{trimmed, FormFields};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const ADMIN_ROLE: &str = "ADMIN";
pub const SELLER_ROLE: &str = "VENDEDOR";

/// 角色
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

/// 用户 (联表带出角色名)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(rename = "nombreCompleto")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "rolId")]
    pub role_id: i64,
    #[serde(rename = "rol")]
    pub role: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }

    /// 拆分为 (名, 姓): 第一个词为名, 其余为姓
    pub fn split_name(&self) -> (String, String) {
        let full = self.display_name().trim();
        match full.split_once(char::is_whitespace) {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (full.to_string(), String::new()),
        }
    }
}

/// 新增/编辑用户表单, 编辑时密码留空表示不修改
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserForm {
    #[validate(
        required(message = "El nombre de usuario es obligatorio"),
        length(min = 3, max = 50, message = "El nombre de usuario debe tener entre 3 y 50 caracteres")
    )]
    pub username: Option<String>,
    #[validate(length(min = 4, max = 100, message = "La contraseña debe tener entre 4 y 100 caracteres"))]
    pub password: Option<String>,
    #[serde(rename = "nombreCompleto")]
    #[validate(length(max = 100, message = "El nombre completo no puede exceder 100 caracteres"))]
    pub full_name: Option<String>,
    #[validate(email(message = "El email debe ser válido"))]
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    #[validate(length(max = 20, message = "El teléfono no puede exceder 20 caracteres"))]
    pub phone: Option<String>,
    #[serde(rename = "rolId")]
    #[validate(required(message = "El rol es obligatorio"))]
    pub role_id: Option<i64>,
}

impl UserForm {
    /// 去空白; 密码只在全为空白时视为未填, 否则原样保留
    pub fn normalized(&self) -> Self {
        Self {
            username: trimmed(&self.username),
            password: self.password.clone().filter(|p| !p.trim().is_empty()),
            full_name: trimmed(&self.full_name),
            email: trimmed(&self.email),
            phone: trimmed(&self.phone),
            role_id: self.role_id,
        }
    }
}

impl FormFields for UserForm {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("username", "username"),
        ("password", "password"),
        ("full_name", "nombreCompleto"),
        ("email", "email"),
        ("phone", "telefono"),
        ("role_id", "rolId"),
    ];
}

/// `/auth/me` 返回的当前用户信息
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(rename = "nombreCompleto")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub rol: String,
    pub roles: Vec<String>,
}

impl From<&User> for UserInfo {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            full_name: u.full_name.clone(),
            email: u.email.clone(),
            rol: u.role.clone(),
            roles: vec![format!("ROLE_{}", u.role)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(full_name: Option<&str>) -> User {
        User {
            id: 1,
            username: "jperez".into(),
            password_hash: "x".into(),
            full_name: full_name.map(str::to_string),
            email: None,
            phone: None,
            role_id: 2,
            role: SELLER_ROLE.into(),
        }
    }

    #[test]
    fn split_name_takes_first_word_as_given_name() {
        assert_eq!(
            user(Some("Juan Carlos Pérez")).split_name(),
            ("Juan".to_string(), "Carlos Pérez".to_string())
        );
        assert_eq!(user(Some("Juan")).split_name(), ("Juan".to_string(), String::new()));
        assert_eq!(user(None).split_name(), ("jperez".to_string(), String::new()));
    }

    #[test]
    fn user_info_carries_role_authority() {
        let info = UserInfo::from(&user(None));
        assert_eq!(info.roles, vec!["ROLE_VENDEDOR".to_string()]);
        assert!(!user(None).is_admin());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let json = serde_json::to_value(user(None)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
