use crate::auth::{hash_password, verify_password};
use crate::db::users::{self, UserRecord};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User, UserForm, ADMIN_ROLE};
use crate::service::validation::{form_errors, trimmed, FormFields};
use validator::Validate;
use sqlx::PgPool;
use tracing::{info, warn};

/// 登录表单
#[derive(Debug, Clone, Default, serde::Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(
        required(message = "El nombre de usuario es obligatorio"),
        length(min = 3, max = 50, message = "El nombre de usuario debe tener entre 3 y 50 caracteres")
    )]
    pub username: Option<String>,
    #[validate(
        required(message = "La contraseña es obligatoria"),
        length(min = 4, max = 100, message = "La contraseña debe tener entre 4 y 100 caracteres")
    )]
    pub password: Option<String>,
}

impl FormFields for LoginRequest {
    const FIELDS: &'static [(&'static str, &'static str)] =
        &[("username", "username"), ("password", "password")];
}

/// 登录表单校验, 返回 (用户名, 密码); 密码不去空白
pub fn validate_login(req: &LoginRequest) -> AppResult<(String, String)> {
    let req = LoginRequest {
        username: trimmed(&req.username),
        password: req.password.clone().filter(|p| !p.is_empty()),
    };
    form_errors(&req).finish_for::<LoginRequest>()?;
    Ok((req.username.unwrap_or_default(), req.password.unwrap_or_default()))
}

/// 校验通过的用户表单
#[derive(Debug, Clone, PartialEq)]
pub struct ValidUser {
    pub username: String,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role_id: i64,
}

/// 新增时密码必填, 编辑时留空表示不修改
pub fn validate_user(form: &UserForm, creating: bool) -> AppResult<ValidUser> {
    let form = form.normalized();
    let mut errors = form_errors(&form);
    if creating && form.password.is_none() {
        errors.add("password", "La contraseña es obligatoria");
    }
    errors.finish_for::<UserForm>()?;

    Ok(ValidUser {
        username: form.username.unwrap_or_default(),
        password: form.password,
        full_name: form.full_name,
        email: form.email,
        phone: form.phone,
        role_id: form.role_id.unwrap_or_default(),
    })
}

fn hash(password: &str) -> AppResult<String> {
    hash_password(password).map_err(|e| AppError::Internal(format!("password hash failed: {}", e)))
}

/// 用户服务
pub struct UserService {
    pool: PgPool,
    reset_password: String,
}

impl UserService {
    pub fn new(pool: PgPool, reset_password: impl Into<String>) -> Self {
        Self {
            pool,
            reset_password: reset_password.into(),
        }
    }

    /// 用户名 + 密码认证, 失败时不区分原因
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<Option<User>> {
        let user = users::find_by_username(&self.pool, username).await?;
        match user {
            Some(u) if verify_password(password, &u.password_hash) => {
                info!("Usuario {} inició sesión", u.username);
                Ok(Some(u))
            }
            _ => {
                warn!(username = %username, "login failed");
                Ok(None)
            }
        }
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        Ok(users::list_users(&self.pool).await?)
    }

    pub async fn roles(&self) -> AppResult<Vec<Role>> {
        Ok(users::list_roles(&self.pool).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<User> {
        users::get_user(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Usuario", id))
    }

    async fn check_role_and_username(&self, v: &ValidUser, except_id: Option<i64>) -> AppResult<()> {
        if users::get_role(&self.pool, v.role_id).await?.is_none() {
            return Err(AppError::BadRequest("Rol no válido".to_string()));
        }
        if users::username_taken(&self.pool, &v.username, except_id).await? {
            return Err(AppError::Conflict(format!(
                "El nombre de usuario '{}' ya está en uso",
                v.username
            )));
        }
        Ok(())
    }

    pub async fn create(&self, form: &UserForm) -> AppResult<User> {
        let v = validate_user(form, true)?;
        self.check_role_and_username(&v, None).await?;

        let password_hash = hash(v.password.as_deref().unwrap_or_default())?;
        let id = users::insert_user(
            &self.pool,
            &UserRecord {
                username: &v.username,
                password_hash: Some(&password_hash),
                full_name: v.full_name.as_deref(),
                email: v.email.as_deref(),
                phone: v.phone.as_deref(),
                role_id: v.role_id,
            },
        )
        .await?;
        info!("Usuario {} creado (ID {})", v.username, id);
        self.get(id).await
    }

    pub async fn update(&self, id: i64, form: &UserForm) -> AppResult<User> {
        let current = self.get(id).await?;
        let v = validate_user(form, false)?;
        self.check_role_and_username(&v, Some(id)).await?;

        // 不允许把最后一个管理员降级
        if current.is_admin() && v.role_id != current.role_id {
            self.ensure_not_last_admin().await?;
        }

        let password_hash = v.password.as_deref().map(hash).transpose()?;
        users::update_user(
            &self.pool,
            id,
            &UserRecord {
                username: &v.username,
                password_hash: password_hash.as_deref(),
                full_name: v.full_name.as_deref(),
                email: v.email.as_deref(),
                phone: v.phone.as_deref(),
                role_id: v.role_id,
            },
        )
        .await?;
        info!("Usuario {} actualizado", id);
        self.get(id).await
    }

    async fn ensure_not_last_admin(&self) -> AppResult<()> {
        if users::count_with_role(&self.pool, ADMIN_ROLE).await? <= 1 {
            return Err(AppError::Conflict(
                "No se puede eliminar el último administrador".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64, acting_user_id: i64) -> AppResult<()> {
        let user = self.get(id).await?;
        if id == acting_user_id {
            return Err(AppError::BadRequest(
                "No puede eliminar su propio usuario".to_string(),
            ));
        }
        if user.is_admin() {
            self.ensure_not_last_admin().await?;
        }
        if users::has_sales(&self.pool, id).await? {
            return Err(AppError::Conflict(
                "El usuario tiene ventas registradas y no puede eliminarse".to_string(),
            ));
        }
        users::delete_user(&self.pool, id).await?;
        info!("Usuario {} ({}) eliminado", id, user.username);
        Ok(())
    }

    /// 重置为配置中的默认密码
    pub async fn reset_password(&self, id: i64) -> AppResult<()> {
        let password_hash = hash(&self.reset_password)?;
        if users::set_password(&self.pool, id, &password_hash).await? == 0 {
            return Err(AppError::not_found("Usuario", id));
        }
        info!("Contraseña del usuario {} restablecida", id);
        Ok(())
    }

    pub async fn count(&self) -> AppResult<i64> {
        Ok(users::count_users(&self.pool).await?)
    }

    /// 库中没有管理员时创建 `admin`, 密码为默认重置密码
    pub async fn ensure_admin(&self) -> AppResult<Option<User>> {
        if users::count_with_role(&self.pool, ADMIN_ROLE).await? > 0 {
            return Ok(None);
        }
        let role = users::list_roles(&self.pool)
            .await?
            .into_iter()
            .find(|r| r.name == ADMIN_ROLE)
            .ok_or_else(|| AppError::Internal("role ADMIN missing".to_string()))?;

        let user = self
            .create(&UserForm {
                username: Some("admin".to_string()),
                password: Some(self.reset_password.clone()),
                full_name: Some("Administrador".to_string()),
                role_id: Some(role.id),
                ..Default::default()
            })
            .await?;
        warn!("No había administradores: se creó el usuario 'admin' con la contraseña por defecto");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> UserForm {
        UserForm {
            username: Some(" mrojas ".into()),
            password: Some("clave123".into()),
            full_name: Some("María Rojas".into()),
            email: Some("mrojas@dencanto.pe".into()),
            phone: None,
            role_id: Some(2),
        }
    }

    #[test]
    fn create_requires_password() {
        let mut f = form();
        f.password = None;
        assert!(validate_user(&f, true).is_err());
        let v = validate_user(&f, false).unwrap();
        assert_eq!(v.password, None);
        assert_eq!(v.username, "mrojas");
    }

    #[test]
    fn blank_password_on_update_keeps_current() {
        let mut f = form();
        f.password = Some("   ".into());
        assert_eq!(validate_user(&f, false).unwrap().password, None);
    }

    #[test]
    fn user_form_errors() {
        let f = UserForm {
            username: Some("ab".into()),
            password: Some("123".into()),
            email: Some("correo".into()),
            ..Default::default()
        };
        match validate_user(&f, true) {
            Err(AppError::Validation(errs)) => {
                let fields: Vec<_> = errs.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["username", "password", "email", "rolId"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_password_on_create_keeps_field_order() {
        let f = UserForm {
            username: Some("mrojas".into()),
            email: Some("correo".into()),
            role_id: Some(2),
            ..Default::default()
        };
        match validate_user(&f, true) {
            Err(AppError::Validation(errs)) => {
                let fields: Vec<_> = errs.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["password", "email"]);
                assert_eq!(errs[0].message, "La contraseña es obligatoria");
                assert_eq!(errs[1].message, "El email debe ser válido");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn login_validation() {
        let ok = LoginRequest {
            username: Some("admin".into()),
            password: Some("admin123".into()),
        };
        assert_eq!(
            validate_login(&ok).unwrap(),
            ("admin".to_string(), "admin123".to_string())
        );

        let bad = LoginRequest {
            username: Some("ad".into()),
            password: None,
        };
        match validate_login(&bad) {
            Err(AppError::Validation(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }
}
