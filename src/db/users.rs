use crate::models::{Role, User};
use sqlx::PgPool;

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.password_hash, u.full_name, u.email, u.phone,
           u.role_id, r.name AS role
    FROM users u
    INNER JOIN roles r ON r.id = u.role_id
"#;

/// 写入用户需要的字段; password_hash 为 None 时保留原密码
#[derive(Debug, Clone)]
pub struct UserRecord<'a> {
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub role_id: i64,
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} ORDER BY u.id"))
        .fetch_all(pool)
        .await
}

pub async fn get_user(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{USER_SELECT} WHERE u.username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// 用户名是否已被其他用户占用
pub async fn username_taken(pool: &PgPool, username: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::bigint IS NULL OR id <> $2))",
    )
    .bind(username)
    .bind(except_id)
    .fetch_one(pool)
    .await
}

pub async fn insert_user(pool: &PgPool, rec: &UserRecord<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO users (username, password_hash, full_name, email, phone, role_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(rec.username)
    .bind(rec.password_hash.unwrap_or_default())
    .bind(rec.full_name)
    .bind(rec.email)
    .bind(rec.phone)
    .bind(rec.role_id)
    .fetch_one(pool)
    .await
}

pub async fn update_user(pool: &PgPool, id: i64, rec: &UserRecord<'_>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            username = $2,
            password_hash = COALESCE($3, password_hash),
            full_name = $4, email = $5, phone = $6, role_id = $7
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(rec.username)
    .bind(rec.password_hash)
    .bind(rec.full_name)
    .bind(rec.email)
    .bind(rec.phone)
    .bind(rec.role_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn set_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_user(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn count_users(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT count(*) FROM users").fetch_one(pool).await
}

/// 某角色下的用户数量
pub async fn count_with_role(pool: &PgPool, role: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT count(*) FROM users u INNER JOIN roles r ON r.id = u.role_id WHERE r.name = $1",
    )
    .bind(role)
    .fetch_one(pool)
    .await
}

/// 该用户是否有销售记录 (有则不能物理删除)
pub async fn has_sales(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sales WHERE seller_id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
}

pub async fn list_roles(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get_role(pool: &PgPool, id: i64) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
