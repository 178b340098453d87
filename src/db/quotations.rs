use crate::models::quotation::closes;
use crate::models::{Quotation, QuotedProduct};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

const QUOTATION_COLUMNS: &str = r#"
    id, customer_name, email, phone, address, desired_date, products, total, status,
    created_at, updated_at, closed_at
"#;

/// 写入报价单需要的字段
#[derive(Debug, Clone)]
pub struct QuotationRecord<'a> {
    pub customer_name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub desired_date: NaiveDate,
    pub products: &'a [QuotedProduct],
    pub total: &'a BigDecimal,
    pub status: &'a str,
}

/// 全部报价单, 最新的在前
pub async fn list_quotations(pool: &PgPool) -> Result<Vec<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_quotation(pool: &PgPool, id: i64) -> Result<Option<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!("SELECT {QUOTATION_COLUMNS} FROM quotations WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn quotations_by_status(pool: &PgPool, status: &str) -> Result<Vec<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE status = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn quotations_by_email(pool: &PgPool, email: &str) -> Result<Vec<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        "SELECT {QUOTATION_COLUMNS} FROM quotations WHERE lower(email) = lower($1) ORDER BY created_at DESC, id DESC"
    ))
    .bind(email)
    .fetch_all(pool)
    .await
}

/// 客户名或邮箱模糊匹配
pub async fn search_quotations(pool: &PgPool, term: &str) -> Result<Vec<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        r#"
        SELECT {QUOTATION_COLUMNS} FROM quotations
        WHERE customer_name ILIKE '%' || $1 || '%' OR email ILIKE '%' || $1 || '%'
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(term)
    .fetch_all(pool)
    .await
}

/// 创建时间落在 [from, to) 的报价单
pub async fn quotations_between(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        r#"
        SELECT {QUOTATION_COLUMNS} FROM quotations
        WHERE created_at >= $1 AND created_at < $2
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

pub async fn insert_quotation(pool: &PgPool, rec: &QuotationRecord<'_>) -> Result<Quotation, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        r#"
        INSERT INTO quotations (
            customer_name, email, phone, address, desired_date, products, total, status,
            created_at, updated_at, closed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now(),
                  CASE WHEN $9::boolean THEN now() END)
        RETURNING {QUOTATION_COLUMNS}
        "#
    ))
    .bind(rec.customer_name)
    .bind(rec.email)
    .bind(rec.phone)
    .bind(rec.address)
    .bind(rec.desired_date)
    .bind(Json(rec.products))
    .bind(rec.total)
    .bind(rec.status)
    .bind(closes(rec.status))
    .fetch_one(pool)
    .await
}

/// 修改状态; 写入 `Cerrada` 时记录关闭时间
pub async fn set_quotation_status(
    pool: &PgPool,
    id: i64,
    status: &str,
) -> Result<Option<Quotation>, sqlx::Error> {
    sqlx::query_as::<_, Quotation>(&format!(
        r#"
        UPDATE quotations SET
            status = $2,
            updated_at = now(),
            closed_at = CASE WHEN $3::boolean THEN now() ELSE closed_at END
        WHERE id = $1
        RETURNING {QUOTATION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(status)
    .bind(closes(status))
    .fetch_optional(pool)
    .await
}

pub async fn delete_quotation(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM quotations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// 各状态数量
pub async fn count_by_status(pool: &PgPool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT status, count(*) FROM quotations GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await
}
