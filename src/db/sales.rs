use crate::models::{Sale, SaleItemView, SalePlan, SaleStatus};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

const SALE_SELECT: &str = r#"
    SELECT s.id, s.customer_name, s.customer_phone, s.customer_email,
           s.delivery_type, s.delivery_address, s.payment_method, s.status,
           s.subtotal, s.discount, s.igv, s.delivery_fee, s.total,
           s.seller_id, u.username AS seller_username, u.full_name AS seller_name,
           s.created_at, s.paid_at, s.notes
    FROM sales s
    INNER JOIN users u ON u.id = s.seller_id
"#;

/// 销售单查询条件, None 表示不过滤; 时间区间左闭右开
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub seller_id: Option<i64>,
    pub status: Option<SaleStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// 按条件查询销售单 (含明细), 最新的在前
pub async fn list_sales(pool: &PgPool, filter: &SaleFilter) -> Result<Vec<Sale>, sqlx::Error> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(SALE_SELECT);
    qb.push(" WHERE TRUE");
    if let Some(seller_id) = filter.seller_id {
        qb.push(" AND s.seller_id = ").push_bind(seller_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND s.status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND s.created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND s.created_at < ").push_bind(to);
    }
    qb.push(" ORDER BY s.created_at DESC, s.id DESC");

    let mut sales = qb.build_query_as::<Sale>().fetch_all(pool).await?;
    attach_items(pool, &mut sales).await?;
    Ok(sales)
}

/// 查询单个销售单 (含明细)
pub async fn get_sale(pool: &PgPool, id: i64) -> Result<Option<Sale>, sqlx::Error> {
    let sale = sqlx::query_as::<_, Sale>(&format!("{SALE_SELECT} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    let Some(mut sale) = sale else {
        return Ok(None);
    };
    sale.items = list_items(pool, &[id]).await?;
    Ok(Some(sale))
}

/// 批量查询明细
pub async fn list_items(pool: &PgPool, sale_ids: &[i64]) -> Result<Vec<SaleItemView>, sqlx::Error> {
    sqlx::query_as::<_, SaleItemView>(
        r#"
        SELECT si.id, si.sale_id, si.product_id,
               p.name AS product_name, p.code AS product_code, p.category AS product_category,
               si.quantity, si.unit_price,
               (si.quantity * si.unit_price) AS subtotal
        FROM sale_items si
        INNER JOIN products p ON p.id = si.product_id
        WHERE si.sale_id = ANY($1)
        ORDER BY si.sale_id, si.id
        "#,
    )
    .bind(sale_ids)
    .fetch_all(pool)
    .await
}

async fn attach_items(pool: &PgPool, sales: &mut [Sale]) -> Result<(), sqlx::Error> {
    if sales.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = sales.iter().map(|s| s.id).collect();
    let mut by_sale: HashMap<i64, Vec<SaleItemView>> = HashMap::new();
    for item in list_items(pool, &ids).await? {
        by_sale.entry(item.sale_id).or_default().push(item);
    }
    for sale in sales.iter_mut() {
        sale.items = by_sale.remove(&sale.id).unwrap_or_default();
    }
    Ok(())
}

/// 写入销售单主表, 返回新 ID
pub async fn insert_sale(conn: &mut PgConnection, plan: &SalePlan) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO sales (
            customer_name, customer_phone, customer_email,
            delivery_type, delivery_address, payment_method, status,
            subtotal, discount, igv, delivery_fee, total,
            seller_id, notes, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now())
        RETURNING id
        "#,
    )
    .bind(&plan.customer_name)
    .bind(&plan.customer_phone)
    .bind(&plan.customer_email)
    .bind(plan.delivery_type.as_str())
    .bind(&plan.delivery_address)
    .bind(plan.payment_method.as_str())
    .bind(SaleStatus::Pending.as_str())
    .bind(&plan.totals.subtotal)
    .bind(&plan.totals.discount)
    .bind(&plan.totals.igv)
    .bind(&plan.totals.delivery_fee)
    .bind(&plan.totals.total)
    .bind(plan.seller_id)
    .bind(&plan.notes)
    .fetch_one(conn)
    .await
}

/// 批量写入明细
pub async fn insert_items(conn: &mut PgConnection, sale_id: i64, plan: &SalePlan) -> Result<(), sqlx::Error> {
    if plan.lines.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO sale_items (sale_id, product_id, quantity, unit_price) ");

    query_builder.push_values(&plan.lines, |mut b, line| {
        b.push_bind(sale_id)
            .push_bind(line.product_id)
            .push_bind(line.quantity)
            .push_bind(line.unit_price.clone());
    });

    query_builder.build().execute(conn).await?;
    Ok(())
}

/// 事务内锁定销售单并返回当前状态
pub async fn lock_sale_status(conn: &mut PgConnection, id: i64) -> Result<Option<SaleStatus>, sqlx::Error> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM sales WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    status
        .map(|s| s.parse::<SaleStatus>())
        .transpose()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// 写入新状态, 需要时同时写付款时间
pub async fn set_sale_status(
    conn: &mut PgConnection,
    id: i64,
    status: SaleStatus,
    stamp_paid_at: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE sales
        SET status = $2,
            paid_at = CASE WHEN $3 THEN now() ELSE paid_at END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(stamp_paid_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// 按商品汇总某销售单的数量
pub async fn item_quantities(conn: &mut PgConnection, sale_id: i64) -> Result<Vec<(i64, i32)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, i32)>(
        r#"
        SELECT product_id, SUM(quantity)::int
        FROM sale_items
        WHERE sale_id = $1
        GROUP BY product_id
        ORDER BY product_id
        "#,
    )
    .bind(sale_id)
    .fetch_all(conn)
    .await
}
