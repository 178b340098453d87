use crate::models::{Product, ProductImages, ProductInput, ProductStatus, ProductSummary};
use bigdecimal::BigDecimal;
use sqlx::{PgConnection, PgPool};

/// 列表查询不带图片, 避免把 base64 大字段整表拉出来
const LIST_COLUMNS: &str = r#"
    id, code, name, description, category, price, stock, status,
    NULL::text AS main_image,
    material, dimensions, weight, firmness, warranty, features,
    NULL::text AS tech_image_1,
    NULL::text AS tech_image_2,
    created_at, updated_at
"#;

/// 查询全部商品 (按 ID)
pub async fn list_products(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!("SELECT {LIST_COLUMNS} FROM products ORDER BY id"))
        .fetch_all(pool)
        .await
}

/// 查询单个商品 (含图片)
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, code, name, description, category, price, stock, status,
               main_image, material, dimensions, weight, firmness, warranty, features,
               tech_image_1, tech_image_2, created_at, updated_at
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// 新增商品
pub async fn insert_product(pool: &PgPool, input: &ProductInput) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO products (
            code, name, description, category, price, stock, status,
            main_image, material, dimensions, weight, firmness, warranty, features,
            tech_image_1, tech_image_2, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now(), now())
        RETURNING id
        "#,
    )
    .bind(&input.code)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.price)
    .bind(input.stock)
    .bind(input.status.as_str())
    .bind(&input.main_image)
    .bind(&input.material)
    .bind(&input.dimensions)
    .bind(&input.weight)
    .bind(&input.firmness)
    .bind(&input.warranty)
    .bind(&input.features)
    .bind(&input.tech_image_1)
    .bind(&input.tech_image_2)
    .fetch_one(pool)
    .await
}

/// 更新商品, 图片为 NULL 时保留原值; 返回受影响行数
pub async fn update_product(pool: &PgPool, id: i64, input: &ProductInput) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE products SET
            code = $2, name = $3, description = $4, category = $5, price = $6, stock = $7,
            status = $8,
            main_image = COALESCE($9, main_image),
            material = $10, dimensions = $11, weight = $12, firmness = $13, warranty = $14,
            features = $15,
            tech_image_1 = COALESCE($16, tech_image_1),
            tech_image_2 = COALESCE($17, tech_image_2),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&input.code)
    .bind(&input.name)
    .bind(&input.description)
    .bind(&input.category)
    .bind(&input.price)
    .bind(input.stock)
    .bind(input.status.as_str())
    .bind(&input.main_image)
    .bind(&input.material)
    .bind(&input.dimensions)
    .bind(&input.weight)
    .bind(&input.firmness)
    .bind(&input.warranty)
    .bind(&input.features)
    .bind(&input.tech_image_1)
    .bind(&input.tech_image_2)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// 修改商品状态 (软删除用)
pub async fn set_product_status(pool: &PgPool, id: i64, status: ProductStatus) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// 名称或分类模糊匹配 (不区分大小写)
pub async fn search_products(pool: &PgPool, term: &str) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        SELECT {LIST_COLUMNS} FROM products
        WHERE name ILIKE '%' || $1 || '%' OR category ILIKE '%' || $1 || '%'
        ORDER BY id
        "#
    ))
    .bind(term)
    .fetch_all(pool)
    .await
}

/// 组合过滤: 关键字 + 分类 + 状态, 任一为 None 表示不过滤
pub async fn filter_products(
    pool: &PgPool,
    term: Option<&str>,
    category: Option<&str>,
    status: Option<ProductStatus>,
) -> Result<Vec<Product>, sqlx::Error> {
    let mut qb = sqlx::QueryBuilder::new(format!("SELECT {LIST_COLUMNS} FROM products WHERE TRUE"));
    if let Some(term) = term {
        qb.push(" AND (name ILIKE '%' || ")
            .push_bind(term.to_string())
            .push(" || '%' OR category ILIKE '%' || ")
            .push_bind(term.to_string())
            .push(" || '%')");
    }
    if let Some(category) = category {
        qb.push(" AND category = ").push_bind(category.to_string());
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    qb.push(" ORDER BY id");
    qb.build_query_as::<Product>().fetch_all(pool).await
}

/// 价格区间 [min, max]
pub async fn products_by_price(
    pool: &PgPool,
    min: &BigDecimal,
    max: &BigDecimal,
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {LIST_COLUMNS} FROM products WHERE price BETWEEN $1 AND $2 ORDER BY price"
    ))
    .bind(min)
    .bind(max)
    .fetch_all(pool)
    .await
}

/// 有库存的商品, 库存多的在前
pub async fn available_products(pool: &PgPool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {LIST_COLUMNS} FROM products WHERE stock > 0 ORDER BY stock DESC, id"
    ))
    .fetch_all(pool)
    .await
}

/// 去重排序后的分类
pub async fn list_categories(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT DISTINCT category FROM products WHERE category <> '' ORDER BY category")
        .fetch_all(pool)
        .await
}

/// 库存低于阈值的商品
pub async fn low_stock_products(pool: &PgPool, threshold: i32) -> Result<Vec<ProductSummary>, sqlx::Error> {
    sqlx::query_as::<_, ProductSummary>(
        "SELECT id, name, category, price, stock FROM products WHERE stock < $1 ORDER BY stock, id",
    )
    .bind(threshold)
    .fetch_all(pool)
    .await
}

pub async fn count_products(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT count(*) FROM products").fetch_one(pool).await
}

/// 商品图片
pub async fn get_product_images(pool: &PgPool, id: i64) -> Result<Option<ProductImages>, sqlx::Error> {
    sqlx::query_as::<_, ProductImages>(
        "SELECT main_image, tech_image_1, tech_image_2 FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// 事务内锁定商品行, 库存校验与扣减之间不会被并发修改
pub async fn lock_products(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<Vec<ProductSummary>, sqlx::Error> {
    sqlx::query_as::<_, ProductSummary>(
        r#"
        SELECT id, name, category, price, stock
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(ids)
    .fetch_all(conn)
    .await
}

/// 批量调整库存: (商品ID, 增量), 增量为负表示扣减
pub async fn adjust_stock(conn: &mut PgConnection, deltas: &[(i64, i32)]) -> Result<(), sqlx::Error> {
    if deltas.is_empty() {
        return Ok(());
    }
    let ids: Vec<i64> = deltas.iter().map(|(id, _)| *id).collect();
    let amounts: Vec<i32> = deltas.iter().map(|(_, d)| *d).collect();

    sqlx::query(
        r#"
        UPDATE products p
        SET stock = p.stock + d.delta, updated_at = now()
        FROM UNNEST($1::bigint[], $2::int[]) AS d(id, delta)
        WHERE p.id = d.id
        "#,
    )
    .bind(&ids)
    .bind(&amounts)
    .execute(conn)
    .await?;
    Ok(())
}
