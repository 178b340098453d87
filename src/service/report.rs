use crate::db::{products, quotations, sales, users, SaleFilter};
use crate::error::{AppError, AppResult};
use crate::models::{Product, Quotation, Sale, SaleStatus, User, QUOTATION_STATUSES, SELLER_ROLE};
use crate::service::calendar::{add_months, last_months, month_name, month_range, month_start, start_of_day};
use crate::service::validation::non_blank;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;

const NO_CATEGORY: &str = "Sin categoría";

/// 报表查询参数 (原样字符串)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportQuery {
    #[serde(rename = "fechaInicio")]
    pub from: Option<String>,
    #[serde(rename = "fechaFin")]
    pub to: Option<String>,
    #[serde(rename = "categoria")]
    pub category: Option<String>,
}

/// 解析后的过滤条件, 日期按整天包含
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
}

fn parse_date(v: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match non_blank(v) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Fecha inválida: {}", s))),
    }
}

impl ReportFilter {
    pub fn parse(q: &ReportQuery) -> AppResult<Self> {
        let filter = Self {
            from: parse_date(q.from.as_deref())?,
            to: parse_date(q.to.as_deref())?,
            category: non_blank(q.category.as_deref()).map(str::to_string),
        };
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(AppError::BadRequest(
                    "La fecha de inicio no puede ser posterior a la fecha fin".to_string(),
                ));
            }
        }
        Ok(filter)
    }

    /// [起始日 00:00, 结束日次日 00:00)
    pub fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            self.from.map(start_of_day),
            self.to.map(|d| start_of_day(d) + Duration::days(1)),
        )
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let (from, to) = self.bounds();
        from.map_or(true, |f| at >= f) && to.map_or(true, |t| at < t)
    }

    fn category_matches(&self, category: &str) -> bool {
        self.category.as_deref().map_or(true, |c| c == category)
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.category.is_none()
    }
}

/// 保留一位小数
fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn sum_totals<'a>(sales: impl IntoIterator<Item = &'a Sale>) -> BigDecimal {
    sales.into_iter().fold(BigDecimal::zero(), |acc, s| acc + &s.total)
}

fn is_settled(s: &Sale) -> bool {
    matches!(s.status, SaleStatus::Completed | SaleStatus::Delivered)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub ventas_totales: BigDecimal,
    pub ventas_registradas: BigDecimal,
    pub total_cotizaciones: usize,
    pub cotizaciones_cerradas: usize,
    pub tasa_conversion: f64,
    pub dias_promedio_cierre: f64,
    pub mes_actual: u32,
    pub anio_actual: i32,
    pub total_ventas: usize,
    pub ventas_completadas: usize,
    pub ventas_pendientes: usize,
}

/// `sales` 已按日期过滤; 品类过滤在这里做 (含该品类明细的销售)
pub fn summary(
    today: NaiveDate,
    filter: &ReportFilter,
    sales: &[Sale],
    quotations: &[Quotation],
) -> ReportSummary {
    let sales: Vec<&Sale> = sales
        .iter()
        .filter(|s| {
            filter.category.is_none()
                || s.items.iter().any(|i| filter.category_matches(&i.product_category))
        })
        .collect();
    let quotations: Vec<&Quotation> = quotations.iter().filter(|q| filter.contains(q.created_at)).collect();
    let closed: Vec<&&Quotation> = quotations.iter().filter(|q| q.is_closed()).collect();

    let conversion = if quotations.is_empty() {
        0.0
    } else {
        closed.len() as f64 * 100.0 / quotations.len() as f64
    };

    let close_days: Vec<i64> = closed
        .iter()
        .filter_map(|q| {
            q.closed_at
                .map(|c| (c.date_naive() - q.created_at.date_naive()).num_days())
        })
        .collect();
    let avg_days = if close_days.is_empty() {
        0.0
    } else {
        close_days.iter().sum::<i64>() as f64 / close_days.len() as f64
    };

    let total = sum_totals(sales.iter().copied());
    ReportSummary {
        ventas_registradas: total.clone(),
        ventas_totales: total,
        total_cotizaciones: quotations.len(),
        cotizaciones_cerradas: closed.len(),
        tasa_conversion: round1(conversion),
        dias_promedio_cierre: round1(avg_days),
        mes_actual: today.month(),
        anio_actual: today.year(),
        total_ventas: sales.len(),
        ventas_completadas: sales.iter().filter(|s| s.status == SaleStatus::Completed).count(),
        ventas_pendientes: sales.iter().filter(|s| s.status == SaleStatus::Pending).count(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySales {
    pub mes: &'static str,
    pub mes_numero: u32,
    pub anio: i32,
    pub total: BigDecimal,
    pub ventas_registradas: BigDecimal,
    pub cantidad_ventas: usize,
}

/// 最近 6 个月, 不区分状态
pub fn monthly_sales(today: NaiveDate, sales: &[Sale]) -> Vec<MonthlySales> {
    last_months(today, 6)
        .into_iter()
        .map(|m| {
            let (from, to) = month_range(m);
            let month: Vec<&Sale> = sales
                .iter()
                .filter(|s| s.created_at >= from && s.created_at < to)
                .collect();
            let total = sum_totals(month.iter().copied());
            MonthlySales {
                mes: month_name(m.month()),
                mes_numero: m.month(),
                anio: m.year(),
                ventas_registradas: total.clone(),
                total,
                cantidad_ventas: month.len(),
            }
        })
        .collect()
}

/// 五个已知状态的报价单数量, 顺序固定
pub fn quotation_status_counts(quotations: &[Quotation]) -> IndexMap<&'static str, usize> {
    QUOTATION_STATUSES
        .iter()
        .map(|st| (*st, quotations.iter().filter(|q| q.status == *st).count()))
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategorySales {
    pub categoria: String,
    pub total: BigDecimal,
}

/// 非取消销售的明细小计按品类汇总, 金额从高到低
pub fn sales_by_category(sales: &[Sale]) -> Vec<CategorySales> {
    let mut by_category: IndexMap<String, BigDecimal> = IndexMap::new();
    for item in sales
        .iter()
        .filter(|s| s.status != SaleStatus::Cancelled)
        .flat_map(|s| s.items.iter())
    {
        *by_category
            .entry(item.product_category.clone())
            .or_insert_with(BigDecimal::zero) += &item.subtotal;
    }
    let mut list: Vec<CategorySales> = by_category
        .into_iter()
        .map(|(categoria, total)| CategorySales { categoria, total })
        .collect();
    list.sort_by(|a, b| b.total.cmp(&a.total));
    list
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopProduct {
    pub id: i64,
    pub nombre: String,
    pub categoria: String,
    pub precio: BigDecimal,
    pub stock: i32,
    pub unidades_vendidas: i64,
    pub total_ventas: BigDecimal,
}

/// 销量前 n 的商品 (非取消销售, 应用品类过滤)
pub fn top_products(filter: &ReportFilter, sales: &[Sale], catalog: &HashMap<i64, Product>, n: usize) -> Vec<TopProduct> {
    let mut grouped: IndexMap<i64, TopProduct> = IndexMap::new();
    for item in sales
        .iter()
        .filter(|s| s.status != SaleStatus::Cancelled)
        .flat_map(|s| s.items.iter())
        .filter(|i| filter.category_matches(&i.product_category))
    {
        let entry = grouped.entry(item.product_id).or_insert_with(|| {
            let product = catalog.get(&item.product_id);
            TopProduct {
                id: item.product_id,
                nombre: item.product_name.clone(),
                categoria: item.product_category.clone(),
                precio: product.map_or_else(|| item.unit_price.clone(), |p| p.price.clone()),
                stock: product.map_or(0, |p| p.stock),
                unidades_vendidas: 0,
                total_ventas: BigDecimal::zero(),
            }
        });
        entry.unidades_vendidas += item.quantity as i64;
        entry.total_ventas += &item.subtotal;
    }
    let mut list: Vec<TopProduct> = grouped.into_values().collect();
    list.sort_by(|a, b| b.unidades_vendidas.cmp(&a.unidades_vendidas));
    list.truncate(n);
    list
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerReport {
    pub id: i64,
    pub nombre: String,
    pub total_ventas: BigDecimal,
    pub cantidad_ventas: usize,
    pub venta_promedio: BigDecimal,
}

/// 销售员业绩: 已完成 + 已交付
pub fn seller_report(sellers: &[User], sales: &[Sale]) -> Vec<SellerReport> {
    let mut list: Vec<SellerReport> = sellers
        .iter()
        .filter(|u| u.role == SELLER_ROLE)
        .map(|u| {
            let own: Vec<&Sale> = sales
                .iter()
                .filter(|s| s.seller_id == u.id && is_settled(s))
                .collect();
            let total = sum_totals(own.iter().copied());
            let average = if own.is_empty() {
                BigDecimal::zero()
            } else {
                (&total / BigDecimal::from(own.len() as i64)).round(2)
            };
            SellerReport {
                id: u.id,
                nombre: u.display_name().to_string(),
                total_ventas: total,
                cantidad_ventas: own.len(),
                venta_promedio: average,
            }
        })
        .collect();
    list.sort_by(|a, b| b.total_ventas.cmp(&a.total_ventas));
    list
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthOption {
    pub valor: String,
    pub texto: String,
    pub mes: u32,
    pub anio: i32,
}

/// 最近 12 个月, 当月在前
pub fn available_months(today: NaiveDate) -> Vec<MonthOption> {
    let current = month_start(today);
    (0..12)
        .map(|i| {
            let m = add_months(current, -i);
            MonthOption {
                valor: format!("{}-{}", m.month(), m.year()),
                texto: format!("{} {}", month_name(m.month()), m.year()),
                mes: m.month(),
                anio: m.year(),
            }
        })
        .collect()
}

/// 售出商品的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SoldOrigin {
    Ventas,
    Cotizacion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoldProduct {
    pub id: i64,
    pub nombre: String,
    pub categoria: String,
    pub precio_unitario: BigDecimal,
    pub cantidad_vendida: i64,
    pub total_ventas: BigDecimal,
    pub origen: SoldOrigin,
}

/// 已完成/已交付销售的明细 + 已成交报价单中的商品, 按金额降序
pub fn products_sold(
    filter: &ReportFilter,
    sales: &[Sale],
    quotations: &[Quotation],
    catalog: &HashMap<i64, Product>,
) -> Vec<SoldProduct> {
    let mut from_sales: IndexMap<i64, SoldProduct> = IndexMap::new();
    for item in sales
        .iter()
        .filter(|s| is_settled(s))
        .flat_map(|s| s.items.iter())
        .filter(|i| filter.category_matches(&i.product_category))
    {
        let entry = from_sales.entry(item.product_id).or_insert_with(|| SoldProduct {
            id: item.product_id,
            nombre: item.product_name.clone(),
            categoria: item.product_category.clone(),
            precio_unitario: catalog
                .get(&item.product_id)
                .map_or_else(|| item.unit_price.clone(), |p| p.price.clone()),
            cantidad_vendida: 0,
            total_ventas: BigDecimal::zero(),
            origen: SoldOrigin::Ventas,
        });
        entry.cantidad_vendida += item.quantity as i64;
        entry.total_ventas += &item.subtotal;
    }

    // 报价单商品按 (报价单, 商品) 分组, 不与销售合并
    let mut from_quotations: IndexMap<(i64, Option<i64>, String), SoldProduct> = IndexMap::new();
    for q in quotations
        .iter()
        .filter(|q| q.is_closed() && filter.contains(q.created_at))
    {
        for p in q.products.iter() {
            let category = p
                .id
                .and_then(|id| catalog.get(&id))
                .map_or(NO_CATEGORY, |prod| prod.category.as_str());
            if !filter.category_matches(category) {
                continue;
            }
            let entry = from_quotations
                .entry((q.id, p.id, p.name.clone()))
                .or_insert_with(|| SoldProduct {
                    id: p.id.unwrap_or(q.id),
                    nombre: format!("{} (Cotización #{})", p.name, q.id),
                    categoria: category.to_string(),
                    precio_unitario: p.price.clone(),
                    cantidad_vendida: 0,
                    total_ventas: BigDecimal::zero(),
                    origen: SoldOrigin::Cotizacion,
                });
            entry.cantidad_vendida += p.quantity as i64;
            entry.total_ventas += p.subtotal();
        }
    }

    let mut list: Vec<SoldProduct> = from_sales
        .into_values()
        .chain(from_quotations.into_values())
        .collect();
    list.sort_by(|a, b| b.total_ventas.cmp(&a.total_ventas));
    list
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedQuotation {
    pub id: i64,
    pub nombre_cliente: String,
    pub email: String,
    pub telefono: String,
    pub total: BigDecimal,
    pub fecha_creacion: String,
    pub fecha_cierre: String,
    #[serde(skip)]
    pub closed_at: DateTime<Utc>,
}

/// 区间内成交的报价单 (按关闭时间, 缺失时按创建时间), 最近的在前
pub fn closed_quotations(filter: &ReportFilter, quotations: &[Quotation]) -> Vec<ClosedQuotation> {
    const FMT: &str = "%d/%m/%Y %H:%M";
    let mut list: Vec<ClosedQuotation> = quotations
        .iter()
        .filter(|q| q.is_closed())
        .filter_map(|q| {
            let at = q.closed_at.unwrap_or(q.created_at);
            filter.contains(at).then(|| ClosedQuotation {
                id: q.id,
                nombre_cliente: q.customer_name.clone(),
                email: q.email.clone(),
                telefono: q.phone.clone(),
                total: q.total.clone(),
                fecha_creacion: q.created_at.format(FMT).to_string(),
                fecha_cierre: q
                    .closed_at
                    .map_or_else(|| "-".to_string(), |c| c.format(FMT).to_string()),
                closed_at: at,
            })
        })
        .collect();
    list.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
    list
}

/// PDF 导出用的完整报表
#[derive(Debug, Clone)]
pub struct FullReport {
    pub filter: ReportFilter,
    pub summary: ReportSummary,
    pub top_products: Vec<TopProduct>,
    pub products_sold: Vec<SoldProduct>,
    pub closed_quotations: Vec<ClosedQuotation>,
}

impl FullReport {
    pub fn total_sold_value(&self) -> BigDecimal {
        self.products_sold
            .iter()
            .fold(BigDecimal::zero(), |acc, p| acc + &p.total_ventas)
    }

    pub fn closed_quotations_value(&self) -> BigDecimal {
        self.closed_quotations
            .iter()
            .fold(BigDecimal::zero(), |acc, q| acc + &q.total)
    }
}

/// 报表服务
pub struct ReportService {
    pool: PgPool,
}

impl ReportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn sales_in(&self, filter: &ReportFilter) -> AppResult<Vec<Sale>> {
        let (from, to) = filter.bounds();
        Ok(sales::list_sales(
            &self.pool,
            &SaleFilter {
                from,
                to,
                ..Default::default()
            },
        )
        .await?)
    }

    async fn catalog(&self) -> AppResult<HashMap<i64, Product>> {
        Ok(products::list_products(&self.pool)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    pub async fn summary(&self, filter: &ReportFilter, today: NaiveDate) -> AppResult<ReportSummary> {
        let sales = self.sales_in(filter).await?;
        let quotations = quotations::list_quotations(&self.pool).await?;
        Ok(summary(today, filter, &sales, &quotations))
    }

    pub async fn monthly(&self, today: NaiveDate) -> AppResult<Vec<MonthlySales>> {
        let first = last_months(today, 6).first().copied().unwrap_or(today);
        let (_, to) = month_range(today);
        let sales = sales::list_sales(
            &self.pool,
            &SaleFilter {
                from: Some(start_of_day(first)),
                to: Some(to),
                ..Default::default()
            },
        )
        .await?;
        Ok(monthly_sales(today, &sales))
    }

    pub async fn quotation_statuses(&self) -> AppResult<IndexMap<&'static str, usize>> {
        let quotations = quotations::list_quotations(&self.pool).await?;
        Ok(quotation_status_counts(&quotations))
    }

    pub async fn by_category(&self, filter: &ReportFilter) -> AppResult<Vec<CategorySales>> {
        Ok(sales_by_category(&self.sales_in(filter).await?))
    }

    pub async fn top_products(&self, filter: &ReportFilter) -> AppResult<Vec<TopProduct>> {
        let sales = self.sales_in(filter).await?;
        Ok(top_products(filter, &sales, &self.catalog().await?, 5))
    }

    pub async fn sellers(&self) -> AppResult<Vec<SellerReport>> {
        let users = users::list_users(&self.pool).await?;
        let sales = sales::list_sales(&self.pool, &SaleFilter::default()).await?;
        Ok(seller_report(&users, &sales))
    }

    pub async fn categories(&self) -> AppResult<Vec<String>> {
        Ok(products::list_categories(&self.pool).await?)
    }

    pub async fn products_sold(&self, filter: &ReportFilter) -> AppResult<Vec<SoldProduct>> {
        let sales = self.sales_in(filter).await?;
        let quotations = quotations::list_quotations(&self.pool).await?;
        Ok(products_sold(filter, &sales, &quotations, &self.catalog().await?))
    }

    pub async fn closed_quotations(&self, filter: &ReportFilter) -> AppResult<Vec<ClosedQuotation>> {
        let quotations = quotations::list_quotations(&self.pool).await?;
        Ok(closed_quotations(filter, &quotations))
    }

    /// 一次加载, 生成导出所需的全部数据
    pub async fn full(&self, filter: &ReportFilter, today: NaiveDate) -> AppResult<FullReport> {
        let sales = self.sales_in(filter).await?;
        let quotations = quotations::list_quotations(&self.pool).await?;
        let catalog = self.catalog().await?;
        Ok(FullReport {
            summary: summary(today, filter, &sales, &quotations),
            top_products: top_products(filter, &sales, &catalog, 5),
            products_sold: products_sold(filter, &sales, &quotations, &catalog),
            closed_quotations: closed_quotations(filter, &quotations),
            filter: filter.clone(),
        })
    }
}
