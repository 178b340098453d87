use crate::db::{products, quotations, sales, users, SaleFilter};
use crate::error::AppResult;
use crate::models::{
    ProductSummary, Sale, SaleStatus, User, CLOSED_STATUS, DEFAULT_QUOTATION_STATUS,
    LOW_STOCK_THRESHOLD,
};
use crate::service::calendar::{last_months, last_weeks, month_abbr, month_range, month_year_label, start_of_day};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;

/// 销售员提成比例 10%
pub fn commission_rate() -> BigDecimal {
    BigDecimal::from(10) / BigDecimal::from(100)
}

/// 已完成销售的金额合计
pub fn completed_total<'a>(sales: impl IntoIterator<Item = &'a Sale>) -> BigDecimal {
    sales
        .into_iter()
        .filter(|s| s.status == SaleStatus::Completed)
        .fold(BigDecimal::zero(), |acc, s| acc + &s.total)
}

fn in_range(s: &Sale, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    s.created_at >= from && s.created_at < to
}

/// 状态分布, 键为状态常量
pub fn status_distribution(sales: &[&Sale]) -> IndexMap<String, usize> {
    let mut out = IndexMap::new();
    for s in sales {
        *out.entry(s.status.as_str().to_string()).or_insert(0) += 1;
    }
    out
}

pub fn payment_distribution(sales: &[&Sale]) -> IndexMap<String, usize> {
    let mut out = IndexMap::new();
    for s in sales {
        *out.entry(s.payment_method.as_str().to_string()).or_insert(0) += 1;
    }
    out
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthTotal {
    pub mes: String,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeekTotal {
    pub semana: String,
    pub inicio: String,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SellerTotal {
    pub nombre: String,
    pub ventas: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: i64,
    pub nombres: String,
    pub apellidos: String,
    pub rol: String,
    pub nombre_usuario: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        let (nombres, apellidos) = u.split_name();
        Self {
            id: u.id,
            nombres,
            apellidos,
            rol: u.role.clone(),
            nombre_usuario: u.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentSale {
    pub id: i64,
    pub cliente: String,
    pub total: BigDecimal,
    pub estado: SaleStatus,
    pub fecha: DateTime<Utc>,
}

/// 按月汇总已完成销售, `with_year` 控制标签格式
pub fn monthly_completed(sales: &[Sale], today: NaiveDate, months: u32, with_year: bool) -> Vec<MonthTotal> {
    last_months(today, months)
        .into_iter()
        .map(|m| {
            let (from, to) = month_range(m);
            MonthTotal {
                mes: if with_year {
                    month_year_label(m)
                } else {
                    month_abbr(m.month()).to_string()
                },
                total: completed_total(sales.iter().filter(|s| in_range(s, from, to))),
            }
        })
        .collect()
}

/// 最近 n 周 (周一开始) 的已完成销售
pub fn weekly_completed(sales: &[Sale], today: NaiveDate, weeks: u32) -> Vec<WeekTotal> {
    last_weeks(today, weeks)
        .into_iter()
        .enumerate()
        .map(|(i, monday)| {
            let from = start_of_day(monday);
            let to = from + Duration::weeks(1);
            WeekTotal {
                semana: format!("Sem {}", i + 1),
                inicio: monday.format("%d/%m").to_string(),
                total: completed_total(sales.iter().filter(|s| in_range(s, from, to))),
            }
        })
        .collect()
}

/// 已完成销售额前 n 的销售员
pub fn top_sellers(sales: &[&Sale], n: usize) -> Vec<SellerTotal> {
    let mut by_seller: HashMap<i64, SellerTotal> = HashMap::new();
    for s in sales.iter().filter(|s| s.status == SaleStatus::Completed) {
        let entry = by_seller.entry(s.seller_id).or_insert_with(|| SellerTotal {
            nombre: s.seller_display().to_string(),
            ventas: BigDecimal::zero(),
        });
        entry.ventas += &s.total;
    }
    let mut list: Vec<SellerTotal> = by_seller.into_values().collect();
    list.sort_by(|a, b| b.ventas.cmp(&a.ventas).then_with(|| a.nombre.cmp(&b.nombre)));
    list.truncate(n);
    list
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub ventas_totales_mes: BigDecimal,
    pub cantidad_ventas_mes: usize,
    pub total_usuarios: usize,
    pub cotizaciones_pendientes: i64,
    pub cotizaciones_cerradas: i64,
    pub total_cotizaciones: i64,
    pub productos_stock_bajo: usize,
    pub total_productos: i64,
    pub usuarios: Vec<UserRow>,
    pub top_vendedores: Vec<SellerTotal>,
    pub ventas_por_mes: Vec<MonthTotal>,
    pub distribucion_metodo_pago: IndexMap<String, usize>,
    pub distribucion_estado: IndexMap<String, usize>,
    pub productos_con_stock_bajo: Vec<ProductSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerStats {
    pub mis_ventas_mes: BigDecimal,
    pub cantidad_mis_ventas: usize,
    pub mis_comisiones: BigDecimal,
    pub ventas_pendientes: usize,
    pub cotizaciones_pendientes: i64,
    pub promedio_venta: BigDecimal,
    pub ultimas_ventas: Vec<RecentSale>,
    pub rendimiento_semanal: Vec<WeekTotal>,
    pub distribucion_estado: IndexMap<String, usize>,
    pub rendimiento_mensual: Vec<MonthTotal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DashboardStats {
    Admin(AdminStats),
    Seller(SellerStats),
}

/// 仪表盘响应: 角色相关的统计 + 当前用户
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub usuario: String,
    pub rol: String,
    #[serde(flatten)]
    pub stats: DashboardStats,
}

/// 管理员视图需要的原始数据
pub struct AdminInputs<'a> {
    pub sales: &'a [Sale],
    pub users: &'a [User],
    pub low_stock: Vec<ProductSummary>,
    pub product_count: i64,
    pub quotation_counts: &'a IndexMap<String, i64>,
}

pub fn admin_stats(today: NaiveDate, input: AdminInputs<'_>) -> AdminStats {
    let (from, to) = month_range(today);
    let month: Vec<&Sale> = input.sales.iter().filter(|s| in_range(s, from, to)).collect();
    let count_status = |st: &str| input.quotation_counts.get(st).copied().unwrap_or(0);

    AdminStats {
        ventas_totales_mes: completed_total(month.iter().copied()),
        cantidad_ventas_mes: month.iter().filter(|s| s.status == SaleStatus::Completed).count(),
        total_usuarios: input.users.len(),
        cotizaciones_pendientes: count_status(DEFAULT_QUOTATION_STATUS),
        cotizaciones_cerradas: count_status(CLOSED_STATUS),
        total_cotizaciones: input.quotation_counts.values().sum(),
        productos_stock_bajo: input.low_stock.len(),
        total_productos: input.product_count,
        usuarios: input.users.iter().map(UserRow::from).collect(),
        top_vendedores: top_sellers(&month, 5),
        ventas_por_mes: monthly_completed(input.sales, today, 6, true),
        distribucion_metodo_pago: payment_distribution(&month),
        distribucion_estado: status_distribution(&month),
        productos_con_stock_bajo: input.low_stock,
    }
}

/// `own_sales` 为该销售员的全部销售, 最新在前
pub fn seller_stats(today: NaiveDate, own_sales: &[Sale], pending_quotations: i64) -> SellerStats {
    let (from, to) = month_range(today);
    let month: Vec<&Sale> = own_sales.iter().filter(|s| in_range(s, from, to)).collect();
    let revenue = completed_total(month.iter().copied());
    let completed = month.iter().filter(|s| s.status == SaleStatus::Completed).count();
    let average = if completed > 0 {
        (&revenue / BigDecimal::from(completed as i64)).round(2)
    } else {
        BigDecimal::zero()
    };

    let mut recent: Vec<&Sale> = own_sales.iter().collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    SellerStats {
        mis_comisiones: (&revenue * commission_rate()).round(2),
        mis_ventas_mes: revenue,
        cantidad_mis_ventas: completed,
        ventas_pendientes: month.iter().filter(|s| s.status == SaleStatus::Pending).count(),
        cotizaciones_pendientes: pending_quotations,
        promedio_venta: average,
        ultimas_ventas: recent
            .into_iter()
            .take(10)
            .map(|s| RecentSale {
                id: s.id,
                cliente: s.customer_name.clone(),
                total: s.total.clone(),
                estado: s.status,
                fecha: s.created_at,
            })
            .collect(),
        rendimiento_semanal: weekly_completed(own_sales, today, 4),
        distribucion_estado: status_distribution(&month),
        rendimiento_mensual: monthly_completed(own_sales, today, 6, false),
    }
}

/// 仪表盘服务
pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn for_user(&self, user: &User, today: NaiveDate) -> AppResult<Dashboard> {
        let stats = if user.is_admin() {
            DashboardStats::Admin(self.admin(today).await?)
        } else {
            DashboardStats::Seller(self.seller(user.id, today).await?)
        };
        Ok(Dashboard {
            usuario: user.display_name().to_string(),
            rol: user.role.clone(),
            stats,
        })
    }

    async fn admin(&self, today: NaiveDate) -> AppResult<AdminStats> {
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
        let users = users::list_users(&self.pool).await?;
        let low_stock = products::low_stock_products(&self.pool, LOW_STOCK_THRESHOLD).await?;
        let product_count = products::count_products(&self.pool).await?;
        let quotation_counts: IndexMap<String, i64> =
            quotations::count_by_status(&self.pool).await?.into_iter().collect();

        Ok(admin_stats(
            today,
            AdminInputs {
                sales: &sales,
                users: &users,
                low_stock,
                product_count,
                quotation_counts: &quotation_counts,
            },
        ))
    }

    async fn seller(&self, seller_id: i64, today: NaiveDate) -> AppResult<SellerStats> {
        let own = sales::list_sales(
            &self.pool,
            &SaleFilter {
                seller_id: Some(seller_id),
                ..Default::default()
            },
        )
        .await?;
        let pending = quotations::count_by_status(&self.pool)
            .await?
            .into_iter()
            .find(|(st, _)| st == DEFAULT_QUOTATION_STATUS)
            .map(|(_, n)| n)
            .unwrap_or(0);
        Ok(seller_stats(today, &own, pending))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{DeliveryType, PaymentMethod, ADMIN_ROLE, SELLER_ROLE};
    use chrono::TimeZone;
    use std::str::FromStr;

    pub(crate) fn sale(
        id: i64,
        seller_id: i64,
        status: SaleStatus,
        total: &str,
        at: (i32, u32, u32),
    ) -> Sale {
        Sale {
            id,
            customer_name: format!("Cliente {id}"),
            customer_phone: "987654321".into(),
            customer_email: "cliente@correo.pe".into(),
            delivery_type: DeliveryType::Pickup,
            delivery_address: None,
            payment_method: if id % 2 == 0 { PaymentMethod::Yape } else { PaymentMethod::Cash },
            status,
            subtotal: BigDecimal::from_str(total).unwrap(),
            discount: BigDecimal::zero(),
            igv: BigDecimal::zero(),
            delivery_fee: BigDecimal::zero(),
            total: BigDecimal::from_str(total).unwrap(),
            seller_id,
            seller_username: format!("vendedor{seller_id}"),
            seller_name: Some(format!("Vendedor {seller_id}")),
            created_at: Utc.with_ymd_and_hms(at.0, at.1, at.2, 15, 0, 0).unwrap(),
            paid_at: None,
            notes: None,
            items: vec![],
        }
    }

    fn user(id: i64, role: &str, name: &str) -> User {
        User {
            id,
            username: format!("u{id}"),
            password_hash: String::new(),
            full_name: Some(name.into()),
            email: None,
            phone: None,
            role_id: if role == ADMIN_ROLE { 1 } else { 2 },
            role: role.into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 16).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn admin_month_kpis_only_count_completed_sales() {
        let sales = vec![
            sale(1, 2, SaleStatus::Completed, "500", (2024, 5, 2)),
            sale(2, 2, SaleStatus::Pending, "300", (2024, 5, 3)),
            sale(3, 3, SaleStatus::Completed, "800", (2024, 5, 10)),
            sale(4, 3, SaleStatus::Completed, "999", (2024, 4, 30)),
        ];
        let users = vec![user(1, ADMIN_ROLE, "Ana Díaz"), user(2, SELLER_ROLE, "Luis Soto Vega")];
        let mut counts = IndexMap::new();
        counts.insert("Pendiente".to_string(), 4);
        counts.insert("Cerrada".to_string(), 2);
        counts.insert("Cancelada".to_string(), 1);

        let stats = admin_stats(
            today(),
            AdminInputs {
                sales: &sales,
                users: &users,
                low_stock: vec![],
                product_count: 12,
                quotation_counts: &counts,
            },
        );
        assert_eq!(stats.ventas_totales_mes, dec("1300"));
        assert_eq!(stats.cantidad_ventas_mes, 2);
        assert_eq!(stats.cotizaciones_pendientes, 4);
        assert_eq!(stats.cotizaciones_cerradas, 2);
        assert_eq!(stats.total_cotizaciones, 7);
        assert_eq!(stats.usuarios[1].apellidos, "Soto Vega");
        assert_eq!(stats.top_vendedores[0].nombre, "Vendedor 3");
        assert_eq!(stats.distribucion_estado.get("PENDIENTE"), Some(&1));
        assert_eq!(stats.ventas_por_mes.len(), 6);
        assert_eq!(stats.ventas_por_mes[4].mes, "abr 2024");
        assert_eq!(stats.ventas_por_mes[4].total, dec("999"));
        assert_eq!(stats.ventas_por_mes[5].total, dec("1300"));
    }

    #[test]
    fn seller_commission_and_average() {
        let own = vec![
            sale(1, 2, SaleStatus::Completed, "1000", (2024, 5, 14)),
            sale(2, 2, SaleStatus::Completed, "500", (2024, 5, 6)),
            sale(3, 2, SaleStatus::Pending, "200", (2024, 5, 15)),
            sale(4, 2, SaleStatus::Completed, "100", (2024, 3, 1)),
        ];
        let stats = seller_stats(today(), &own, 3);
        assert_eq!(stats.mis_ventas_mes, dec("1500"));
        assert_eq!(stats.mis_comisiones, dec("150"));
        assert_eq!(stats.promedio_venta, dec("750"));
        assert_eq!(stats.ventas_pendientes, 1);
        assert_eq!(stats.ultimas_ventas[0].id, 3);
        assert_eq!(stats.rendimiento_semanal[3].semana, "Sem 4");
        assert_eq!(stats.rendimiento_semanal[3].inicio, "13/05");
        assert_eq!(stats.rendimiento_semanal[3].total, dec("1000"));
        assert_eq!(stats.rendimiento_semanal[2].total, dec("500"));
        assert_eq!(stats.rendimiento_mensual[3].mes, "mar");
    }

    #[test]
    fn seller_without_sales_has_zero_average() {
        let stats = seller_stats(today(), &[], 0);
        assert!(stats.promedio_venta.is_zero());
        assert!(stats.ultimas_ventas.is_empty());
    }

    #[test]
    fn dashboard_flattens_role_stats() {
        let d = Dashboard {
            usuario: "Luis".into(),
            rol: SELLER_ROLE.into(),
            stats: DashboardStats::Seller(seller_stats(today(), &[], 0)),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["rol"], "VENDEDOR");
        assert!(json.get("misComisiones").is_some());
        assert!(json.get("ventasTotalesMes").is_none());
    }
}
