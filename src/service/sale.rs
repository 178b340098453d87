use crate::db::{products, sales, SaleFilter};
use crate::error::{AppError, AppResult};
use crate::models::{
    DeliveryType, PaymentMethod, PlannedLine, ProductSummary, RegisterSaleRequest, Sale, SalePlan,
    SaleStatus, SaleTotals,
};
use crate::service::validation::{char_len, is_nine_digit_phone, is_sale_email, non_blank};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;

/// IGV 税率 18%
pub fn igv_rate() -> BigDecimal {
    BigDecimal::from(18) / BigDecimal::from(100)
}

/// 计算金额拆分 (折扣区间 / 税额 / 运费 / 总额)
pub fn compute_totals(
    subtotal: &BigDecimal,
    discount: Option<&BigDecimal>,
    delivery_type: DeliveryType,
    delivery_fee: Option<&BigDecimal>,
) -> AppResult<SaleTotals> {
    let discount = discount.cloned().unwrap_or_else(BigDecimal::zero);
    if discount < BigDecimal::zero() || &discount > subtotal {
        return Err(bad("El descuento no puede ser negativo ni mayor al subtotal"));
    }

    let taxable = subtotal - &discount;
    let igv = (&taxable * igv_rate()).round(2);

    let delivery_fee = match delivery_type {
        DeliveryType::Pickup => BigDecimal::zero(),
        DeliveryType::HomeDelivery => {
            let fee = delivery_fee.cloned().unwrap_or_else(BigDecimal::zero);
            if fee < BigDecimal::zero() {
                return Err(bad("El costo de delivery no puede ser negativo"));
            }
            fee
        }
    };

    let total = &taxable + &igv + &delivery_fee;
    if total <= BigDecimal::zero() {
        return Err(bad("El total de la venta debe ser mayor a 0"));
    }

    Ok(SaleTotals {
        subtotal: subtotal.clone(),
        discount,
        igv,
        delivery_fee,
        total,
    })
}

/// 校验销售请求并生成落库计划, 校验顺序固定, 第一处失败即返回
///
/// `products` 为请求中涉及的商品 (已加锁的最新库存)
pub fn plan_sale(
    req: &RegisterSaleRequest,
    products: &HashMap<i64, ProductSummary>,
    seller_id: Option<i64>,
) -> AppResult<SalePlan> {
    // 1. 客户信息
    let customer_name = non_blank(req.customer_name.as_deref())
        .ok_or_else(|| bad("El nombre del cliente es requerido"))?;
    if !(3..=100).contains(&char_len(customer_name)) {
        return Err(bad("El nombre debe tener entre 3 y 100 caracteres"));
    }
    let customer_phone = non_blank(req.customer_phone.as_deref())
        .ok_or_else(|| bad("El teléfono del cliente es requerido"))?;
    if !is_nine_digit_phone(customer_phone) {
        return Err(bad("El teléfono debe tener exactamente 9 dígitos"));
    }
    let customer_email = non_blank(req.customer_email.as_deref())
        .ok_or_else(|| bad("El correo del cliente es requerido"))?;
    if !is_sale_email(customer_email) {
        return Err(bad("El correo no es válido"));
    }

    // 2. 交付方式
    let delivery_type: DeliveryType = non_blank(req.delivery_type.as_deref())
        .ok_or_else(|| bad("Debe seleccionar el tipo de entrega (Domicilio o Recojo)"))?
        .parse()
        .map_err(|_| bad("Debe seleccionar el tipo de entrega (Domicilio o Recojo)"))?;
    let delivery_address = match delivery_type {
        DeliveryType::HomeDelivery => {
            let address = non_blank(req.delivery_address.as_deref()).ok_or_else(|| {
                bad("La dirección de entrega es requerida para entregas a domicilio")
            })?;
            if !(10..=255).contains(&char_len(address)) {
                return Err(bad("La dirección debe tener entre 10 y 255 caracteres"));
            }
            Some(address.to_string())
        }
        DeliveryType::Pickup => None,
    };

    // 3. 付款方式
    let payment_method: PaymentMethod = non_blank(req.payment_method.as_deref())
        .ok_or_else(|| bad("El método de pago es requerido"))?
        .parse()
        .map_err(|e: crate::models::UnknownValue| bad(format!("Método de pago no válido: {}", e.value)))?;

    // 4. 明细不能为空
    if req.items.is_empty() {
        return Err(bad("Debe agregar al menos un producto"));
    }

    // 5. 逐行校验, 同一商品多行时累计数量再比库存
    // 按 i64 累计, 多行数量之和不会溢出
    let mut requested: HashMap<i64, i64> = HashMap::new();
    let mut lines = Vec::with_capacity(req.items.len());
    let mut subtotal = BigDecimal::zero();
    for item in &req.items {
        let product_id = item
            .product_id()
            .ok_or_else(|| bad("El producto es requerido en cada detalle"))?;
        let product = products
            .get(&product_id)
            .ok_or_else(|| bad(format!("El producto con ID {} no existe", product_id)))?;
        let quantity = item.quantity.unwrap_or(0);
        if quantity < 1 {
            return Err(bad("La cantidad debe ser mínimo 1"));
        }
        let total_requested = requested.entry(product_id).or_insert(0);
        *total_requested += i64::from(quantity);
        if *total_requested > i64::from(product.stock) {
            return Err(bad(format!(
                "Stock insuficiente para {}. Disponible: {}, Solicitado: {}",
                product.name, product.stock, total_requested
            )));
        }
        let unit_price = item.unit_price.clone().unwrap_or_else(|| product.price.clone());
        if unit_price <= BigDecimal::zero() {
            return Err(bad("El precio unitario debe ser mayor a 0"));
        }

        subtotal += &unit_price * BigDecimal::from(quantity);
        lines.push(PlannedLine { product_id, quantity, unit_price });
    }

    // 6-9. 金额
    let totals = compute_totals(
        &subtotal,
        req.discount.as_ref(),
        delivery_type,
        req.delivery_fee.as_ref(),
    )?;

    // 10. 销售员
    let seller_id = seller_id.ok_or_else(|| bad("El vendedor es requerido"))?;

    let notes = non_blank(req.notes.as_deref()).map(str::to_string);
    if notes.as_deref().is_some_and(|n| char_len(n) > 500) {
        return Err(bad("Las observaciones no pueden exceder 500 caracteres"));
    }

    Ok(SalePlan {
        customer_name: customer_name.to_string(),
        customer_phone: customer_phone.to_string(),
        customer_email: customer_email.to_string(),
        delivery_type,
        delivery_address,
        payment_method,
        notes,
        seller_id,
        lines,
        totals,
    })
}

fn bad(msg: impl Into<String>) -> AppError {
    AppError::BadRequest(msg.into())
}

/// 当日销售汇总
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    #[serde(rename = "totalVentas")]
    pub total_sales: usize,
    #[serde(rename = "ventasPendientes")]
    pub pending: usize,
    #[serde(rename = "ventasCompletadas")]
    pub completed: usize,
    #[serde(rename = "ventasCanceladas")]
    pub cancelled: usize,
    #[serde(rename = "ventasEntregadas")]
    pub delivered: usize,
    #[serde(rename = "ingresoTotal")]
    pub revenue: BigDecimal,
}

impl DailyReport {
    /// 收入只计已完成的销售
    pub fn from_sales(sales: &[Sale]) -> Self {
        let count = |st: SaleStatus| sales.iter().filter(|s| s.status == st).count();
        let revenue = sales
            .iter()
            .filter(|s| s.status == SaleStatus::Completed)
            .fold(BigDecimal::zero(), |acc, s| acc + &s.total);
        Self {
            total_sales: sales.len(),
            pending: count(SaleStatus::Pending),
            completed: count(SaleStatus::Completed),
            cancelled: count(SaleStatus::Cancelled),
            delivered: count(SaleStatus::Delivered),
            revenue,
        }
    }
}

/// 当天 [00:00, 次日 00:00) (UTC)
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now.date_naive().and_time(NaiveTime::default()).and_utc();
    (start, start + Duration::days(1))
}

/// 销售服务
pub struct SaleService {
    pool: PgPool,
}

impl SaleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 登记销售: 锁定商品 -> 校验 -> 写主表与明细 -> 扣库存, 全部在同一事务
    pub async fn register(&self, req: &RegisterSaleRequest, seller_id: i64) -> AppResult<Sale> {
        let mut ids: Vec<i64> = req.items.iter().filter_map(|i| i.product_id()).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await?;
        let locked = products::lock_products(&mut tx, &ids).await?;
        let by_id: HashMap<i64, ProductSummary> = locked.into_iter().map(|p| (p.id, p)).collect();

        let plan = plan_sale(req, &by_id, Some(seller_id))?;

        let sale_id = sales::insert_sale(&mut tx, &plan).await?;
        sales::insert_items(&mut tx, sale_id, &plan).await?;
        products::adjust_stock(&mut tx, &plan.stock_deductions()).await?;
        tx.commit().await?;

        info!(
            "Venta {} registrada: vendedor={} lineas={} total={}",
            sale_id,
            seller_id,
            plan.lines.len(),
            plan.totals.total
        );
        self.get(sale_id).await
    }

    pub async fn get(&self, id: i64) -> AppResult<Sale> {
        sales::get_sale(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("La venta no existe".to_string()))
    }

    pub async fn list(&self, filter: &SaleFilter) -> AppResult<Vec<Sale>> {
        Ok(sales::list_sales(&self.pool, filter).await?)
    }

    pub async fn by_seller(&self, seller_id: i64) -> AppResult<Vec<Sale>> {
        self.list(&SaleFilter { seller_id: Some(seller_id), ..Default::default() }).await
    }

    pub async fn by_status(&self, status: SaleStatus) -> AppResult<Vec<Sale>> {
        self.list(&SaleFilter { status: Some(status), ..Default::default() }).await
    }

    pub async fn today(&self) -> AppResult<Vec<Sale>> {
        let (from, to) = day_bounds(Utc::now());
        self.list(&SaleFilter { from: Some(from), to: Some(to), ..Default::default() }).await
    }

    pub async fn daily_report(&self) -> AppResult<DailyReport> {
        Ok(DailyReport::from_sales(&self.today().await?))
    }

    /// 修改状态, 取消时退回库存
    pub async fn update_status(&self, id: i64, next: SaleStatus) -> AppResult<Sale> {
        let mut tx = self.pool.begin().await?;
        let current = sales::lock_sale_status(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("La venta no existe".to_string()))?;

        let effect = current.transition_to(next)?;
        sales::set_sale_status(&mut tx, id, next, effect.stamp_paid_at).await?;
        if effect.restore_stock {
            let restock = sales::item_quantities(&mut tx, id).await?;
            products::adjust_stock(&mut tx, &restock).await?;
        }
        tx.commit().await?;

        info!("Venta {} cambia de estado {} -> {}", id, current.as_str(), next.as_str());
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SaleItemRequest;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn catalog() -> HashMap<i64, ProductSummary> {
        [
            (1, "Colchón Ortopédico", "100.00", 10),
            (2, "Almohada Memory", "50.00", 3),
        ]
        .into_iter()
        .map(|(id, name, price, stock)| {
            (
                id,
                ProductSummary {
                    id,
                    name: name.to_string(),
                    category: "Colchones".to_string(),
                    price: dec(price),
                    stock,
                },
            )
        })
        .collect()
    }

    fn item(id: i64, qty: i32, price: Option<&str>) -> SaleItemRequest {
        SaleItemRequest {
            product_id: Some(id),
            product: None,
            quantity: Some(qty),
            unit_price: price.map(dec),
        }
    }

    fn request() -> RegisterSaleRequest {
        RegisterSaleRequest {
            customer_name: Some("María López".into()),
            customer_phone: Some("987654321".into()),
            customer_email: Some("maria@correo.pe".into()),
            delivery_type: Some("RECOJO".into()),
            delivery_address: None,
            payment_method: Some("YAPE".into()),
            discount: Some(dec("20")),
            delivery_fee: None,
            notes: None,
            items: vec![item(1, 2, Some("100")), item(2, 1, Some("50"))],
        }
    }

    fn err_msg(r: AppResult<SalePlan>) -> String {
        match r {
            Err(e) => e.to_string(),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn worked_example_pickup() {
        let plan = plan_sale(&request(), &catalog(), Some(7)).unwrap();
        assert_eq!(plan.totals.subtotal, dec("250"));
        assert_eq!(plan.totals.discount, dec("20"));
        assert_eq!(plan.totals.igv, dec("41.4"));
        assert_eq!(plan.totals.delivery_fee, dec("0"));
        assert_eq!(plan.totals.total, dec("271.4"));
        assert_eq!(plan.seller_id, 7);
        assert_eq!(plan.stock_deductions(), vec![(1, -2), (2, -1)]);
    }

    #[test]
    fn worked_example_home_delivery_adds_fee() {
        let mut req = request();
        req.delivery_type = Some("DOMICILIO".into());
        req.delivery_address = Some("Av. Larco 1234, Miraflores".into());
        req.delivery_fee = Some(dec("15"));
        let plan = plan_sale(&req, &catalog(), Some(7)).unwrap();
        assert_eq!(plan.totals.total, dec("286.4"));
        assert_eq!(plan.delivery_address.as_deref(), Some("Av. Larco 1234, Miraflores"));
    }

    #[test]
    fn pickup_forces_zero_delivery_fee() {
        let mut req = request();
        req.delivery_fee = Some(dec("30"));
        let plan = plan_sale(&req, &catalog(), Some(7)).unwrap();
        assert!(plan.totals.delivery_fee.is_zero());
        assert_eq!(plan.totals.total, dec("271.4"));
    }

    #[test]
    fn totals_hold_the_identity() {
        let t = compute_totals(&dec("999.99"), Some(&dec("0.99")), DeliveryType::HomeDelivery, Some(&dec("10")))
            .unwrap();
        assert_eq!(t.igv, dec("179.82"));
        assert_eq!(t.total, (&t.subtotal - &t.discount) + &t.igv + &t.delivery_fee);
    }

    #[test]
    fn unit_price_defaults_to_catalog_price() {
        let mut req = request();
        req.items = vec![item(2, 2, None)];
        req.discount = None;
        let plan = plan_sale(&req, &catalog(), Some(1)).unwrap();
        assert_eq!(plan.lines[0].unit_price, dec("50.00"));
        assert_eq!(plan.totals.subtotal, dec("100"));
    }

    #[test]
    fn insufficient_stock_is_reported_with_quantities() {
        let mut req = request();
        req.items = vec![item(2, 4, None)];
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "Stock insuficiente para Almohada Memory. Disponible: 3, Solicitado: 4"
        );
    }

    #[test]
    fn stock_check_sums_repeated_products() {
        let mut req = request();
        req.items = vec![item(2, 2, None), item(2, 2, None)];
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "Stock insuficiente para Almohada Memory. Disponible: 3, Solicitado: 4"
        );
    }

    #[test]
    fn repeated_lines_past_i32_max_are_insufficient_stock() {
        let mut req = request();
        req.items = vec![item(2, 1, None), item(2, i32::MAX, None)];
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "Stock insuficiente para Almohada Memory. Disponible: 3, Solicitado: 2147483648"
        );
    }

    #[test]
    fn stock_deductions_saturate_instead_of_wrapping() {
        let mut plan = plan_sale(&request(), &catalog(), Some(1)).unwrap();
        plan.lines = vec![
            PlannedLine { product_id: 1, quantity: i32::MAX, unit_price: dec("1") },
            PlannedLine { product_id: 1, quantity: i32::MAX, unit_price: dec("1") },
        ];
        assert_eq!(plan.stock_deductions(), vec![(1, i32::MIN)]);
    }

    #[test]
    fn customer_checks_come_first() {
        let mut req = request();
        req.customer_name = Some("Al".into());
        req.items.clear();
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El nombre debe tener entre 3 y 100 caracteres"
        );

        let mut req = request();
        req.customer_phone = Some("12345".into());
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El teléfono debe tener exactamente 9 dígitos"
        );

        let mut req = request();
        req.customer_email = Some("sin-arroba".into());
        assert_eq!(err_msg(plan_sale(&req, &catalog(), Some(1))), "El correo no es válido");
    }

    #[test]
    fn home_delivery_requires_long_enough_address() {
        let mut req = request();
        req.delivery_type = Some("DOMICILIO".into());
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "La dirección de entrega es requerida para entregas a domicilio"
        );
        req.delivery_address = Some("Calle 1".into());
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "La dirección debe tener entre 10 y 255 caracteres"
        );
    }

    #[test]
    fn payment_and_items_are_required() {
        let mut req = request();
        req.payment_method = None;
        assert_eq!(err_msg(plan_sale(&req, &catalog(), Some(1))), "El método de pago es requerido");

        let mut req = request();
        req.items.clear();
        assert_eq!(err_msg(plan_sale(&req, &catalog(), Some(1))), "Debe agregar al menos un producto");
    }

    #[test]
    fn line_checks() {
        let mut req = request();
        req.items = vec![item(99, 1, None)];
        assert_eq!(err_msg(plan_sale(&req, &catalog(), Some(1))), "El producto con ID 99 no existe");

        req.items = vec![item(1, 0, None)];
        assert_eq!(err_msg(plan_sale(&req, &catalog(), Some(1))), "La cantidad debe ser mínimo 1");

        req.items = vec![item(1, 1, Some("0"))];
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El precio unitario debe ser mayor a 0"
        );

        req.items = vec![SaleItemRequest { quantity: Some(1), ..Default::default() }];
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El producto es requerido en cada detalle"
        );
    }

    #[test]
    fn discount_must_stay_within_subtotal() {
        let mut req = request();
        req.discount = Some(dec("250.01"));
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El descuento no puede ser negativo ni mayor al subtotal"
        );
        req.discount = Some(dec("-1"));
        assert!(plan_sale(&req, &catalog(), Some(1)).is_err());
    }

    #[test]
    fn full_discount_leaves_zero_total() {
        let mut req = request();
        req.discount = Some(dec("250"));
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El total de la venta debe ser mayor a 0"
        );
    }

    #[test]
    fn negative_delivery_fee_is_rejected() {
        let mut req = request();
        req.delivery_type = Some("DOMICILIO".into());
        req.delivery_address = Some("Jr. Las Flores 456, Surco".into());
        req.delivery_fee = Some(dec("-5"));
        assert_eq!(
            err_msg(plan_sale(&req, &catalog(), Some(1))),
            "El costo de delivery no puede ser negativo"
        );
    }

    #[test]
    fn seller_is_required() {
        assert_eq!(err_msg(plan_sale(&request(), &catalog(), None)), "El vendedor es requerido");
    }

    #[test]
    fn daily_report_counts_only_completed_revenue() {
        let plan = plan_sale(&request(), &catalog(), Some(1)).unwrap();
        let make = |id, status| Sale {
            id,
            customer_name: plan.customer_name.clone(),
            customer_phone: plan.customer_phone.clone(),
            customer_email: plan.customer_email.clone(),
            delivery_type: plan.delivery_type,
            delivery_address: None,
            payment_method: plan.payment_method,
            status,
            subtotal: plan.totals.subtotal.clone(),
            discount: plan.totals.discount.clone(),
            igv: plan.totals.igv.clone(),
            delivery_fee: plan.totals.delivery_fee.clone(),
            total: plan.totals.total.clone(),
            seller_id: 1,
            seller_username: "vendedor".into(),
            seller_name: None,
            created_at: Utc::now(),
            paid_at: None,
            notes: None,
            items: Vec::new(),
        };
        let report = DailyReport::from_sales(&[
            make(1, SaleStatus::Completed),
            make(2, SaleStatus::Completed),
            make(3, SaleStatus::Pending),
            make(4, SaleStatus::Cancelled),
        ]);
        assert_eq!(report.total_sales, 4);
        assert_eq!(report.completed, 2);
        assert_eq!(report.pending, 1);
        assert_eq!(report.cancelled, 1);
        assert_eq!(report.revenue, dec("542.8"));
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let now = DateTime::parse_from_rfc3339("2024-05-10T15:30:00Z").unwrap().with_timezone(&Utc);
        let (from, to) = day_bounds(now);
        assert_eq!(from.to_rfc3339(), "2024-05-10T00:00:00+00:00");
        assert_eq!(to - from, Duration::days(1));
    }
}
