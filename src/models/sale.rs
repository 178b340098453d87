use super::UnknownValue;
use crate::error::AppError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// 销售单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaleStatus {
    #[serde(rename = "PENDIENTE")]
    Pending,
    #[serde(rename = "COMPLETADA")]
    Completed,
    #[serde(rename = "CANCELADA")]
    Cancelled,
    #[serde(rename = "ENTREGADA")]
    Delivered,
}

/// 状态变更需要附带执行的动作
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionEffect {
    /// 写入付款时间
    pub stamp_paid_at: bool,
    /// 把每行数量退回库存
    pub restore_stock: bool,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 4] = [
        SaleStatus::Pending,
        SaleStatus::Completed,
        SaleStatus::Cancelled,
        SaleStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "PENDIENTE",
            SaleStatus::Completed => "COMPLETADA",
            SaleStatus::Cancelled => "CANCELADA",
            SaleStatus::Delivered => "ENTREGADA",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "Pendiente",
            SaleStatus::Completed => "Completada",
            SaleStatus::Cancelled => "Cancelada",
            SaleStatus::Delivered => "Entregada",
        }
    }

    /// 校验状态流转并给出副作用
    ///
    /// - 已取消的销售单不可再变更
    /// - 待处理 -> 已完成 时写入付款时间
    /// - 任意 -> 已取消 时退回库存
    pub fn transition_to(self, next: SaleStatus) -> Result<TransitionEffect, AppError> {
        if self == SaleStatus::Cancelled {
            return Err(AppError::BadRequest(
                "No se puede cambiar el estado de una venta cancelada".to_string(),
            ));
        }
        Ok(TransitionEffect {
            stamp_paid_at: self == SaleStatus::Pending && next == SaleStatus::Completed,
            restore_stock: next == SaleStatus::Cancelled,
        })
    }
}

impl FromStr for SaleStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SaleStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownValue { kind: "estado de venta", value: s.to_string() })
    }
}

impl TryFrom<String> for SaleStatus {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 交付方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryType {
    #[serde(rename = "DOMICILIO")]
    HomeDelivery,
    #[serde(rename = "RECOJO")]
    Pickup,
}

impl DeliveryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::HomeDelivery => "DOMICILIO",
            DeliveryType::Pickup => "RECOJO",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeliveryType::HomeDelivery => "Delivery a domicilio",
            DeliveryType::Pickup => "Recojo en tienda",
        }
    }
}

impl FromStr for DeliveryType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DOMICILIO" => Ok(DeliveryType::HomeDelivery),
            "RECOJO" => Ok(DeliveryType::Pickup),
            _ => Err(UnknownValue { kind: "tipo de entrega", value: s.to_string() }),
        }
    }
}

impl TryFrom<String> for DeliveryType {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 付款方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "EFECTIVO")]
    Cash,
    #[serde(rename = "TRANSFERENCIA")]
    Transfer,
    #[serde(rename = "YAPE")]
    Yape,
    #[serde(rename = "PLIN")]
    Plin,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::Transfer,
        PaymentMethod::Yape,
        PaymentMethod::Plin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "EFECTIVO",
            PaymentMethod::Transfer => "TRANSFERENCIA",
            PaymentMethod::Yape => "YAPE",
            PaymentMethod::Plin => "PLIN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Efectivo",
            PaymentMethod::Transfer => "Transferencia",
            PaymentMethod::Yape => "Yape",
            PaymentMethod::Plin => "Plin",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownValue { kind: "método de pago", value: s.to_string() })
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 销售单 (含销售员与明细)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Sale {
    pub id: i64,
    #[serde(rename = "clienteNombre")]
    pub customer_name: String,
    #[serde(rename = "clienteTelefono")]
    pub customer_phone: String,
    #[serde(rename = "clienteEmail")]
    pub customer_email: String,
    #[sqlx(try_from = "String")]
    #[serde(rename = "tipoEntrega")]
    pub delivery_type: DeliveryType,
    #[serde(rename = "direccionEntrega")]
    pub delivery_address: Option<String>,
    #[sqlx(try_from = "String")]
    #[serde(rename = "metodoPago")]
    pub payment_method: PaymentMethod,
    #[sqlx(try_from = "String")]
    #[serde(rename = "estado")]
    pub status: SaleStatus,
    pub subtotal: BigDecimal,
    #[serde(rename = "descuento")]
    pub discount: BigDecimal,
    pub igv: BigDecimal,
    #[serde(rename = "costoDelivery")]
    pub delivery_fee: BigDecimal,
    pub total: BigDecimal,
    #[serde(rename = "vendedorId")]
    pub seller_id: i64,
    #[serde(rename = "vendedorUsername")]
    pub seller_username: String,
    #[serde(rename = "vendedorNombre")]
    pub seller_name: Option<String>,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fechaPago")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(rename = "observaciones")]
    pub notes: Option<String>,
    #[sqlx(skip)]
    #[serde(rename = "detalles")]
    pub items: Vec<SaleItemView>,
}

impl Sale {
    /// 销售员显示名, 没有全名时用用户名
    pub fn seller_display(&self) -> &str {
        self.seller_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.seller_username)
    }
}

/// 销售明细 (关联商品名称)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SaleItemView {
    pub id: i64,
    #[serde(skip_serializing)]
    pub sale_id: i64,
    #[serde(rename = "productoId")]
    pub product_id: i64,
    #[serde(rename = "productoNombre")]
    pub product_name: String,
    #[serde(rename = "productoCodigo")]
    pub product_code: Option<String>,
    #[serde(rename = "productoCategoria")]
    pub product_category: String,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    #[serde(rename = "precioUnitario")]
    pub unit_price: BigDecimal,
    pub subtotal: BigDecimal,
}

/// 登记销售请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterSaleRequest {
    #[serde(rename = "clienteNombre")]
    pub customer_name: Option<String>,
    #[serde(rename = "clienteTelefono")]
    pub customer_phone: Option<String>,
    #[serde(rename = "clienteEmail")]
    pub customer_email: Option<String>,
    #[serde(rename = "tipoEntrega")]
    pub delivery_type: Option<String>,
    #[serde(rename = "direccionEntrega")]
    pub delivery_address: Option<String>,
    #[serde(rename = "metodoPago")]
    pub payment_method: Option<String>,
    #[serde(rename = "descuento")]
    pub discount: Option<BigDecimal>,
    #[serde(rename = "costoDelivery")]
    pub delivery_fee: Option<BigDecimal>,
    #[serde(rename = "observaciones")]
    pub notes: Option<String>,
    #[serde(rename = "detalles", default)]
    pub items: Vec<SaleItemRequest>,
}

/// 明细行: 商品可写成 `productoId` 或 `producto: {id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleItemRequest {
    #[serde(rename = "productoId")]
    pub product_id: Option<i64>,
    #[serde(rename = "producto")]
    pub product: Option<ProductRef>,
    #[serde(rename = "cantidad")]
    pub quantity: Option<i32>,
    #[serde(rename = "precioUnitario")]
    pub unit_price: Option<BigDecimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRef {
    pub id: Option<i64>,
}

impl SaleItemRequest {
    pub fn product_id(&self) -> Option<i64> {
        self.product_id
            .or_else(|| self.product.as_ref().and_then(|p| p.id))
    }
}

/// 销售金额拆分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: BigDecimal,
    pub discount: BigDecimal,
    pub igv: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub total: BigDecimal,
}

/// 校验通过、待落库的明细行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

/// 校验通过、待落库的销售单
#[derive(Debug, Clone)]
pub struct SalePlan {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub delivery_type: DeliveryType,
    pub delivery_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub seller_id: i64,
    pub lines: Vec<PlannedLine>,
    pub totals: SaleTotals,
}

impl SalePlan {
    /// 每个商品需要扣减的库存 (负数)
    ///
    /// 合计已在下单校验中受库存约束; 这里仍按饱和减法计算, 不会溢出
    pub fn stock_deductions(&self) -> Vec<(i64, i32)> {
        let mut per_product: Vec<(i64, i32)> = Vec::new();
        for line in &self.lines {
            match per_product.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => *qty = qty.saturating_sub(line.quantity),
                None => per_product.push((line.product_id, 0i32.saturating_sub(line.quantity))),
            }
        }
        per_product
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_sale_rejects_every_transition() {
        for next in SaleStatus::ALL {
            assert!(SaleStatus::Cancelled.transition_to(next).is_err());
        }
    }

    #[test]
    fn completing_a_pending_sale_stamps_payment() {
        let effect = SaleStatus::Pending.transition_to(SaleStatus::Completed).unwrap();
        assert!(effect.stamp_paid_at);
        assert!(!effect.restore_stock);

        let effect = SaleStatus::Delivered.transition_to(SaleStatus::Completed).unwrap();
        assert!(!effect.stamp_paid_at);
    }

    #[test]
    fn cancelling_restores_stock_from_any_open_state() {
        for current in [SaleStatus::Pending, SaleStatus::Completed, SaleStatus::Delivered] {
            let effect = current.transition_to(SaleStatus::Cancelled).unwrap();
            assert!(effect.restore_stock);
            assert!(!effect.stamp_paid_at);
        }
    }

    #[test]
    fn plain_transition_has_no_side_effects() {
        let effect = SaleStatus::Completed.transition_to(SaleStatus::Delivered).unwrap();
        assert_eq!(effect, TransitionEffect::default());
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("recojo".parse::<DeliveryType>().unwrap(), DeliveryType::Pickup);
        assert_eq!("Yape".parse::<PaymentMethod>().unwrap(), PaymentMethod::Yape);
        assert_eq!("completada".parse::<SaleStatus>().unwrap(), SaleStatus::Completed);
        assert!("TARJETA".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn item_request_accepts_nested_product_reference() {
        let item: SaleItemRequest =
            serde_json::from_str(r#"{"producto":{"id":4},"cantidad":2}"#).unwrap();
        assert_eq!(item.product_id(), Some(4));
        let item: SaleItemRequest =
            serde_json::from_str(r#"{"productoId":9,"cantidad":1}"#).unwrap();
        assert_eq!(item.product_id(), Some(9));
    }
}
