//! 购物车辅助计算 (无状态)

use crate::service::util::{decimal_value, format_money, integer_value};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 前端提交的购物车行, 数字字段可能是数字或字符串
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartItem {
    pub id: Option<Value>,
    pub nombre: Option<String>,
    pub precio: Option<Value>,
    pub cantidad: Option<Value>,
}

impl CartItem {
    fn price(&self) -> Option<BigDecimal> {
        self.precio.as_ref().and_then(decimal_value)
    }

    fn quantity(&self) -> Option<i64> {
        self.cantidad.as_ref().and_then(integer_value)
    }

    fn label(&self) -> &str {
        self.nombre.as_deref().unwrap_or("null")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

/// Σ 单价 × 数量; 任一行数字无法解析时返回出错行的名字
pub fn cart_total(items: &[CartItem]) -> Result<BigDecimal, String> {
    items.iter().try_fold(BigDecimal::zero(), |acc, item| {
        match (item.price(), item.quantity()) {
            (Some(price), Some(qty)) => Ok(acc + price * BigDecimal::from(qty)),
            _ => Err(item.label().to_string()),
        }
    })
}

pub fn count_items(items: &[CartItem]) -> Result<i64, String> {
    items.iter().try_fold(0i64, |acc, item| {
        item.quantity()
            .map(|q| acc + q)
            .ok_or_else(|| item.label().to_string())
    })
}

/// 逐行检查购物车, 返回全部错误信息
pub fn validate_cart(items: &[CartItem]) -> Vec<String> {
    let mut errors = Vec::new();
    if items.is_empty() {
        errors.push("El carrito está vacío".to_string());
    }
    for item in items {
        if item.id.as_ref().map_or(true, Value::is_null) {
            errors.push("Producto sin ID".to_string());
        }
        if item.nombre.is_none() {
            errors.push("Producto sin nombre".to_string());
        }
        match item.price() {
            Some(p) if p <= BigDecimal::zero() => errors.push(format!("Precio inválido: {}", p)),
            Some(_) => {}
            None => errors.push(format!("Precio no válido en: {}", item.label())),
        }
        match item.quantity() {
            Some(q) if q <= 0 => errors.push(format!("Cantidad inválida en: {}", item.label())),
            Some(_) => {}
            None => errors.push(format!("Cantidad no válida en: {}", item.label())),
        }
    }
    errors
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountResult {
    pub descuento: BigDecimal,
    pub descuento_formateado: String,
    pub total: BigDecimal,
    pub total_formateado: String,
    pub descripcion: String,
    pub aplicado: bool,
}

/// 优惠码 (不区分大小写) 优先, 否则满 1000 打 95 折
pub fn apply_discount(total: &BigDecimal, code: Option<&str>) -> DiscountResult {
    let code = code.map(str::trim).unwrap_or_default();
    let (percent, description) = if code.eq_ignore_ascii_case("BIENVENIDA10") {
        (10, "Descuento bienvenida 10%")
    } else if code.eq_ignore_ascii_case("NAVIDAD15") {
        (15, "Descuento navidad 15%")
    } else if *total >= BigDecimal::from(1000) {
        (5, "Descuento por compra mayor a 1000")
    } else {
        (0, "")
    };

    let discount = (total * BigDecimal::from(percent) / BigDecimal::from(100)).round(2);
    let final_total = total - &discount;
    DiscountResult {
        descuento_formateado: format_money(&discount),
        total_formateado: format_money(&final_total),
        aplicado: discount > BigDecimal::zero(),
        descuento: discount,
        total: final_total,
        descripcion: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn items(v: Value) -> Vec<CartItem> {
        serde_json::from_value::<CartRequest>(json!({ "items": v })).unwrap().items
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn totals_accept_numbers_and_strings() {
        let list = items(json!([
            {"id": 1, "nombre": "Colchón", "precio": 499.9, "cantidad": 2},
            {"id": 2, "nombre": "Almohada", "precio": "35.50", "cantidad": "3"}
        ]));
        assert_eq!(cart_total(&list).unwrap(), dec("1106.3"));
        assert_eq!(count_items(&list).unwrap(), 5);
    }

    #[test]
    fn unparseable_quantity_is_an_error() {
        let list = items(json!([{"id": 1, "nombre": "Colchón", "precio": 10, "cantidad": "dos"}]));
        assert_eq!(cart_total(&list), Err("Colchón".to_string()));
        assert!(count_items(&list).is_err());
    }

    #[test]
    fn validation_lists_every_problem() {
        assert_eq!(validate_cart(&[]), vec!["El carrito está vacío".to_string()]);

        let list = items(json!([{"precio": 0, "cantidad": -1}]));
        assert_eq!(
            validate_cart(&list),
            vec![
                "Producto sin ID".to_string(),
                "Producto sin nombre".to_string(),
                "Precio inválido: 0".to_string(),
                "Cantidad inválida en: null".to_string(),
            ]
        );
    }

    #[test]
    fn discount_codes() {
        let r = apply_discount(&dec("200"), Some("bienvenida10"));
        assert_eq!(r.descuento, dec("20"));
        assert_eq!(r.total, dec("180"));
        assert_eq!(r.total_formateado, "S/ 180.00");
        assert!(r.aplicado);

        let r = apply_discount(&dec("200"), Some("NAVIDAD15"));
        assert_eq!(r.descuento, dec("30"));
    }

    #[test]
    fn automatic_discount_from_one_thousand() {
        let r = apply_discount(&dec("1000"), None);
        assert_eq!(r.descuento, dec("50"));
        assert_eq!(r.descripcion, "Descuento por compra mayor a 1000");

        let r = apply_discount(&dec("999.99"), Some("OTRO"));
        assert!(!r.aplicado);
        assert_eq!(r.total, dec("999.99"));
        assert_eq!(r.descuento_formateado, "S/ 0.00");
    }
}
