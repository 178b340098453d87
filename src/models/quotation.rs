use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::Json;
use crate::service::validation::{trimmed, FormFields, CONTACT_PHONE};
use sqlx::FromRow;
use validator::Validate;

/// 报价单默认状态
pub const DEFAULT_QUOTATION_STATUS: &str = "Pendiente";
/// 写入该状态时记录关闭时间
pub const CLOSED_STATUS: &str = "Cerrada";
/// 报价单常用状态 (状态本身是自由文本)
pub const QUOTATION_STATUSES: [&str; 5] = ["Pendiente", "En Proceso", "Contactado", "Cerrada", "Cancelada"];

/// 写入该状态是否关闭报价单 (精确匹配, 区分大小写)
pub fn closes(status: &str) -> bool {
    status == CLOSED_STATUS
}

/// 报价单中的商品行, 以 JSON 数组存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedProduct {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i32,
    #[serde(rename = "precio")]
    pub price: BigDecimal,
}

impl QuotedProduct {
    pub fn subtotal(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.quantity)
    }
}

/// 报价单
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quotation {
    pub id: i64,
    #[serde(rename = "nombreCliente")]
    pub customer_name: String,
    pub email: String,
    #[serde(rename = "telefono")]
    pub phone: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "fechaDeseada")]
    pub desired_date: NaiveDate,
    #[serde(rename = "productos")]
    pub products: Json<Vec<QuotedProduct>>,
    pub total: BigDecimal,
    #[serde(rename = "estado")]
    pub status: String,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fechaActualizacion")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "fechaCierre")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Quotation {
    pub fn is_closed(&self) -> bool {
        closes(&self.status)
    }

    pub fn product_count(&self) -> i64 {
        self.products.iter().map(|p| p.quantity as i64).sum()
    }
}

/// 新建/编辑报价单的请求
///
/// `productos` 可以是数组, 也兼容前端提交的 JSON 字符串
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewQuotation {
    #[serde(rename = "nombreCliente")]
    #[validate(
        required(message = "El nombre del cliente es obligatorio"),
        length(min = 3, max = 100, message = "El nombre debe tener entre 3 y 100 caracteres")
    )]
    pub customer_name: Option<String>,
    #[validate(
        required(message = "El email es obligatorio"),
        email(message = "El email debe ser válido")
    )]
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    #[validate(
        required(message = "El teléfono es obligatorio"),
        length(min = 7, max = 20, message = "El teléfono debe tener entre 7 y 20 caracteres"),
        regex(
            path = *CONTACT_PHONE,
            message = "El teléfono debe contener solo números y caracteres permitidos"
        )
    )]
    pub phone: Option<String>,
    #[serde(rename = "direccion")]
    #[validate(
        required(message = "La dirección es obligatoria"),
        length(min = 5, max = 255, message = "La dirección debe tener entre 5 y 255 caracteres")
    )]
    pub address: Option<String>,
    #[serde(rename = "fechaDeseada")]
    #[validate(required(message = "La fecha deseada es obligatoria"))]
    pub desired_date: Option<NaiveDate>,
    #[serde(
        rename = "productos",
        alias = "productosJson",
        default,
        deserialize_with = "products_from_array_or_text"
    )]
    pub products: Vec<QuotedProduct>,
    #[serde(rename = "estado")]
    pub status: Option<String>,
}

impl NewQuotation {
    /// 文本字段去空白, 空串视为未填
    pub fn normalized(&self) -> Self {
        Self {
            customer_name: trimmed(&self.customer_name),
            email: trimmed(&self.email),
            phone: trimmed(&self.phone),
            address: trimmed(&self.address),
            desired_date: self.desired_date,
            products: self.products.clone(),
            status: trimmed(&self.status),
        }
    }
}

impl FormFields for NewQuotation {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("customer_name", "nombreCliente"),
        ("email", "email"),
        ("phone", "telefono"),
        ("address", "direccion"),
        ("desired_date", "fechaDeseada"),
        ("products", "productos"),
        ("total", "total"),
    ];
}

fn products_from_array_or_text<'de, D>(deserializer: D) -> Result<Vec<QuotedProduct>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<QuotedProduct>),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(list) => Ok(list),
        Raw::Text(text) if text.trim().is_empty() => Ok(Vec::new()),
        Raw::Text(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products_accept_array_or_json_text() {
        let a: NewQuotation = serde_json::from_str(
            r#"{"productos":[{"id":1,"nombre":"Colchón","cantidad":2,"precio":450}]}"#,
        )
        .unwrap();
        let b: NewQuotation = serde_json::from_str(
            r#"{"productosJson":"[{\"id\":1,\"nombre\":\"Colchón\",\"cantidad\":2,\"precio\":450}]"}"#,
        )
        .unwrap();
        assert_eq!(a.products, b.products);
        assert_eq!(a.products[0].subtotal(), BigDecimal::from(900));
    }

    #[test]
    fn only_exact_cerrada_closes() {
        assert!(closes("Cerrada"));
        assert!(!closes("cerrada"));
        assert!(!closes("Cerrada "));
        assert!(!closes("Pendiente"));
        assert!(!closes("Cancelada"));
    }

    #[test]
    fn missing_products_default_to_empty() {
        let q: NewQuotation = serde_json::from_str(r#"{"nombreCliente":"Ana"}"#).unwrap();
        assert!(q.products.is_empty());
    }
}
