use super::UnknownValue;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::service::validation::{trimmed, FormFields};
use sqlx::FromRow;
use std::str::FromStr;
use validator::Validate;

/// 商品状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    #[serde(rename = "Disponible")]
    Available,
    #[serde(rename = "Agotado")]
    OutOfStock,
    #[serde(rename = "Descontinuado")]
    Discontinued,
    #[serde(rename = "No disponible")]
    Unavailable,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 4] = [
        ProductStatus::Available,
        ProductStatus::OutOfStock,
        ProductStatus::Discontinued,
        ProductStatus::Unavailable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "Disponible",
            ProductStatus::OutOfStock => "Agotado",
            ProductStatus::Discontinued => "Descontinuado",
            ProductStatus::Unavailable => "No disponible",
        }
    }
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Available
    }
}

impl FromStr for ProductStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownValue { kind: "estado de producto", value: s.to_string() })
    }
}

impl TryFrom<String> for ProductStatus {
    type Error = UnknownValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 商品 (含技术参数与 base64 图片)
///
/// 图片字段不随 JSON 输出, 通过 `/api/imagen/*` 单独获取
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    #[serde(rename = "codigo")]
    pub code: Option<String>,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precio")]
    pub price: BigDecimal,
    pub stock: i32,
    #[sqlx(try_from = "String")]
    #[serde(rename = "estado")]
    pub status: ProductStatus,
    #[serde(skip_serializing)]
    pub main_image: Option<String>,
    pub material: Option<String>,
    #[serde(rename = "dimensiones")]
    pub dimensions: Option<String>,
    #[serde(rename = "peso")]
    pub weight: Option<String>,
    #[serde(rename = "firmeza")]
    pub firmness: Option<String>,
    #[serde(rename = "garantia")]
    pub warranty: Option<String>,
    #[serde(rename = "caracteristicas")]
    pub features: Option<String>,
    #[serde(skip_serializing)]
    pub tech_image_1: Option<String>,
    #[serde(skip_serializing)]
    pub tech_image_2: Option<String>,
    #[serde(rename = "fechaCreacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fechaActualizacion")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock < LOW_STOCK_THRESHOLD
    }
}

/// 低库存阈值
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// 不含图片的轻量投影, 用于销售校验与仪表盘
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductSummary {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "precio")]
    pub price: BigDecimal,
    pub stock: i32,
}

/// 新增/编辑商品的表单
///
/// 价格 (BigDecimal) 与状态的校验在 `service::product` 中手写
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductForm {
    #[serde(rename = "codigo")]
    pub code: Option<String>,
    #[serde(rename = "nombre")]
    #[validate(
        required(message = "El nombre es obligatorio"),
        length(max = 200, message = "El nombre no puede exceder 200 caracteres")
    )]
    pub name: Option<String>,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "categoria")]
    #[validate(
        required(message = "La categoría es obligatoria"),
        length(max = 100, message = "La categoría no puede exceder 100 caracteres")
    )]
    pub category: Option<String>,
    #[serde(rename = "precio")]
    pub price: Option<BigDecimal>,
    #[validate(range(min = 0, message = "El stock no puede ser negativo"))]
    pub stock: Option<i32>,
    #[serde(rename = "estado")]
    pub status: Option<String>,
    #[serde(rename = "imagenPrincipal")]
    pub main_image: Option<String>,
    pub material: Option<String>,
    #[serde(rename = "dimensiones")]
    pub dimensions: Option<String>,
    #[serde(rename = "peso")]
    pub weight: Option<String>,
    #[serde(rename = "firmeza")]
    pub firmness: Option<String>,
    #[serde(rename = "garantia")]
    pub warranty: Option<String>,
    #[serde(rename = "caracteristicas")]
    pub features: Option<String>,
    #[serde(rename = "imagenTecnica1")]
    pub tech_image_1: Option<String>,
    #[serde(rename = "imagenTecnica2")]
    pub tech_image_2: Option<String>,
}

impl ProductForm {
    /// 文本字段去空白, 空串视为未填
    pub fn normalized(&self) -> Self {
        Self {
            code: trimmed(&self.code),
            name: trimmed(&self.name),
            description: trimmed(&self.description),
            category: trimmed(&self.category),
            price: self.price.clone(),
            stock: self.stock,
            status: trimmed(&self.status),
            main_image: trimmed(&self.main_image),
            material: trimmed(&self.material),
            dimensions: trimmed(&self.dimensions),
            weight: trimmed(&self.weight),
            firmness: trimmed(&self.firmness),
            warranty: trimmed(&self.warranty),
            features: trimmed(&self.features),
            tech_image_1: trimmed(&self.tech_image_1),
            tech_image_2: trimmed(&self.tech_image_2),
        }
    }
}

impl FormFields for ProductForm {
    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("name", "nombre"),
        ("category", "categoria"),
        ("price", "precio"),
        ("stock", "stock"),
        ("status", "estado"),
    ];
}

/// 校验后的商品数据, 图片为空表示保留原图
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub status: ProductStatus,
    pub main_image: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<String>,
    pub firmness: Option<String>,
    pub warranty: Option<String>,
    pub features: Option<String>,
    pub tech_image_1: Option<String>,
    pub tech_image_2: Option<String>,
}

/// 商品图片 (base64 文本)
#[derive(Debug, Clone, FromRow)]
pub struct ProductImages {
    pub main_image: Option<String>,
    pub tech_image_1: Option<String>,
    pub tech_image_2: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_labels() {
        assert_eq!("Disponible".parse::<ProductStatus>().unwrap(), ProductStatus::Available);
        assert_eq!("no disponible".parse::<ProductStatus>().unwrap(), ProductStatus::Unavailable);
        assert!("Vendido".parse::<ProductStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_label() {
        let json = serde_json::to_string(&ProductStatus::Discontinued).unwrap();
        assert_eq!(json, "\"Descontinuado\"");
    }

    #[test]
    fn form_reads_camel_case_keys() {
        let form: ProductForm = serde_json::from_str(
            r#"{"nombre":"Colchón Dual","categoria":"Colchones","precio":"899.90","stock":3,"imagenTecnica1":"AAAA"}"#,
        )
        .unwrap();
        assert_eq!(form.name.as_deref(), Some("Colchón Dual"));
        assert_eq!(form.stock, Some(3));
        assert_eq!(form.tech_image_1.as_deref(), Some("AAAA"));
    }
}
