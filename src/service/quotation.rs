use crate::db::quotations::{self, QuotationRecord};
use crate::error::{AppError, AppResult};
use crate::models::{NewQuotation, Quotation, QuotedProduct, CLOSED_STATUS, DEFAULT_QUOTATION_STATUS};
use crate::service::validation::{char_len, form_errors, non_blank};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;

/// 校验通过的报价单
#[derive(Debug, Clone, PartialEq)]
pub struct ValidQuotation {
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub desired_date: NaiveDate,
    pub products: Vec<QuotedProduct>,
    pub total: BigDecimal,
    pub status: String,
}

/// 报价单总额 = Σ 单价 × 数量
pub fn quotation_total(products: &[QuotedProduct]) -> BigDecimal {
    products
        .iter()
        .fold(BigDecimal::zero(), |acc, p| acc + p.subtotal())
}

pub fn validate_quotation(q: &NewQuotation) -> AppResult<ValidQuotation> {
    let q = q.normalized();
    let mut errors = form_errors(&q);

    for p in &q.products {
        if p.quantity < 1 {
            errors.add("productos", "La cantidad de cada producto debe ser mínimo 1");
        }
        if p.price < BigDecimal::zero() {
            errors.add("productos", "El precio de cada producto no puede ser negativo");
        }
    }

    let total = quotation_total(&q.products);
    if total < BigDecimal::zero() {
        errors.add("total", "El total no puede ser negativo");
    }

    errors.finish_for::<NewQuotation>()?;

    Ok(ValidQuotation {
        customer_name: q.customer_name.unwrap_or_default(),
        email: q.email.unwrap_or_default(),
        phone: q.phone.unwrap_or_default(),
        address: q.address.unwrap_or_default(),
        desired_date: q.desired_date.unwrap_or_default(),
        products: q.products,
        total,
        status: q.status.unwrap_or_else(|| DEFAULT_QUOTATION_STATUS.to_string()),
    })
}

/// 报价单状态统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationStats {
    pub total: usize,
    pub pendientes: usize,
    pub en_proceso: usize,
    pub contactadas: usize,
    pub cerradas: usize,
    pub canceladas: usize,
}

impl QuotationStats {
    pub fn from_quotations(list: &[Quotation]) -> Self {
        let count = |st: &str| list.iter().filter(|q| q.status == st).count();
        Self {
            total: list.len(),
            pendientes: count("Pendiente"),
            en_proceso: count("En Proceso"),
            contactadas: count("Contactado"),
            cerradas: count(CLOSED_STATUS),
            canceladas: count("Cancelada"),
        }
    }
}

/// 报价单服务
pub struct QuotationService {
    pool: PgPool,
}

impl QuotationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, q: &NewQuotation) -> AppResult<Quotation> {
        let v = validate_quotation(q)?;
        let saved = quotations::insert_quotation(
            &self.pool,
            &QuotationRecord {
                customer_name: &v.customer_name,
                email: &v.email,
                phone: &v.phone,
                address: &v.address,
                desired_date: v.desired_date,
                products: &v.products,
                total: &v.total,
                status: &v.status,
            },
        )
        .await?;
        info!("Cotización {} registrada para {}", saved.id, saved.email);
        Ok(saved)
    }

    pub async fn list(&self) -> AppResult<Vec<Quotation>> {
        Ok(quotations::list_quotations(&self.pool).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Quotation> {
        quotations::get_quotation(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cotización no encontrada".to_string()))
    }

    pub async fn by_status(&self, status: &str) -> AppResult<Vec<Quotation>> {
        Ok(quotations::quotations_by_status(&self.pool, status.trim()).await?)
    }

    pub async fn by_email(&self, email: &str) -> AppResult<Vec<Quotation>> {
        Ok(quotations::quotations_by_email(&self.pool, email.trim()).await?)
    }

    /// 关键字为空时返回全部
    pub async fn search(&self, term: Option<&str>) -> AppResult<Vec<Quotation>> {
        match non_blank(term) {
            Some(t) => Ok(quotations::search_quotations(&self.pool, t).await?),
            None => self.list().await,
        }
    }

    pub async fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<Vec<Quotation>> {
        Ok(quotations::quotations_between(&self.pool, from, to).await?)
    }

    /// 更新状态 (自由文本), `Cerrada` 会记录关闭时间
    pub async fn update_status(&self, id: i64, status: Option<&str>) -> AppResult<Quotation> {
        let status = non_blank(status)
            .ok_or_else(|| AppError::BadRequest("El estado es requerido".to_string()))?;
        if char_len(status) > 50 {
            return Err(AppError::BadRequest(
                "El estado no puede exceder 50 caracteres".to_string(),
            ));
        }
        let updated = quotations::set_quotation_status(&self.pool, id, status)
            .await?
            .ok_or_else(|| AppError::NotFound("Cotización no encontrada".to_string()))?;
        info!("Cotización {} cambia a estado {}", id, status);
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if quotations::delete_quotation(&self.pool, id).await? == 0 {
            return Err(AppError::NotFound("Cotización no encontrada".to_string()));
        }
        info!("Cotización {} eliminada", id);
        Ok(())
    }

    pub async fn count_by_status(&self) -> AppResult<IndexMap<String, i64>> {
        Ok(quotations::count_by_status(&self.pool).await?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use std::str::FromStr;

    fn product(qty: i32, price: &str) -> QuotedProduct {
        QuotedProduct {
            id: Some(1),
            name: "Colchón Imperial".into(),
            quantity: qty,
            price: BigDecimal::from_str(price).unwrap(),
        }
    }

    fn new_quotation() -> NewQuotation {
        NewQuotation {
            customer_name: Some("Rosa Quispe".into()),
            email: Some("rosa@correo.pe".into()),
            phone: Some("(01) 765-4321".into()),
            address: Some("Av. Arequipa 2450, Lince".into()),
            desired_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            products: vec![product(2, "450.50"), product(1, "99")],
            status: None,
        }
    }

    #[test]
    fn total_is_computed_from_products() {
        let v = validate_quotation(&new_quotation()).unwrap();
        assert_eq!(v.total, BigDecimal::from_str("1000.00").unwrap());
        assert_eq!(v.status, DEFAULT_QUOTATION_STATUS);
    }

    #[test]
    fn empty_product_list_gives_zero_total() {
        let mut q = new_quotation();
        q.products.clear();
        assert!(validate_quotation(&q).unwrap().total.is_zero());
    }

    #[test]
    fn collects_field_errors() {
        let q = NewQuotation {
            customer_name: Some("Ro".into()),
            email: Some("no-es-correo".into()),
            phone: Some("12-34".into()),
            address: None,
            desired_date: None,
            products: vec![],
            status: None,
        };
        match validate_quotation(&q) {
            Err(AppError::Validation(errs)) => {
                let fields: Vec<_> = errs.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["nombreCliente", "email", "telefono", "direccion", "fechaDeseada"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn phone_with_letters_is_rejected() {
        let mut q = new_quotation();
        q.phone = Some("987-654-ABC".into());
        match validate_quotation(&q) {
            Err(AppError::Validation(errs)) => assert_eq!(
                errs[0].message,
                "El teléfono debe contener solo números y caracteres permitidos"
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut q = new_quotation();
        q.customer_name = Some("   ".into());
        q.email = Some(" ".into());
        match validate_quotation(&q) {
            Err(AppError::Validation(errs)) => {
                assert_eq!(errs[0].message, "El nombre del cliente es obligatorio");
                assert_eq!(errs[1].message, "El email es obligatorio");
            }
            other => panic!("unexpected {:?}", other),
        }
        let mut q = new_quotation();
        q.customer_name = Some("  Rosa Quispe  ".into());
        assert_eq!(validate_quotation(&q).unwrap().customer_name, "Rosa Quispe");
    }

    #[test]
    fn negative_price_is_rejected() {
        let mut q = new_quotation();
        q.products = vec![product(1, "-10")];
        assert!(validate_quotation(&q).is_err());
    }

    #[test]
    fn stats_count_known_statuses() {
        let base = validate_quotation(&new_quotation()).unwrap();
        let make = |id: i64, status: &str| Quotation {
            id,
            customer_name: base.customer_name.clone(),
            email: base.email.clone(),
            phone: base.phone.clone(),
            address: base.address.clone(),
            desired_date: base.desired_date,
            products: Json(base.products.clone()),
            total: base.total.clone(),
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        };
        let list = vec![
            make(1, "Pendiente"),
            make(2, "Pendiente"),
            make(3, "Cerrada"),
            make(4, "En Proceso"),
            make(5, "Archivada"),
        ];
        let stats = QuotationStats::from_quotations(&list);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pendientes, 2);
        assert_eq!(stats.cerradas, 1);
        assert_eq!(stats.en_proceso, 1);
        assert_eq!(stats.contactadas, 0);
        assert!(list[2].is_closed());
        assert_eq!(list[0].product_count(), 3);
    }
}
