use crate::db::products;
use crate::error::{AppError, AppResult};
use crate::models::{Product, ProductForm, ProductImages, ProductInput, ProductStatus};
use crate::service::validation::{form_errors, non_blank};
use bigdecimal::{BigDecimal, Zero};
use sqlx::PgPool;
use tracing::info;

/// 表单校验, 通过后得到可写库的数据
pub fn validate_product(form: &ProductForm) -> AppResult<ProductInput> {
    let form = form.normalized();
    let mut errors = form_errors(&form);

    match &form.price {
        None => errors.add("precio", "El precio es obligatorio"),
        Some(p) if *p <= BigDecimal::zero() => errors.add("precio", "El precio debe ser mayor a 0"),
        _ => {}
    }
    let status = match form.status.as_deref() {
        None => ProductStatus::default(),
        Some(s) => s.parse().unwrap_or_else(|_| {
            errors.add("estado", "Estado no válido");
            ProductStatus::default()
        }),
    };

    errors.finish_for::<ProductForm>()?;

    Ok(ProductInput {
        name: form.name.unwrap_or_default(),
        category: form.category.unwrap_or_default(),
        price: form.price.unwrap_or_default(),
        stock: form.stock.unwrap_or(0),
        status,
        code: form.code,
        description: form.description,
        main_image: form.main_image,
        material: form.material,
        dimensions: form.dimensions,
        weight: form.weight,
        firmness: form.firmness,
        warranty: form.warranty,
        features: form.features,
        tech_image_1: form.tech_image_1,
        tech_image_2: form.tech_image_2,
    })
}

/// 空串视为不过滤
fn filter_value(v: Option<&str>) -> Option<&str> {
    non_blank(v)
}

/// 商品服务
pub struct ProductService {
    pool: PgPool,
}

impl ProductService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Product>> {
        Ok(products::list_products(&self.pool).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Product> {
        products::get_product(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Producto no encontrado".to_string()))
    }

    pub async fn create(&self, form: &ProductForm) -> AppResult<i64> {
        let input = validate_product(form)?;
        let id = products::insert_product(&self.pool, &input).await?;
        info!("Producto {} creado: {}", id, input.name);
        Ok(id)
    }

    pub async fn update(&self, id: i64, form: &ProductForm) -> AppResult<()> {
        let input = validate_product(form)?;
        if products::update_product(&self.pool, id, &input).await? == 0 {
            return Err(AppError::NotFound("Producto no encontrado".to_string()));
        }
        info!("Producto {} actualizado", id);
        Ok(())
    }

    /// 软删除: 只把状态改为停售, 历史销售仍可引用
    pub async fn discontinue(&self, id: i64) -> AppResult<()> {
        if products::set_product_status(&self.pool, id, ProductStatus::Discontinued).await? == 0 {
            return Err(AppError::NotFound("Producto no encontrado".to_string()));
        }
        info!("Producto {} marcado como Descontinuado", id);
        Ok(())
    }

    /// 关键字为空时返回全部
    pub async fn search(&self, term: Option<&str>) -> AppResult<Vec<Product>> {
        match filter_value(term) {
            Some(t) => Ok(products::search_products(&self.pool, t).await?),
            None => self.list().await,
        }
    }

    pub async fn filter(
        &self,
        term: Option<&str>,
        category: Option<&str>,
        status: Option<&str>,
    ) -> AppResult<Vec<Product>> {
        let status = match filter_value(status) {
            Some(s) => Some(
                s.parse::<ProductStatus>()
                    .map_err(|_| AppError::BadRequest(format!("Estado no válido: {}", s)))?,
            ),
            None => None,
        };
        Ok(products::filter_products(
            &self.pool,
            filter_value(term),
            filter_value(category),
            status,
        )
        .await?)
    }

    pub async fn by_price(&self, min: Option<BigDecimal>, max: Option<BigDecimal>) -> AppResult<Vec<Product>> {
        let min = min.unwrap_or_else(BigDecimal::zero);
        let max = max.unwrap_or_else(|| BigDecimal::from(i64::MAX));
        if min > max {
            return Err(AppError::BadRequest(
                "El precio mínimo no puede ser mayor al máximo".to_string(),
            ));
        }
        Ok(products::products_by_price(&self.pool, &min, &max).await?)
    }

    pub async fn available(&self) -> AppResult<Vec<Product>> {
        Ok(products::available_products(&self.pool).await?)
    }

    pub async fn categories(&self) -> AppResult<Vec<String>> {
        Ok(products::list_categories(&self.pool).await?)
    }

    pub fn statuses(&self) -> Vec<&'static str> {
        ProductStatus::ALL.iter().map(|s| s.as_str()).collect()
    }

    pub async fn images(&self, id: i64) -> AppResult<ProductImages> {
        products::get_product_images(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Producto no encontrado".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use std::str::FromStr;

    fn form() -> ProductForm {
        ProductForm {
            name: Some("Colchón Paraíso 2 plazas".into()),
            category: Some("Colchones".into()),
            price: Some(BigDecimal::from_str("1299.90").unwrap()),
            stock: Some(8),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_status_and_trims_optional_text() {
        let mut f = form();
        f.material = Some("   ".into());
        f.warranty = Some(" 10 años ".into());
        let input = validate_product(&f).unwrap();
        assert_eq!(input.status, ProductStatus::Available);
        assert_eq!(input.material, None);
        assert_eq!(input.warranty.as_deref(), Some("10 años"));
        assert_eq!(input.main_image, None);
    }

    #[test]
    fn reports_every_invalid_field() {
        let f = ProductForm {
            price: Some(BigDecimal::zero()),
            stock: Some(-1),
            status: Some("Vendido".into()),
            ..Default::default()
        };
        match validate_product(&f) {
            Err(AppError::Validation(errs)) => {
                let fields: Vec<_> = errs.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["nombre", "categoria", "precio", "stock", "estado"]);
                assert!(errs.contains(&FieldError::new("precio", "El precio debe ser mayor a 0")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn derived_rules_carry_spanish_messages() {
        let mut f = form();
        f.name = Some("x".repeat(201));
        f.category = Some("   ".into());
        match validate_product(&f) {
            Err(AppError::Validation(errs)) => assert_eq!(
                errs,
                vec![
                    FieldError::new("nombre", "El nombre no puede exceder 200 caracteres"),
                    FieldError::new("categoria", "La categoría es obligatoria"),
                ]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn accepts_explicit_status() {
        let mut f = form();
        f.status = Some("Agotado".into());
        assert_eq!(validate_product(&f).unwrap().status, ProductStatus::OutOfStock);
    }

    #[test]
    fn missing_stock_means_zero() {
        let mut f = form();
        f.stock = None;
        assert_eq!(validate_product(&f).unwrap().stock, 0);
    }
}
