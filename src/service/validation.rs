use crate::error::{AppError, FieldError};
use regex::Regex;
use std::sync::LazyLock;
use validator::Validate;

/// 销售单邮箱规则
static SALE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").expect("sale email pattern"));

/// 报价单电话允许的字符: 数字 `-` `+` 空格 括号
pub static CONTACT_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-() ]+$").expect("contact phone pattern"));

/// 去掉首尾空白后非空才算有值
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 表单规整: 去首尾空白, 空串视为未填
pub fn trimmed(value: &Option<String>) -> Option<String> {
    non_blank(value.as_deref()).map(str::to_string)
}

/// 按字符计数 (含重音字母)
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// 销售单电话: 恰好 9 位数字
pub fn is_nine_digit_phone(s: &str) -> bool {
    s.len() == 9 && s.bytes().all(|b| b.is_ascii_digit())
}

/// 销售单邮箱规则 `^[A-Za-z0-9+_.-]+@(.+)$`
pub fn is_sale_email(s: &str) -> bool {
    SALE_EMAIL.is_match(s)
}

/// 派生了 `Validate` 的表单: 结构体字段名 -> 对外字段名, 按错误输出顺序排列
///
/// 只靠手写规则校验的字段也列在这里, 用于排序
pub trait FormFields {
    const FIELDS: &'static [(&'static str, &'static str)];
}

/// 运行 validator, 每个字段取第一条消息
pub fn form_errors<T: Validate + FormFields>(form: &T) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Err(report) = form.validate() {
        let by_field = report.field_errors();
        for &(name, wire) in T::FIELDS {
            if let Some(first) = by_field.get(name).and_then(|list| list.first()) {
                let message = first
                    .message
                    .as_deref()
                    .map_or_else(|| format!("{} no es válido", wire), str::to_string);
                errors.add(wire, message);
            }
        }
    }
    errors
}

/// 收集字段错误, 最后一次性返回
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        // 同一字段只保留第一条
        if !self.errors.iter().any(|e| e.field == field) {
            self.errors.push(FieldError::new(field, message));
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }

    /// 按表单字段顺序输出, 未登记的字段排在最后
    pub fn finish_for<T: FormFields>(mut self) -> Result<(), AppError> {
        self.errors.sort_by_key(|e| {
            T::FIELDS
                .iter()
                .position(|&(_, wire)| wire == e.field)
                .unwrap_or(usize::MAX)
        });
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_digit_phone() {
        assert!(is_nine_digit_phone("987654321"));
        assert!(!is_nine_digit_phone("98765432"));
        assert!(!is_nine_digit_phone("98765432a"));
        assert!(!is_nine_digit_phone("+51987654"));
    }

    #[test]
    fn sale_email_is_permissive_after_at() {
        assert!(is_sale_email("ana.p+test@correo"));
        assert!(!is_sale_email("ana perez@correo.pe"));
        assert!(!is_sale_email("@correo.pe"));
    }

    #[test]
    fn contact_phone_charset() {
        assert!(CONTACT_PHONE.is_match("(01) 234-5678"));
        assert!(CONTACT_PHONE.is_match("+51 987 654 321"));
        assert!(!CONTACT_PHONE.is_match("01-234-5678 ext 2"));
    }

    #[test]
    fn trimmed_drops_blank() {
        assert_eq!(trimmed(&Some("  Ana  ".into())).as_deref(), Some("Ana"));
        assert_eq!(trimmed(&Some("   ".into())), None);
        assert_eq!(trimmed(&None), None);
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(
            required(message = "El nombre es obligatorio"),
            length(min = 3, max = 10, message = "Entre 3 y 10")
        )]
        name: Option<String>,
        #[validate(email(message = "Email inválido"))]
        email: Option<String>,
        #[validate(range(min = 0, message = "No negativo"))]
        stock: Option<i32>,
    }

    impl FormFields for Sample {
        const FIELDS: &'static [(&'static str, &'static str)] =
            &[("name", "nombre"), ("price", "precio"), ("email", "correo"), ("stock", "stock")];
    }

    #[test]
    fn validator_report_maps_to_wire_fields_in_order() {
        let form = Sample {
            name: Some("Al".into()),
            email: Some("sin-arroba".into()),
            stock: Some(-1),
        };
        let mut errs = form_errors(&form);
        errs.add("precio", "El precio es obligatorio");
        match errs.finish_for::<Sample>() {
            Err(AppError::Validation(list)) => assert_eq!(
                list,
                vec![
                    FieldError::new("nombre", "Entre 3 y 10"),
                    FieldError::new("precio", "El precio es obligatorio"),
                    FieldError::new("correo", "Email inválido"),
                    FieldError::new("stock", "No negativo"),
                ]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn absent_optional_fields_only_fail_required() {
        let form = Sample { name: None, email: None, stock: None };
        let errs = form_errors(&form);
        assert!(errs.has("nombre"));
        assert!(!errs.has("correo"));
        assert!(!errs.has("stock"));
        assert!(form_errors(&Sample { name: Some("Ana".into()), email: None, stock: Some(0) }).is_empty());
    }
}
