//! 展示层辅助函数: 金额/日期格式化, 状态徽章, 报价单列表统计与过滤

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

/// JSON 数字或数字字符串
pub fn decimal_value(v: &Value) -> Option<BigDecimal> {
    match v {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

pub fn integer_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn two_decimals(amount: &BigDecimal) -> String {
    amount.round(2).with_scale(2).to_string()
}

/// `S/ 1234.50`
pub fn format_money(amount: &BigDecimal) -> String {
    format!("S/ {}", two_decimals(amount))
}

/// `S/ 1,234.50`, 用于 PDF
pub fn format_money_grouped(amount: &BigDecimal) -> String {
    let plain = two_decimals(amount);
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("S/ {sign}{grouped}.{frac}")
}

/// ISO 日期时间 -> `dd/MM/yyyy`
pub fn format_date(input: &str) -> Option<String> {
    let s = input.trim();
    let date = DateTime::parse_from_rfc3339(s)
        .map(|d| d.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|d| d.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").map(|d| d.date()))
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()?;
    Some(date.format("%d/%m/%Y").to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub class: &'static str,
    pub texto: String,
}

/// 报价单状态对应的徽章样式, 未知状态用灰色
pub fn status_badge(status: &str) -> Badge {
    let class = match status {
        "Pendiente" => "badge-warning",
        "En Proceso" => "badge-info",
        "Contactado" => "badge-primary",
        "Cerrada" => "badge-success",
        _ => "badge-secondary",
    };
    Badge {
        class,
        texto: status.to_string(),
    }
}

fn field<'a>(q: &'a Value, key: &str) -> Option<&'a str> {
    q.get(key).and_then(Value::as_str)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStats {
    pub total: usize,
    pub pendientes: usize,
    pub en_proceso: usize,
    pub contactadas: usize,
    pub cerradas: usize,
}

/// 前端传来的报价单列表 (任意 JSON 对象) 的状态统计
pub fn list_stats(quotations: &[Value]) -> ListStats {
    let count = |st: &str| quotations.iter().filter(|q| field(q, "estado") == Some(st)).count();
    ListStats {
        total: quotations.len(),
        pendientes: count("Pendiente"),
        en_proceso: count("En Proceso"),
        contactadas: count("Contactado"),
        cerradas: count("Cerrada"),
    }
}

/// 按状态精确匹配, 按客户名/邮箱模糊匹配 (不区分大小写)
pub fn filter_list(quotations: Vec<Value>, term: Option<&str>, status: Option<&str>) -> Vec<Value> {
    let term = term.unwrap_or_default().to_lowercase();
    let status = status.unwrap_or_default();
    quotations
        .into_iter()
        .filter(|q| status.is_empty() || field(q, "estado") == Some(status))
        .filter(|q| {
            term.is_empty()
                || ["nombreCliente", "email"].iter().any(|k| {
                    field(q, k).is_some_and(|v| v.to_lowercase().contains(&term))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn money_formats() {
        assert_eq!(format_money(&dec("1234.5")), "S/ 1234.50");
        assert_eq!(format_money(&dec("0")), "S/ 0.00");
        assert_eq!(format_money_grouped(&dec("1234567.891")), "S/ 1,234,567.89");
        assert_eq!(format_money_grouped(&dec("999")), "S/ 999.00");
        assert_eq!(format_money_grouped(&dec("-1500")), "S/ -1,500.00");
    }

    #[test]
    fn numbers_from_json() {
        assert_eq!(decimal_value(&json!("12.5")), Some(dec("12.5")));
        assert_eq!(decimal_value(&json!(3)), Some(dec("3")));
        assert_eq!(decimal_value(&json!(null)), None);
        assert_eq!(integer_value(&json!(" 4 ")), Some(4));
        assert_eq!(integer_value(&json!(2.5)), None);
    }

    #[test]
    fn dates_from_several_iso_shapes() {
        assert_eq!(format_date("2024-05-16T10:30:00").as_deref(), Some("16/05/2024"));
        assert_eq!(format_date("2024-05-16T10:30:00.123").as_deref(), Some("16/05/2024"));
        assert_eq!(format_date("2024-05-16T10:30:00Z").as_deref(), Some("16/05/2024"));
        assert_eq!(format_date("2024-05-16").as_deref(), Some("16/05/2024"));
        assert_eq!(format_date("16/05/2024"), None);
    }

    #[test]
    fn badges() {
        assert_eq!(status_badge("Cerrada").class, "badge-success");
        let unknown = status_badge("Archivada");
        assert_eq!(unknown.class, "badge-secondary");
        assert_eq!(unknown.texto, "Archivada");
    }

    #[test]
    fn stats_and_filter_over_raw_json() {
        let list = vec![
            json!({"nombreCliente": "Rosa Quispe", "email": "rosa@correo.pe", "estado": "Pendiente"}),
            json!({"nombreCliente": "Jorge Ramos", "email": "jramos@correo.pe", "estado": "Cerrada"}),
            json!({"nombreCliente": "Ana Rosales", "email": "ana@correo.pe", "estado": "Pendiente"}),
        ];
        let stats = list_stats(&list);
        assert_eq!((stats.total, stats.pendientes, stats.cerradas), (3, 2, 1));

        let found = filter_list(list.clone(), Some("ROS"), None);
        assert_eq!(found.len(), 2);
        let found = filter_list(list.clone(), Some("ros"), Some("Pendiente"));
        assert_eq!(found.len(), 2);
        let found = filter_list(list, Some("jramos"), Some("Pendiente"));
        assert!(found.is_empty());
    }
}
