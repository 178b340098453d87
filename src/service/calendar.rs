//! 日期区间工具 (统一按 UTC)

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

const MONTHS_ES: [&str; 12] = [
    "Enero", "Febrero", "Marzo", "Abril", "Mayo", "Junio", "Julio", "Agosto", "Septiembre",
    "Octubre", "Noviembre", "Diciembre",
];

const MONTHS_ES_SHORT: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// 西语月份全称, 月份从 1 开始
pub fn month_name(month: u32) -> &'static str {
    MONTHS_ES[(month.clamp(1, 12) - 1) as usize]
}

pub fn month_abbr(month: u32) -> &'static str {
    MONTHS_ES_SHORT[(month.clamp(1, 12) - 1) as usize]
}

/// `ene 2024`
pub fn month_year_label(d: NaiveDate) -> String {
    format!("{} {}", month_abbr(d.month()), d.year())
}

pub fn month_start(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

/// 月初日期加减整月
pub fn add_months(d: NaiveDate, delta: i32) -> NaiveDate {
    let index = d.year() * 12 + d.month0() as i32 + delta;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1).unwrap_or(d)
}

/// 最近 n 个月的月初, 从早到晚, 含当月
pub fn last_months(today: NaiveDate, n: u32) -> Vec<NaiveDate> {
    let current = month_start(today);
    (0..n as i32).rev().map(|i| add_months(current, -i)).collect()
}

/// 所在周的周一
pub fn week_start(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

/// 最近 n 周的周一, 从早到晚, 含本周
pub fn last_weeks(today: NaiveDate, n: u32) -> Vec<NaiveDate> {
    let current = week_start(today);
    (0..n as i64).rev().map(|i| current - Duration::weeks(i)).collect()
}

/// 某天 00:00 (UTC)
pub fn start_of_day(d: NaiveDate) -> DateTime<Utc> {
    d.and_time(NaiveTime::default()).and_utc()
}

/// 整月区间 [月初, 下月初)
pub fn month_range(month: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = month_start(month);
    (start_of_day(start), start_of_day(add_months(start, 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn months_wrap_across_years() {
        assert_eq!(add_months(date(2024, 2, 1), -3), date(2023, 11, 1));
        assert_eq!(add_months(date(2024, 12, 1), 1), date(2025, 1, 1));
        assert_eq!(
            last_months(date(2024, 3, 15), 6),
            vec![
                date(2023, 10, 1),
                date(2023, 11, 1),
                date(2023, 12, 1),
                date(2024, 1, 1),
                date(2024, 2, 1),
                date(2024, 3, 1),
            ]
        );
    }

    #[test]
    fn spanish_labels() {
        assert_eq!(month_year_label(date(2024, 1, 9)), "ene 2024");
        assert_eq!(month_name(9), "Septiembre");
        assert_eq!(month_abbr(12), "dic");
    }

    #[test]
    fn weeks_start_on_monday() {
        // 2024-05-16 是周四
        assert_eq!(week_start(date(2024, 5, 16)), date(2024, 5, 13));
        assert_eq!(week_start(date(2024, 5, 13)), date(2024, 5, 13));
        assert_eq!(
            last_weeks(date(2024, 5, 16), 4),
            vec![date(2024, 4, 22), date(2024, 4, 29), date(2024, 5, 6), date(2024, 5, 13)]
        );
    }

    #[test]
    fn month_range_is_half_open() {
        let (from, to) = month_range(date(2024, 2, 20));
        assert_eq!(from.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }
}
