// src/sync/temporal.rs

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

// Normalizador temporal: só dois formatos de data cruzam a fronteira do
// storage: data-calendário e início-de-mês. Timestamps completos de
// createdAt/updatedAt não passam por aqui; atravessam como strings opacas
// ordenáveis.

/// Canonicaliza entrada livre em data-calendário. Aceita data exata
/// (`YYYY-MM-DD`), mês (`YYYY-MM`, dia vira 01) ou qualquer data/hora
/// parseável (truncada para a data, em UTC). `None` para o resto; o
/// chamador trata como erro 400, nunca assume um default silencioso.
pub fn to_calendar_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    // Mês sem dia: "2025-03" -> 2025-03-01
    if s.len() == 7 {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    None
}

/// Igual a `to_calendar_date`, normalizado para o primeiro dia do mês.
pub fn to_month_start(raw: &str) -> Option<NaiveDate> {
    to_calendar_date(raw).and_then(|d| d.with_day(1))
}

/// Parse leniente de timestamp para a comparação last-writer-wins do motor
/// de merge. `None` vira época zero lá, e item com timestamp sempre ganha de
/// item sem.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_start_from_full_date() {
        assert_eq!(
            to_month_start("2025-03-14"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn month_start_from_month_string() {
        assert_eq!(
            to_month_start("2025-03"),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn month_start_rejects_garbage() {
        assert_eq!(to_month_start("not-a-date"), None);
        assert_eq!(to_calendar_date(""), None);
        assert_eq!(to_calendar_date("14/03/2025"), None);
    }

    #[test]
    fn calendar_date_truncates_datetime_in_utc() {
        // 23:30 em -03:00 já é dia 15 em UTC
        assert_eq!(
            to_calendar_date("2025-03-14T23:30:00-03:00"),
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(
            to_calendar_date("2025-03-14T10:00:00"),
            NaiveDate::from_ymd_opt(2025, 3, 14)
        );
    }

    #[test]
    fn timestamp_parses_common_shapes() {
        assert!(parse_timestamp("2025-03-14T10:00:00.123Z").is_some());
        assert!(parse_timestamp("2025-03-14T10:00:00").is_some());
        assert!(parse_timestamp("2025-03-14").is_some());
        assert!(parse_timestamp("ontem").is_none());
    }
}
