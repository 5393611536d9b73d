//! Analytics API types.

use serde::{Deserialize, Serialize};
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Query string of `GET /analytics/dau`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DauQuery {
    /// UTC day to report; today when omitted.
    #[serde(default, with = "iso_date::option")]
    pub date: Option<Date>,
}

/// Response of `GET /analytics/dau`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DauResponse {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_dates_use_iso_format() {
        let body = DauResponse {
            date: date!(2026-03-01),
            count: 4,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"date":"2026-03-01","count":4}"#
        );

        let query: DauQuery = serde_json::from_str(r#"{"date":"2026-03-02"}"#).unwrap();
        assert_eq!(query.date, Some(date!(2026-03-02)));
        let query: DauQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.date, None);
    }
}
