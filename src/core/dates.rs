use chrono::NaiveDate;

const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), ISO_DATE_FORMAT).ok()
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// The current local calendar date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Long-form rendering for display, e.g. "Monday, 1 January 2024".
pub fn human_date(date: NaiveDate) -> String {
    date.format("%A, %-d %B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_date() {
        assert_eq!(
            parse_iso("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        assert_eq!(
            parse_iso("  2024-06-01 "),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_iso("not-a-date"), None);
        assert_eq!(parse_iso("2024-13-01"), None);
        assert_eq!(parse_iso(""), None);
    }

    #[test]
    fn iso_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(to_iso(date), "2024-01-09");
        assert_eq!(parse_iso(&to_iso(date)), Some(date));
    }

    #[test]
    fn human_date_long_form() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(human_date(date), "Monday, 1 January 2024");
    }
}
