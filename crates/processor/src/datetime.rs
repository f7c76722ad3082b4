use chrono::{DateTime, NaiveDate, Utc};

/// Parses OParl's ISO-8601 timestamps. Empty or malformed input returns
/// `None` rather than propagating an error — a single unparsable date must
/// never abort processing of the entity that carries it.
///
/// - `Z` suffix is normalized to `+00:00`.
/// - Date-only strings (`2024-01-15`) are treated as midnight UTC.
/// - Anything else is parsed with `DateTime::parse_from_rfc3339`.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if !raw.contains('T') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
    }

    let normalized = if raw.ends_with('Z') {
        format!("{}+00:00", &raw[..raw.len() - 1])
    } else {
        raw.to_string()
    };

    DateTime::parse_from_rfc3339(&normalized)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_none() {
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_datetime("garbage"), None);
    }

    #[test]
    fn date_only_is_midnight_utc() {
        let parsed = parse_datetime("2024-01-15").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn z_suffix_matches_explicit_offset() {
        let a = parse_datetime("2024-01-15T10:30:00Z").unwrap();
        let b = parse_datetime("2024-01-15T10:30:00+00:00").unwrap();
        assert_eq!(a, b);
    }
}
