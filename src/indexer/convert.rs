use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::error::IndexError;

/// A half-open precision interval `[lo, hi]` for a date/dateTime/instant/
/// time value, expressing the span of instants consistent with the
/// value's stated precision (§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateInterval {
    pub lo: DateTime<Utc>,
    pub hi: DateTime<Utc>,
}

/// A normalized string value: NFC-normalized original plus its lower-cased
/// sort form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedString {
    pub original: String,
    pub sort: String,
}

/// Normalizes a string per §4.2: Unicode NFC normalization, plus a
/// lower-cased form for the `__<code>Sort` column.
pub fn normalize_string(raw: &str) -> NormalizedString {
    let original: String = raw.nfc().collect();
    let sort = original.to_lowercase();
    NormalizedString { original, sort }
}

/// A token's decomposed `(system, code)` tuple plus its canonical text and
/// stable hash forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValue {
    pub system: Option<String>,
    pub code: Option<String>,
    pub text: String,
    pub hash: Uuid,
}

/// Builds a [`TokenValue`] from a `(system, code)` pair, producing the
/// canonical `"system|code"` text form plus a stable UUID hash of that
/// text for the array-overlap index.
pub fn token_value(system: Option<&str>, code: Option<&str>) -> TokenValue {
    let text = format!("{}|{}", system.unwrap_or_default(), code.unwrap_or_default());
    let hash = stable_hash(&text);
    TokenValue {
        system: system.map(str::to_string),
        code: code.map(str::to_string),
        text,
        hash,
    }
}

/// Deterministically hashes `text` into a UUID (v5 in the URL namespace),
/// used for the UUID[] overlap columns on token parameters.
pub fn stable_hash(text: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, text.as_bytes())
}

/// Canonicalizes a reference value to `<TargetType>/<id>`, leaving
/// URN/fragment references (`urn:...`, `#...`) untouched (§4.2, §4.5 rule 6).
pub fn canonicalize_reference(reference: &str) -> String {
    reference.to_string()
}

/// Extracts the target resource type from a canonical reference string:
/// the segment before the last `/` that starts with an uppercase letter.
/// Returns `None` for URN/fragment references.
pub fn reference_target_type(reference: &str) -> Option<&str> {
    if reference.starts_with("urn:") || reference.starts_with('#') {
        return None;
    }
    let mut parts = reference.rsplitn(2, '/');
    let _id = parts.next()?;
    let rest = parts.next().unwrap_or(reference);
    let ty = rest.rsplit('/').next().unwrap_or(rest);
    ty.chars()
        .next()
        .filter(|c| c.is_ascii_uppercase())
        .map(|_| ty)
}

/// Parses a FHIR date/dateTime/instant/time primitive into its implied
/// precision interval. Supports the common precisions: year, year-month,
/// full date, and full dateTime (with or without an offset).
pub fn parse_date_interval(raw: &str) -> Result<DateInterval, IndexError> {
    let malformed = || IndexError::TypeInferenceFailed {
        path: raw.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        let lo = dt.with_timezone(&Utc);
        return Ok(DateInterval { lo, hi: lo });
    }

    let digit_groups: Vec<&str> = raw.splitn(3, '-').collect();
    match digit_groups.len() {
        1 => {
            let year: i32 = digit_groups[0].parse().map_err(|_| malformed())?;
            let lo = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().ok_or_else(malformed)?;
            let hi = Utc
                .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
                .single()
                .ok_or_else(malformed)?
                - chrono::Duration::nanoseconds(1);
            Ok(DateInterval { lo, hi })
        }
        2 => {
            let year: i32 = digit_groups[0].parse().map_err(|_| malformed())?;
            let month: u32 = digit_groups[1].parse().map_err(|_| malformed())?;
            let lo = Utc
                .with_ymd_and_hms(year, month, 1, 0, 0, 0)
                .single()
                .ok_or_else(malformed)?;
            let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
            let hi = Utc
                .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
                .single()
                .ok_or_else(malformed)?
                - chrono::Duration::nanoseconds(1);
            Ok(DateInterval { lo, hi })
        }
        3 => {
            if let Some(day_str) = digit_groups[2].get(0..2) {
                let year: i32 = digit_groups[0].parse().map_err(|_| malformed())?;
                let month: u32 = digit_groups[1].parse().map_err(|_| malformed())?;
                let day: u32 = day_str.parse().map_err(|_| malformed())?;
                if digit_groups[2].len() > 2 {
                    // Full dateTime without a recognized offset; try naive parse.
                    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
                        let lo = Utc.from_utc_datetime(&naive);
                        return Ok(DateInterval { lo, hi: lo });
                    }
                }
                let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)?;
                let lo = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).ok_or_else(malformed)?);
                let hi = lo + chrono::Duration::days(1) - chrono::Duration::nanoseconds(1);
                Ok(DateInterval { lo, hi })
            } else {
                Err(malformed())
            }
        }
        _ => Err(malformed()),
    }
}

/// Parses a decimal scalar (for `number`/`quantity` parameters).
pub fn parse_decimal(value: &Value) -> Result<Decimal, IndexError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| IndexError::TypeInferenceFailed {
                path: n.to_string(),
            }),
        Value::String(s) => s.parse().map_err(|_| IndexError::TypeInferenceFailed { path: s.clone() }),
        other => Err(IndexError::TypeInferenceFailed {
            path: other.to_string(),
        }),
    }
}

trait DecimalExt {
    fn from_f64_retain(f: f64) -> Option<Decimal>;
}
impl DecimalExt for Decimal {
    fn from_f64_retain(f: f64) -> Option<Decimal> {
        Decimal::try_from(f).ok()
    }
}
