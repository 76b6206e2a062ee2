//! Date normalization for certificate fields.
//!
//! Certificates print dates either numerically (`15/03/1990`) or in words
//! (`15 de marzo de 1990`); QR payloads sometimes carry ISO dates. All three
//! normalize to a [`NaiveDate`]. Anything else, including numerically
//! well-formed but impossible dates such as `31/02/2000`, is an
//! [`ParseError::InvalidDate`].

use crate::error::ParseError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\s*[/.-]\s*(\d{1,2})\s*[/.-]\s*(\d{4})$").unwrap());

static RE_ISO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

static RE_TEXTUAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\s+(?:de\s+)?([a-záéíóú]+)\s+(?:de(?:l)?\s+)?(\d{4})$").unwrap()
});

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Normalize a date-like string to a calendar date.
///
/// Accepted forms: `DD/MM/YYYY` (also `-` or `.` separated), `YYYY-MM-DD`,
/// and `D de <mes> de YYYY` with Spanish month names (`setiembre` and
/// three-letter abbreviations included).
pub fn normalize_date(raw: &str) -> Result<NaiveDate, ParseError> {
    let s = raw.trim();
    let invalid = || ParseError::InvalidDate(s.to_string());

    let (y, m, d) = if let Some(c) = RE_ISO.captures(s) {
        (num(&c[1]), num(&c[2]), num(&c[3]))
    } else if let Some(c) = RE_NUMERIC.captures(s) {
        (num(&c[3]), num(&c[2]), num(&c[1]))
    } else if let Some(c) = RE_TEXTUAL.captures(s) {
        let month = month_number(&c[2]).ok_or_else(invalid)?;
        (num(&c[3]), month, num(&c[1]))
    } else {
        return Err(invalid());
    };

    NaiveDate::from_ymd_opt(y as i32, m, d).ok_or_else(invalid)
}

fn num(s: &str) -> u32 {
    // Captures are at most four ASCII digits.
    s.parse().unwrap_or(0)
}

fn month_number(name: &str) -> Option<u32> {
    let name = fold_accents(&name.to_lowercase());
    let name = if name == "setiembre" { "septiembre".to_string() } else { name };
    MONTHS
        .iter()
        .position(|m| *m == name || (name.len() == 3 && m.starts_with(&name)))
        .map(|i| i as u32 + 1)
}

pub(crate) fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            other => other,
        })
        .collect()
}
