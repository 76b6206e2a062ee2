//! Field extraction: QR payloads and certificate text → [`RecordFields`].
//!
//! Two independent parsers share one canonicalization step:
//!
//! - [`FieldExtractor::parse_qr`] splits a `key: value` payload on the
//!   configured delimiters and renames keys through the alias table.
//! - [`FieldExtractor::parse_certificate_text`] runs the ordered matcher
//!   table against free text, one regex per target field.
//!
//! Failures local to one field (an unknown QR key, an unparseable date)
//! drop that field and parsing continues.

use crate::config::ScanConfig;
use crate::error::{ParseError, ScanError};
use crate::pipeline::dates::{fold_accents, normalize_date};
use crate::record::{Field, FieldValue, RecordFields};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One entry of the ordered text matcher table.
#[derive(Debug, Clone)]
struct FieldMatcher {
    field: Field,
    regex: Regex,
}

/// Stateless parser for QR payloads and certificate text.
///
/// Built once from a [`ScanConfig`] and shared freely between threads.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    key_marker: Regex,
    glued: Vec<Regex>,
    delimiter: char,
    trim_chars: Vec<char>,
    aliases: HashMap<String, Field>,
    matchers: Vec<FieldMatcher>,
}

impl FieldExtractor {
    /// Compile the alias and matcher tables from `config`.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let delims: String = config
            .qr_delimiters
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let sep = regex::escape(&config.qr_key_separator.to_string());

        // A key starts the payload or follows a delimiter or line break, and
        // runs up to the key separator.
        let key_marker = Regex::new(&format!(
            r"(?:^|[{delims}\r\n])\s*([\p{{L}}][\p{{L}}\p{{N}} _]*?)\s*{sep}"
        ))
        .map_err(|e| ScanError::InvalidConfig(format!("QR key pattern: {e}")))?;

        let glued = config
            .glued_keys
            .iter()
            .map(|key| {
                Regex::new(&format!(
                    r"(?i)([^{delims}\s])\s*({}\d*\s*{sep})",
                    regex::escape(key)
                ))
                .map_err(|e| ScanError::InvalidConfig(format!("glued key '{key}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let matchers = config
            .text_patterns
            .iter()
            .map(|(field, pattern)| {
                Regex::new(pattern)
                    .map(|regex| FieldMatcher {
                        field: *field,
                        regex,
                    })
                    .map_err(|e| ScanError::InvalidConfig(format!("pattern for {field}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut trim_chars = config.qr_delimiters.clone();
        trim_chars.extend([' ', '\r', '\n']);

        Ok(Self {
            key_marker,
            glued,
            delimiter: config.qr_delimiters[0],
            trim_chars,
            aliases: config.key_aliases.iter().cloned().collect(),
            matchers,
        })
    }

    /// Parse a QR payload into canonical fields.
    ///
    /// Pairs are split on the configured delimiters and on line breaks.
    /// Date-valued keys are normalized like certificate text; a date in an
    /// unrecognized format leaves that field absent instead of keeping the
    /// raw QR text.
    ///
    /// # Errors
    /// [`ParseError::MalformedPayload`] when no key maps to a known field.
    pub fn parse_qr(&self, payload: &str) -> Result<RecordFields, ParseError> {
        info!("Parsing QR payload ({} chars)", payload.chars().count());
        let text = self.unglue(payload.trim());

        let markers: Vec<(usize, usize, &str)> = self
            .key_marker
            .captures_iter(&text)
            .filter_map(|c| {
                let whole = c.get(0)?;
                Some((whole.start(), whole.end(), c.get(1)?.as_str()))
            })
            .collect();

        let mut fields = RecordFields::new();
        let mut recognized = 0usize;

        for (i, (_, value_start, raw_key)) in markers.iter().enumerate() {
            let value_end = markers.get(i + 1).map_or(text.len(), |m| m.0);
            let value = text[*value_start..value_end]
                .trim()
                .trim_matches(|c: char| self.trim_chars.contains(&c));

            let Some(field) = self.aliases.get(&normalize_key(raw_key)).copied() else {
                warn!("Dropping unrecognized QR key '{}'", raw_key.trim());
                continue;
            };
            recognized += 1;
            assign(&mut fields, field, value);
        }

        if recognized == 0 {
            warn!("QR payload has no recognizable keys");
            return Err(ParseError::MalformedPayload {
                len: payload.chars().count(),
            });
        }

        info!("QR parsed: {} field(s)", fields.len());
        debug!("QR fields: {:?}", fields);
        Ok(fields)
    }

    /// Parse the text layer of a certificate.
    ///
    /// Best-effort: every matcher that hits contributes a field.
    ///
    /// # Errors
    /// [`ParseError::MissingKeyFields`] when neither folio nor national
    /// identifier was found.
    pub fn parse_certificate_text(&self, text: &str) -> Result<RecordFields, ParseError> {
        info!("Parsing certificate text ({} chars)", text.chars().count());
        let mut fields = RecordFields::new();

        for matcher in &self.matchers {
            let Some(caps) = matcher.regex.captures(text) else {
                continue;
            };
            let value = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|g| g.as_str().trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            debug!("{} matched: {}", matcher.field, value);
            assign(&mut fields, matcher.field, &value);
        }

        if !fields.has_key_fields() {
            warn!("Certificate text has neither Folio nor CURP");
            return Err(ParseError::MissingKeyFields);
        }

        info!("Certificate text parsed: {} field(s)", fields.len());
        Ok(fields)
    }

    /// Re-insert the delimiter before keys that scanners glue onto the
    /// previous value, e.g. `...LOPEZCURP:` → `...LOPEZ,CURP:`.
    fn unglue(&self, payload: &str) -> String {
        let replacement = format!("${{1}}{}${{2}}", self.delimiter);
        self.glued.iter().fold(payload.to_string(), |acc, re| {
            re.replace_all(&acc, replacement.as_str()).into_owned()
        })
    }
}

/// Canonical form of a QR key for alias lookup: lowercase, whitespace
/// removed, Spanish accents folded.
pub fn normalize_key(raw: &str) -> String {
    fold_accents(&raw.to_lowercase())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Store `value` under `field`, normalizing dates and sex. A date that does
/// not parse leaves the field absent.
fn assign(fields: &mut RecordFields, field: Field, value: &str) {
    if field.is_date() {
        match normalize_date(value) {
            Ok(date) => fields.insert(field, FieldValue::Date(date)),
            Err(e) => warn!("{field}: {e}; field left empty"),
        }
    } else if field == Field::Sex {
        fields.insert_text(field, normalize_sex(value));
    } else {
        fields.insert_text(field, value);
    }
}

fn normalize_sex(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper.contains("HOMB") {
        "H".to_string()
    } else if upper.contains("MUJ") {
        "M".to_string()
    } else {
        upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn extractor() -> FieldExtractor {
        FieldExtractor::new(&ScanConfig::default()).unwrap()
    }

    const CERT_TEXT: &str = "\
ESTADOS UNIDOS MEXICANOS
ACTA DE NACIMIENTO
Identificador Electrónico 01290000123456
Clave Única de Registro de Población PELJ900315HTLRPN09
Entidad de Registro TLAXCALA
Municipio de Registro APIZACO
Oficialía 1
Fecha de Registro 02/04/1990
Libro 3
Número de Acta 00417
Datos de la Persona Registrada
Nombre(s): JUAN
Primer Apellido: PEREZ
Segundo Apellido: LOPEZ
Sexo: HOMBRE
Fecha de Nacimiento: 15/03/1990
";

    #[test]
    fn qr_keys_are_renamed() {
        let payload = "Registrado: JUAN PEREZ LOPEZ, CURP: PELJ900315HTLRPN09, \
                       Padre1: PEDRO PEREZ, Padre2: MARIA LOPEZ, Cadena: 0129000012345, \
                       Impreso en: TLAXCALA, Sexo: H";
        let f = extractor().parse_qr(payload).unwrap();
        assert_eq!(f.text(Field::Registrant).as_deref(), Some("JUAN PEREZ LOPEZ"));
        assert_eq!(f.text(Field::NationalId).as_deref(), Some("PELJ900315HTLRPN09"));
        assert_eq!(f.text(Field::Father).as_deref(), Some("PEDRO PEREZ"));
        assert_eq!(f.text(Field::Mother).as_deref(), Some("MARIA LOPEZ"));
        assert_eq!(f.text(Field::Folio).as_deref(), Some("0129000012345"));
        assert_eq!(f.text(Field::Office).as_deref(), Some("TLAXCALA"));
        assert_eq!(f.text(Field::Sex).as_deref(), Some("H"));
    }

    #[test]
    fn qr_unknown_keys_are_dropped() {
        let f = extractor()
            .parse_qr("Cadena: 123, Color: AZUL, Tomo: 2")
            .unwrap();
        assert_eq!(f.len(), 2);
        assert_eq!(f.text(Field::Volume).as_deref(), Some("2"));
    }

    #[test]
    fn qr_glued_keys_are_split() {
        let f = extractor()
            .parse_qr("Registrado: ANA RUIZCURP: RUXA900101MTLZNN01Padre1: LUIS RUIZ")
            .unwrap();
        assert_eq!(f.text(Field::Registrant).as_deref(), Some("ANA RUIZ"));
        assert_eq!(f.text(Field::NationalId).as_deref(), Some("RUXA900101MTLZNN01"));
        assert_eq!(f.text(Field::Father).as_deref(), Some("LUIS RUIZ"));
    }

    #[test]
    fn qr_line_breaks_separate_pairs() {
        let f = extractor()
            .parse_qr("Registrado: ANA RUIZ\nCURP: RUXA900101MTLZNN01\nCadena: 0129000012345")
            .unwrap();
        assert_eq!(f.text(Field::Registrant).as_deref(), Some("ANA RUIZ"));
        assert_eq!(f.text(Field::NationalId).as_deref(), Some("RUXA900101MTLZNN01"));
        assert_eq!(f.text(Field::Folio).as_deref(), Some("0129000012345"));

        let f = extractor()
            .parse_qr("Tomo: 1\r\nLibro: 2\r\nCadena: 0129000012345\r\n")
            .unwrap();
        assert_eq!(f.text(Field::Volume).as_deref(), Some("1"));
        assert_eq!(f.text(Field::Book).as_deref(), Some("2"));
        assert_eq!(f.text(Field::Folio).as_deref(), Some("0129000012345"));
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn qr_values_may_contain_delimiters_and_times() {
        let f = extractor()
            .parse_qr("Entidad: TLAXCALA, TLAX.; Cadena: 99; Municipio: HORA 10:30")
            .unwrap();
        assert_eq!(f.text(Field::State).as_deref(), Some("TLAXCALA, TLAX."));
        assert_eq!(f.text(Field::Municipality).as_deref(), Some("HORA 10:30"));
    }

    #[test]
    fn qr_dates_are_normalized_or_dropped() {
        let f = extractor()
            .parse_qr("Cadena: 1, FechaNacimiento: 15/03/1990, Fecha Impresión: 99/99/9999")
            .unwrap();
        assert_eq!(
            f.get(Field::BirthDate),
            Some(&FieldValue::Date(NaiveDate::from_ymd_opt(1990, 3, 15).unwrap()))
        );
        assert!(f.get(Field::RegistrationDate).is_none());
    }

    #[test]
    fn qr_without_known_keys_is_malformed() {
        let e = extractor().parse_qr("hello world").unwrap_err();
        assert_eq!(e, ParseError::MalformedPayload { len: 11 });
        assert!(extractor().parse_qr("").is_err());
        assert!(extractor().parse_qr("Color: AZUL").is_err());
    }

    #[test]
    fn certificate_text_yields_all_fields() {
        let f = extractor().parse_certificate_text(CERT_TEXT).unwrap();
        assert_eq!(f.text(Field::Folio).as_deref(), Some("01290000123456"));
        assert_eq!(f.text(Field::NationalId).as_deref(), Some("PELJ900315HTLRPN09"));
        assert_eq!(f.text(Field::State).as_deref(), Some("TLAXCALA"));
        assert_eq!(f.text(Field::Municipality).as_deref(), Some("APIZACO"));
        assert_eq!(f.text(Field::Office).as_deref(), Some("1"));
        assert_eq!(f.text(Field::Book).as_deref(), Some("3"));
        assert_eq!(f.text(Field::CertificateNumber).as_deref(), Some("00417"));
        assert_eq!(f.text(Field::Registrant).as_deref(), Some("JUAN PEREZ LOPEZ"));
        assert_eq!(f.text(Field::Sex).as_deref(), Some("H"));
        assert_eq!(f.text(Field::BirthDate).as_deref(), Some("1990-03-15"));
        assert_eq!(f.text(Field::RegistrationDate).as_deref(), Some("1990-04-02"));
    }

    #[test]
    fn certificate_text_bad_date_is_field_local() {
        let text = CERT_TEXT.replace("Fecha de Nacimiento: 15/03/1990", "Fecha de Nacimiento: 99/99/9999");
        let f = extractor().parse_certificate_text(&text).unwrap();
        assert!(f.get(Field::BirthDate).is_none());
        assert!(f.get(Field::Folio).is_some());
    }

    #[test]
    fn certificate_text_textual_date() {
        let text = CERT_TEXT.replace("15/03/1990", "15 de marzo de 1990");
        let f = extractor().parse_certificate_text(&text).unwrap();
        assert_eq!(f.text(Field::BirthDate).as_deref(), Some("1990-03-15"));
    }

    #[test]
    fn certificate_text_without_keys_fails() {
        let text = "Nombre(s): JUAN\nPrimer Apellido: PEREZ\nSegundo Apellido: LOPEZ\nSexo: HOMBRE\n";
        assert_eq!(
            extractor().parse_certificate_text(text),
            Err(ParseError::MissingKeyFields)
        );
    }

    #[test]
    fn keys_normalize() {
        assert_eq!(normalize_key("Impreso en"), "impresoen");
        assert_eq!(normalize_key("Fecha Impresión"), "fechaimpresion");
        assert_eq!(normalize_key(" CURP "), "curp");
    }
}
