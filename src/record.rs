//! Canonical record types shared by every pipeline stage and the store.
//!
//! A [`RecordFields`] is what the extractors produce: a sparse map from
//! [`Field`] to [`FieldValue`]. The store turns it into an immutable
//! [`Record`] by stamping a capture time and a [`Provenance`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical certificate fields, declared in export column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Volume,
    Book,
    Sheet,
    CertificateNumber,
    State,
    Municipality,
    NationalId,
    Registrant,
    Father,
    Mother,
    BirthDate,
    Sex,
    RegistrationDate,
    Office,
    Folio,
}

impl Field {
    /// All fields in export column order.
    pub const ALL: [Field; 15] = [
        Field::Volume,
        Field::Book,
        Field::Sheet,
        Field::CertificateNumber,
        Field::State,
        Field::Municipality,
        Field::NationalId,
        Field::Registrant,
        Field::Father,
        Field::Mother,
        Field::BirthDate,
        Field::Sex,
        Field::RegistrationDate,
        Field::Office,
        Field::Folio,
    ];

    /// Column header used by exporters.
    pub fn header(self) -> &'static str {
        match self {
            Field::Volume => "Tomo",
            Field::Book => "Libro",
            Field::Sheet => "Foja",
            Field::CertificateNumber => "Acta",
            Field::State => "Entidad",
            Field::Municipality => "Municipio",
            Field::NationalId => "CURP",
            Field::Registrant => "Registrado",
            Field::Father => "Padre",
            Field::Mother => "Madre",
            Field::BirthDate => "FechaNacimiento",
            Field::Sex => "Sexo",
            Field::RegistrationDate => "FechaRegistro",
            Field::Office => "Oficial",
            Field::Folio => "Folio",
        }
    }

    /// Whether values of this field are normalized to a calendar date.
    pub fn is_date(self) -> bool {
        matches!(self, Field::BirthDate | Field::RegistrationDate)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.header())
    }
}

/// A single extracted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Date(_) => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Which extraction path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Provenance {
    /// Raw text typed by a USB/keyboard-wedge QR scanner.
    #[serde(rename = "qr-scan")]
    QrScan,
    /// QR decoded from a camera frame or uploaded image.
    #[serde(rename = "qr-image")]
    QrImage,
    /// QR decoded from a rendered PDF page.
    #[serde(rename = "pdf-qr")]
    PdfQr,
    /// Fields parsed from the PDF text layer.
    #[serde(rename = "pdf-text")]
    PdfText,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::QrScan => "qr-scan",
            Provenance::QrImage => "qr-image",
            Provenance::PdfQr => "pdf-qr",
            Provenance::PdfText => "pdf-text",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse field map produced by the extractors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecordFields(BTreeMap<Field, FieldValue>);

impl RecordFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; blank text is treated as absent.
    pub fn insert(&mut self, field: Field, value: FieldValue) {
        if value.is_blank() {
            self.0.remove(&field);
        } else {
            self.0.insert(field, value);
        }
    }

    pub fn insert_text(&mut self, field: Field, value: impl Into<String>) {
        self.insert(field, FieldValue::Text(value.into()));
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    /// Text form of a field, dates rendered as `YYYY-MM-DD`.
    pub fn text(&self, field: Field) -> Option<String> {
        self.get(field).map(|v| v.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.0.iter().map(|(f, v)| (*f, v))
    }

    /// The deduplication keys present in this field set.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            folio: self.text(Field::Folio).map(|s| s.trim().to_string()),
            national_id: self
                .text(Field::NationalId)
                .map(|s| s.trim().to_uppercase()),
        }
    }

    /// At least one of folio / national identifier is present.
    pub fn has_key_fields(&self) -> bool {
        !self.dedup_key().is_empty()
    }
}

/// The (folio, national identifier) pair used to reject re-submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DedupKey {
    pub folio: Option<String>,
    pub national_id: Option<String>,
}

impl DedupKey {
    pub fn is_empty(&self) -> bool {
        self.folio.is_none() && self.national_id.is_none()
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.folio, &self.national_id) {
            (Some(folio), _) => write!(f, "Folio {folio}"),
            (None, Some(id)) => write!(f, "CURP {id}"),
            (None, None) => f.write_str("<no key>"),
        }
    }
}

/// An accepted, immutable certificate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    fields: RecordFields,
    #[serde(serialize_with = "serialize_timestamp")]
    captured_at: NaiveDateTime,
    provenance: Provenance,
}

impl Record {
    pub(crate) fn new(fields: RecordFields, provenance: Provenance, captured_at: NaiveDateTime) -> Self {
        Self {
            fields,
            captured_at,
            provenance,
        }
    }

    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn dedup_key(&self) -> DedupKey {
        self.fields.dedup_key()
    }

    /// Header → value pairs in export column order, absent fields as `""`.
    ///
    /// Ends with the capture timestamp (`FechaEscaneo`) and provenance
    /// (`Origen`) columns.
    pub fn to_row(&self) -> Vec<(&'static str, String)> {
        let mut row: Vec<(&'static str, String)> = Field::ALL
            .iter()
            .map(|f| (f.header(), self.fields.text(*f).unwrap_or_default()))
            .collect();
        row.push((
            "FechaEscaneo",
            self.captured_at.format(TIMESTAMP_FORMAT).to_string(),
        ));
        row.push(("Origen", self.provenance.to_string()));
        row
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.fields.text(Field::Registrant).unwrap_or_default();
        write!(f, "Record({name}, {})", self.dedup_key())
    }
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn serialize_timestamp<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordFields {
        let mut f = RecordFields::new();
        f.insert_text(Field::Folio, " 0012345 ");
        f.insert_text(Field::NationalId, "pelj900315htlrpn09");
        f.insert_text(Field::Registrant, "JUAN PEREZ LOPEZ");
        f.insert(
            Field::BirthDate,
            FieldValue::Date(NaiveDate::from_ymd_opt(1990, 3, 15).unwrap()),
        );
        f
    }

    #[test]
    fn blank_text_is_absent() {
        let mut f = RecordFields::new();
        f.insert_text(Field::Father, "   ");
        assert!(f.get(Field::Father).is_none());
        assert!(f.is_empty());
    }

    #[test]
    fn dedup_key_trims_and_uppercases() {
        let key = sample().dedup_key();
        assert_eq!(key.folio.as_deref(), Some("0012345"));
        assert_eq!(key.national_id.as_deref(), Some("PELJ900315HTLRPN09"));
        assert_eq!(key.to_string(), "Folio 0012345");
    }

    #[test]
    fn row_follows_column_order() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let record = Record::new(sample(), Provenance::PdfText, ts);
        let row = record.to_row();
        assert_eq!(row.len(), 17);
        assert_eq!(row[0], ("Tomo", String::new()));
        assert_eq!(row[10], ("FechaNacimiento", "1990-03-15".to_string()));
        assert_eq!(row[15], ("FechaEscaneo", "2025-01-02 03:04:05".to_string()));
        assert_eq!(row[16], ("Origen", "pdf-text".to_string()));
    }

    #[test]
    fn record_serializes_with_headers() {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let record = Record::new(sample(), Provenance::QrScan, ts);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fields"]["CURP"], "pelj900315htlrpn09");
        assert_eq!(json["fields"]["FechaNacimiento"], "1990-03-15");
        assert_eq!(json["provenance"], "qr-scan");
        assert_eq!(json["captured_at"], "2025-01-02 00:00:00");
    }
}
