//! Configuration for the scan pipeline.
//!
//! Everything tunable lives in [`ScanConfig`], built via
//! [`ScanConfigBuilder`]: the QR key alias table, the ordered text matcher
//! table, the page render scale, the store capacity and the upload limits.
//! The defaults reproduce the layout of Mexican civil-registry birth
//! certificates; callers digitizing another layout swap the two tables.

use crate::error::ScanError;
use crate::record::Field;

/// Default QR key aliases, keyed by the normalized key (lowercase, no
/// whitespace, accents folded).
pub const DEFAULT_KEY_ALIASES: &[(&str, Field)] = &[
    ("padre1", Field::Father),
    ("padre2", Field::Mother),
    ("padre", Field::Father),
    ("madre", Field::Mother),
    ("registrado", Field::Registrant),
    ("nombre", Field::Registrant),
    ("curp", Field::NationalId),
    ("tomo", Field::Volume),
    ("libro", Field::Book),
    ("foja", Field::Sheet),
    ("acta", Field::CertificateNumber),
    ("entidad", Field::State),
    ("municipio", Field::Municipality),
    ("fechanacimiento", Field::BirthDate),
    ("sexo", Field::Sex),
    ("fechaimpresion", Field::RegistrationDate),
    ("fecharegistro", Field::RegistrationDate),
    ("impresoen", Field::Office),
    ("oficial", Field::Office),
    ("cadena", Field::Folio),
    ("folio", Field::Folio),
];

/// Default text matchers, tried in this order against the concatenated
/// text layer. Every capture group of a match is trimmed and joined with a
/// single space.
pub const DEFAULT_TEXT_PATTERNS: &[(Field, &str)] = &[
    (
        Field::NationalId,
        r"Clave Única de Registro de Población\s*([A-Z0-9]{18})",
    ),
    (Field::Folio, r"Identificador Electrónico\s*(\d+)"),
    (Field::State, r"Entidad de Registro\s*([A-ZÁÉÍÓÚÜÑ ]+)"),
    (Field::Municipality, r"Municipio de Registro\s*([A-ZÁÉÍÓÚÜÑ ]+)"),
    (Field::Office, r"Oficialía\s*(\d+)"),
    (
        Field::RegistrationDate,
        r"Fecha de Registro\s*(\d{1,2}/\d{1,2}/\d{4}|\d{1,2} de [A-Za-záéíóú]+ de \d{4})",
    ),
    (Field::Book, r"Libro\s*(\d+)"),
    (Field::CertificateNumber, r"Número de Acta\s*(\d+)"),
    (
        Field::Registrant,
        r"Nombre\(s\):\s*([^\n]+)\s*Primer Apellido:\s*([^\n]+)\s*Segundo Apellido:\s*([^\n]+)",
    ),
    (Field::Sex, r"Sexo:\s*([^\n]+)"),
    (
        Field::BirthDate,
        r"Fecha de Nacimiento:\s*(\d{1,2}/\d{1,2}/\d{4}|\d{1,2} de [A-Za-záéíóú]+ de \d{4})",
    ),
];

/// Keys that hand scanners glue onto the previous value without a delimiter.
pub const DEFAULT_GLUED_KEYS: &[&str] = &["CURP", "Padre"];

/// Configuration for the scan pipeline.
///
/// # Example
/// ```rust
/// use acta_scan::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .render_scale(3.0)
///     .capacity(500)
///     .build()
///     .unwrap();
/// assert_eq!(config.capacity, 500);
/// ```
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Page render scale factor for the QR-per-page stage. Range: 0.5–8.0. Default: 2.0.
    ///
    /// Scale 1.0 renders at 72 DPI, where the modules of a printed QR are
    /// often only two pixels wide. Higher scales decode more reliably at the
    /// cost of render time and memory.
    pub render_scale: f32,

    /// Maximum number of records the store holds. Default: 10 000.
    pub capacity: usize,

    /// Accepted upload extensions, lowercase without the dot. Default: `["pdf"]`.
    pub accepted_extensions: Vec<String>,

    /// Maximum accepted document size in bytes. Default: 50 MiB.
    pub max_document_bytes: usize,

    /// Characters that separate key/value pairs inside a QR payload. Default: `,;|`.
    ///
    /// Line breaks always separate pairs as well.
    pub qr_delimiters: Vec<char>,

    /// Character separating a QR key from its value. Default: `:`.
    pub qr_key_separator: char,

    /// Keys that may appear glued to the previous value.
    pub glued_keys: Vec<String>,

    /// Normalized QR key → canonical field.
    pub key_aliases: Vec<(String, Field)>,

    /// Ordered (field, regex) matchers for certificate text.
    pub text_patterns: Vec<(Field, String)>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            render_scale: 2.0,
            capacity: 10_000,
            accepted_extensions: vec!["pdf".to_string()],
            max_document_bytes: 50 * 1024 * 1024,
            qr_delimiters: vec![',', ';', '|'],
            qr_key_separator: ':',
            glued_keys: DEFAULT_GLUED_KEYS.iter().map(|k| k.to_string()).collect(),
            key_aliases: DEFAULT_KEY_ALIASES
                .iter()
                .map(|(k, f)| (k.to_string(), *f))
                .collect(),
            text_patterns: DEFAULT_TEXT_PATTERNS
                .iter()
                .map(|(f, p)| (*f, p.to_string()))
                .collect(),
        }
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether `filename` carries one of the accepted extensions.
    pub fn accepts_filename(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => self.accepted_extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.5, 8.0);
        self
    }

    pub fn capacity(mut self, n: usize) -> Self {
        self.config.capacity = n;
        self
    }

    pub fn accepted_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.accepted_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn max_document_bytes(mut self, n: usize) -> Self {
        self.config.max_document_bytes = n;
        self
    }

    pub fn qr_delimiters(mut self, delimiters: impl IntoIterator<Item = char>) -> Self {
        self.config.qr_delimiters = delimiters.into_iter().collect();
        self
    }

    pub fn qr_key_separator(mut self, sep: char) -> Self {
        self.config.qr_key_separator = sep;
        self
    }

    pub fn glued_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.glued_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Add or replace one QR key alias. The key is normalized the same way
    /// payload keys are.
    pub fn key_alias(mut self, key: &str, field: Field) -> Self {
        let key = crate::pipeline::extract::normalize_key(key);
        self.config.key_aliases.retain(|(k, _)| *k != key);
        self.config.key_aliases.push((key, field));
        self
    }

    /// Replace the whole text matcher table.
    pub fn text_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = (Field, S)>,
        S: Into<String>,
    {
        self.config.text_patterns = patterns.into_iter().map(|(f, p)| (f, p.into())).collect();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        let c = &self.config;
        if c.capacity == 0 {
            return Err(ScanError::InvalidConfig("Capacity must be ≥ 1".into()));
        }
        if c.accepted_extensions.is_empty() {
            return Err(ScanError::InvalidConfig(
                "At least one accepted extension is required".into(),
            ));
        }
        if c.qr_delimiters.is_empty() {
            return Err(ScanError::InvalidConfig(
                "At least one QR delimiter is required".into(),
            ));
        }
        if matches!(c.qr_key_separator, '\r' | '\n') {
            return Err(ScanError::InvalidConfig(
                "QR key separator cannot be a line break".into(),
            ));
        }
        if c.qr_delimiters.contains(&c.qr_key_separator) {
            return Err(ScanError::InvalidConfig(format!(
                "QR key separator '{}' cannot also be a delimiter",
                c.qr_key_separator
            )));
        }
        for (field, pattern) in &c.text_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                ScanError::InvalidConfig(format!("Pattern for {field} does not compile: {e}"))
            })?;
        }
        Ok(self.config)
    }
}
