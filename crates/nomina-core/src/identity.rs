//! # Mexican Personal Identifiers
//!
//! [`Rfc`] and [`Curp`] validate their format at construction time and are
//! stored in canonical uppercase form. Deserialization goes through the same
//! validation, so an invalid identifier cannot enter the system via JSON.
//!
//! - RFC: Registro Federal de Contribuyentes, issued by the SAT. Individuals
//!   carry 13 characters (4 letters), legal persons 12 (3 letters).
//! - CURP: Clave Única de Registro de Población, issued by RENAPO, 18 characters.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn is_name_letter(c: char) -> bool {
    c.is_ascii_uppercase() || c == 'Ñ' || c == '&'
}

/// Taxpayer identifier (RFC).
///
/// # Validation
///
/// - 12 or 13 characters after trimming
/// - 3 (legal person) or 4 (individual) leading letters, `Ñ` and `&` allowed
/// - 6 digits (date of birth or incorporation, `YYMMDD`)
/// - 3 alphanumeric homoclave characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rfc(String);

impl Rfc {
    /// Create an RFC, validating format and normalizing to uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidRfc`] if the format is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let upper = raw.trim().to_uppercase();
        let chars: Vec<char> = upper.chars().collect();

        let prefix_len = match chars.len() {
            12 => 3,
            13 => 4,
            _ => return Err(ValidationError::InvalidRfc(raw)),
        };
        let (prefix, rest) = chars.split_at(prefix_len);
        let (date, homoclave) = rest.split_at(6);

        let valid = prefix.iter().all(|c| is_name_letter(*c))
            && date.iter().all(|c| c.is_ascii_digit())
            && homoclave
                .iter()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(ValidationError::InvalidRfc(raw));
        }
        Ok(Self(upper))
    }

    /// Access the RFC string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the RFC belongs to a legal person (12 characters).
    pub fn is_legal_person(&self) -> bool {
        self.0.chars().count() == 12
    }
}

impl TryFrom<String> for Rfc {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rfc> for String {
    fn from(value: Rfc) -> Self {
        value.0
    }
}

impl std::fmt::Display for Rfc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Population registry identifier (CURP).
///
/// # Validation
///
/// - exactly 18 characters after trimming
/// - 4 letters, 6 digits (`YYMMDD`)
/// - sex marker `H`, `M` or `X`
/// - 2-letter state code and 3 internal consonants
/// - 1 alphanumeric disambiguator and 1 check digit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Curp(String);

impl Curp {
    /// Create a CURP, validating format and normalizing to uppercase.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCurp`] if the format is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let upper = raw.trim().to_uppercase();
        let b = upper.as_bytes();

        let valid = b.len() == 18
            && b[..4].iter().all(u8::is_ascii_uppercase)
            && b[4..10].iter().all(u8::is_ascii_digit)
            && matches!(b[10], b'H' | b'M' | b'X')
            && b[11..16].iter().all(u8::is_ascii_uppercase)
            && b[16].is_ascii_alphanumeric()
            && b[17].is_ascii_digit();
        if !valid {
            return Err(ValidationError::InvalidCurp(raw));
        }
        Ok(Self(upper))
    }

    /// Access the CURP string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Curp {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Curp> for String {
    fn from(value: Curp) -> Self {
        value.0
    }
}

impl std::fmt::Display for Curp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_individual_accepted_and_uppercased() {
        let rfc = Rfc::new(" gode561231gr8 ").unwrap();
        assert_eq!(rfc.as_str(), "GODE561231GR8");
        assert!(!rfc.is_legal_person());
    }

    #[test]
    fn rfc_legal_person_accepted() {
        let rfc = Rfc::new("ABC010101AB1").unwrap();
        assert!(rfc.is_legal_person());
    }

    #[test]
    fn rfc_with_enye_and_ampersand() {
        assert!(Rfc::new("ÑA&O800101AB1").is_ok());
    }

    #[test]
    fn rfc_rejects_bad_lengths_and_shapes() {
        assert!(Rfc::new("").is_err());
        assert!(Rfc::new("RFC000XXX").is_err());
        assert!(Rfc::new("GODE56123AGR8").is_err());
        assert!(Rfc::new("GOD1561231GR8").is_err());
        assert!(Rfc::new("GODE561231G-8").is_err());
    }

    #[test]
    fn rfc_error_carries_input() {
        match Rfc::new("nope") {
            Err(ValidationError::InvalidRfc(s)) => assert_eq!(s, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn curp_accepted() {
        let curp = Curp::new("gode561231hdfrrn09").unwrap();
        assert_eq!(curp.as_str(), "GODE561231HDFRRN09");
    }

    #[test]
    fn curp_rejects_bad_sex_marker_and_length() {
        assert!(Curp::new("GODE561231ZDFRRN09").is_err());
        assert!(Curp::new("GODE561231HDFRRN0").is_err());
        assert!(Curp::new("GODE561231HDFRRN0A").is_err());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Result<Rfc, _> = serde_json::from_str("\"GODE561231GR8\"");
        assert!(ok.is_ok());
        let bad: Result<Curp, _> = serde_json::from_str("\"CURPXXX000\"");
        assert!(bad.is_err());
        let json = serde_json::to_string(&ok.unwrap()).unwrap();
        assert_eq!(json, "\"GODE561231GR8\"");
    }
}
