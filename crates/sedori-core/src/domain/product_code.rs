use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A 13-digit JAN/EAN code. Shorter numeric codes (5 to 12 digits) are
/// normalized by left-padding with zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JanCode(String);

impl JanCode {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(ValidationError::InvalidJanLength {
                value: trimmed.to_owned(),
            });
        }
        match trimmed.len() {
            13 => Ok(Self(trimmed.to_owned())),
            5..=12 => Ok(Self(format!("{trimmed:0>13}"))),
            _ => Err(ValidationError::InvalidJanLength {
                value: trimmed.to_owned(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for JanCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An Amazon Standard Identification Number: 10 alphanumeric characters
/// starting with `B0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asin(String);

impl Asin {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        let well_formed = trimmed.len() == 10
            && trimmed.starts_with("B0")
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !well_formed {
            return Err(ValidationError::InvalidAsin {
                value: trimmed.to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Asin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product identifier accepted at the ingestion boundary: either a
/// JAN/EAN code or an ASIN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductCode {
    Ean(JanCode),
    Asin(Asin),
}

impl ProductCode {
    /// Classifies raw input: all-digit values become (zero-padded) EAN
    /// codes, `B0`-prefixed 10-character values become ASINs.
    pub fn classify(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
            return JanCode::parse(trimmed).map(Self::Ean);
        }
        if let Ok(asin) = Asin::parse(trimmed) {
            return Ok(Self::Asin(asin));
        }
        Err(ValidationError::UnclassifiableCode {
            value: trimmed.to_owned(),
        })
    }

    /// Identifier type label used by the SP-API catalog endpoint.
    pub const fn identifier_type(&self) -> &'static str {
        match self {
            Self::Ean(_) => "EAN",
            Self::Asin(_) => "ASIN",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ean(jan) => jan.as_str(),
            Self::Asin(asin) => asin.as_str(),
        }
    }
}

impl Display for ProductCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
