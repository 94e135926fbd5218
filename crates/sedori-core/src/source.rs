use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers used in policies, errors and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    Yahoo,
    Rakuten,
    SpApi,
    Keepa,
}

impl ProviderId {
    pub const ALL: [Self; 4] = [Self::Yahoo, Self::Rakuten, Self::SpApi, Self::Keepa];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Rakuten => "rakuten",
            Self::SpApi => "sp-api",
            Self::Keepa => "keepa",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "rakuten" => Ok(Self::Rakuten),
            "sp-api" | "spapi" => Ok(Self::SpApi),
            "keepa" => Ok(Self::Keepa),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}
