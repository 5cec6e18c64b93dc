use std::fmt;

use serde::{Deserialize, Serialize};

/// Country suffix appended to every geocoding query.
pub const COUNTRY_SUFFIX: &str = "Argentina";

/// Single formatted address string used as the geocoding query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedAddress(String);

impl NormalizedAddress {
    /// Renders `"{street} {number}, {seg}, …, Argentina"`.
    ///
    /// Missing values render as empty text and are never dropped, so a gap
    /// shows up as an empty segment (`"Calle 1 , , Cordoba, Argentina"`).
    pub fn from_parts(
        street: Option<&str>,
        number: Option<&str>,
        segments: &[Option<&str>],
    ) -> Self {
        let mut value = format!("{} {}", street.unwrap_or(""), number.unwrap_or(""));
        for segment in segments {
            value.push_str(", ");
            value.push_str(segment.unwrap_or(""));
        }
        value.push_str(", ");
        value.push_str(COUNTRY_SUFFIX);
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for NormalizedAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NormalizedAddress {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for NormalizedAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
