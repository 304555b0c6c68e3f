//! Location code resolution
//!
//! Maps the human-readable region name accepted on create to the two-letter
//! country code the control plane expects in `createTenantProperties`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Supported region names, in display order
pub const LOCATIONS: &[(&str, CountryCode)] = &[
    ("United States", CountryCode::Us),
    ("Europe", CountryCode::Eu),
    ("Asia Pacific", CountryCode::Ap),
    ("Australia", CountryCode::Au),
];

/// Two-letter code for a data residency region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CountryCode {
    Us,
    Eu,
    Ap,
    Au,
}

impl CountryCode {
    pub fn as_str(self) -> &'static str {
        match self {
            CountryCode::Us => "US",
            CountryCode::Eu => "EU",
            CountryCode::Ap => "AP",
            CountryCode::Au => "AU",
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid location '{input}': expected one of United States, Europe, Asia Pacific, Australia")]
pub struct InvalidLocation {
    pub input: String,
}

/// Resolve a region name to its country code. Matching is exact.
pub fn resolve(name: &str) -> Result<CountryCode, InvalidLocation> {
    LOCATIONS
        .iter()
        .find(|(location, _)| *location == name)
        .map(|(_, code)| *code)
        .ok_or_else(|| InvalidLocation {
            input: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_every_supported_location() {
        assert_eq!(resolve("United States"), Ok(CountryCode::Us));
        assert_eq!(resolve("Europe"), Ok(CountryCode::Eu));
        assert_eq!(resolve("Asia Pacific"), Ok(CountryCode::Ap));
        assert_eq!(resolve("Australia"), Ok(CountryCode::Au));
    }

    #[test]
    fn rejects_near_misses() {
        for input in ["", "europe", "Eurpose", "United States ", "US", "Asia-Pacific"] {
            let err = resolve(input).unwrap_err();
            assert_eq!(err.input, input);
        }
    }

    #[test]
    fn codes_serialize_as_two_letters() {
        assert_eq!(serde_json::to_string(&CountryCode::Ap).unwrap(), "\"AP\"");
        assert_eq!(CountryCode::Au.to_string(), "AU");
    }
}
