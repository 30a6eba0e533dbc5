//! Country name to ISO 3166-1 alpha-2 code lookup.

use std::collections::BTreeMap;

/// Countries the retention endpoint is known to be queried for.
const BUILTIN_CODES: &[(&str, &str)] = &[
    ("United Kingdom", "GB"),
    ("United States", "US"),
    ("Germany", "DE"),
    ("Italy", "IT"),
    ("Japan", "JP"),
    ("South Korea", "KR"),
    ("Mexico", "MX"),
    ("India", "IN"),
    ("France", "FR"),
    ("Russia", "RU"),
    ("Belgium", "BE"),
    ("Brazil", "BR"),
];

/// Lookup table used to build the retention geography filter.
#[derive(Debug, Clone)]
pub struct CountryCodes {
    codes: BTreeMap<String, String>,
}

impl Default for CountryCodes {
    fn default() -> Self {
        Self {
            codes: BUILTIN_CODES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
        }
    }
}

impl CountryCodes {
    /// Built-in table with configured entries layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut table = Self::default();
        for (name, code) in overrides {
            table.codes.insert(name.clone(), code.to_uppercase());
        }
        table
    }

    pub fn code(&self, country: &str) -> Option<&str> {
        self.codes.get(country).map(String::as_str)
    }
}
