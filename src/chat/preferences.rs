//! Matching preferences.
//!
//! Wire form is `"<gender|any>/<min-max|any>/<city|any>"`, three fields,
//! slash-delimited. `any` means "no filter on this attribute".

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ANY: &str = "any";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreferenceError {
    #[error("expected 3 slash-separated fields, got {0}")]
    FieldCount(usize),
    #[error("empty {0} field")]
    EmptyField(&'static str),
    #[error("age range must look like min-max, got {0:?}")]
    MalformedAgeRange(String),
    #[error("age range {min}-{max} is reversed")]
    ReversedAgeRange { min: u32, max: u32 },
}

/// Inclusive age range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub fn new(min: u32, max: u32) -> Result<Self, PreferenceError> {
        if min > max {
            return Err(PreferenceError::ReversedAgeRange { min, max });
        }
        Ok(Self { min, max })
    }
}

impl FromStr for AgeRange {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PreferenceError::MalformedAgeRange(s.to_string());
        let (min, max) = s.split_once('-').ok_or_else(malformed)?;
        let min = min.trim().parse::<u32>().map_err(|_| malformed())?;
        let max = max.trim().parse::<u32>().map_err(|_| malformed())?;
        Self::new(min, max)
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// What a seeker is looking for. `None` on a field means `any`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub gender: Option<String>,
    pub age: Option<AgeRange>,
    pub city: Option<String>,
}

impl Preferences {
    /// No filters at all.
    pub fn any() -> Self {
        Self::default()
    }
}

fn parse_field(raw: &str, name: &'static str) -> Result<Option<String>, PreferenceError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(PreferenceError::EmptyField(name));
    }
    if value.eq_ignore_ascii_case(ANY) {
        Ok(None)
    } else {
        Ok(Some(value.to_string()))
    }
}

impl FromStr for Preferences {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('/').collect();
        let [gender, age, city] = fields.as_slice() else {
            return Err(PreferenceError::FieldCount(fields.len()));
        };

        let age = parse_field(age, "age")?.map(|range| range.parse::<AgeRange>()).transpose()?;

        Ok(Self {
            gender: parse_field(gender, "gender")?,
            age,
            city: parse_field(city, "city")?,
        })
    }
}

impl fmt::Display for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let age = self.age.map(|range| range.to_string());
        write!(
            f,
            "{}/{}/{}",
            self.gender.as_deref().unwrap_or(ANY),
            age.as_deref().unwrap_or(ANY),
            self.city.as_deref().unwrap_or(ANY)
        )
    }
}

impl Serialize for Preferences {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Preferences {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_preferences() {
        let prefs: Preferences = "female/25-30/Berlin".parse().unwrap();
        assert_eq!(prefs.gender.as_deref(), Some("female"));
        assert_eq!(prefs.age, Some(AgeRange { min: 25, max: 30 }));
        assert_eq!(prefs.city.as_deref(), Some("Berlin"));
        assert_eq!(prefs.to_string(), "female/25-30/Berlin");
    }

    #[test]
    fn test_parse_any_is_case_insensitive() {
        let prefs: Preferences = "ANY/any/Any".parse().unwrap();
        assert_eq!(prefs, Preferences::any());
        assert_eq!(prefs.to_string(), "any/any/any");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert_eq!("f/25-30".parse::<Preferences>(), Err(PreferenceError::FieldCount(2)));
        assert_eq!("f/1-2/x/y".parse::<Preferences>(), Err(PreferenceError::FieldCount(4)));
        assert_eq!("/any/any".parse::<Preferences>(), Err(PreferenceError::EmptyField("gender")));
        assert_eq!(
            "f/25/any".parse::<Preferences>(),
            Err(PreferenceError::MalformedAgeRange("25".to_string()))
        );
        assert_eq!(
            "f/a-b/any".parse::<Preferences>(),
            Err(PreferenceError::MalformedAgeRange("a-b".to_string()))
        );
        assert_eq!(
            "f/30-25/any".parse::<Preferences>(),
            Err(PreferenceError::ReversedAgeRange { min: 30, max: 25 })
        );
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let prefs: Preferences = serde_json::from_str("\"m/18-20/Tokyo\"").unwrap();
        assert_eq!(prefs.city.as_deref(), Some("Tokyo"));
        assert_eq!(serde_json::to_string(&prefs).unwrap(), "\"m/18-20/Tokyo\"");
        assert!(serde_json::from_str::<Preferences>("\"m-18\"").is_err());
    }
}
