use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::record::ValidationError;

/// Workflow stage of a page's translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Untranslated,
    Unsuggested,
    Progress,
    Prereview,
    Review,
    Translated,
    Irrelevant,
}

impl StatusCode {
    pub const ALL: [StatusCode; 7] = [
        Self::Untranslated,
        Self::Unsuggested,
        Self::Progress,
        Self::Prereview,
        Self::Review,
        Self::Translated,
        Self::Irrelevant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untranslated => "untranslated",
            Self::Unsuggested => "unsuggested",
            Self::Progress => "progress",
            Self::Prereview => "prereview",
            Self::Review => "review",
            Self::Translated => "translated",
            Self::Irrelevant => "irrelevant",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusCode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == value)
            .ok_or_else(|| ValidationError::InvalidStatus(value.to_string()))
    }
}

/// Closed set of status codes plus the operator-configured target languages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    languages: BTreeSet<String>,
}

impl Catalog {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let languages = languages
            .into_iter()
            .map(|code| code.as_ref().trim().to_ascii_lowercase())
            .filter(|code| !code.is_empty())
            .collect();
        Self { languages }
    }

    pub fn is_valid_status(&self, code: &str) -> bool {
        code.parse::<StatusCode>().is_ok()
    }

    pub fn is_valid_language(&self, code: &str) -> bool {
        self.languages.contains(code)
    }

    pub fn status_codes(&self) -> &'static [StatusCode] {
        &StatusCode::ALL
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str)
    }

    pub fn parse_status(&self, code: &str) -> Result<StatusCode, ValidationError> {
        code.trim().parse()
    }

    pub fn check_language(&self, code: &str) -> Result<(), ValidationError> {
        if self.is_valid_language(code) {
            Ok(())
        } else {
            Err(ValidationError::InvalidLanguage(code.to_string()))
        }
    }
}
