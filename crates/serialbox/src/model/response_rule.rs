use core::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Formats a client can accept from the allocation endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ContentType {
    Xml,
    Json,
    Yaml,
    Csv,
}

impl ContentType {
    pub const ALL: [Self; 4] = [Self::Xml, Self::Json, Self::Yaml, Self::Csv];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Csv => "csv",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidRequest {
                reason: format!("unsupported content type `{s}`"),
            })
    }
}

/// Routes responses of one pool, requested in one content type, to a named
/// downstream rule. At most one rule exists per `(pool, content_type)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResponseRule {
    pub pool: String,
    pub content_type: ContentType,
    /// Name of the registered executor that handles the task.
    pub rule: String,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl ResponseRule {
    pub fn new(pool: impl Into<String>, content_type: ContentType, rule: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            pool: pool.into(),
            content_type,
            rule: rule.into(),
            created_date: now,
            modified_date: now,
        }
    }
}

/// Input for creating a [`ResponseRule`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewResponseRule {
    pub pool: String,
    pub content_type: ContentType,
    pub rule: String,
}
