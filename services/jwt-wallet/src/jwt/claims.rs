//! Token claim set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder used in logs when a token has no audience.
pub const UNKNOWN_AUDIENCE: &str = "Unknown Audience";

/// The `aud` claim: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Scalar audience
    Single(String),
    /// Audience list
    Many(Vec<String>),
}

impl Audience {
    /// Whether `audience` is named by this claim.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(value) => value == audience,
            Self::Many(values) => values.iter().any(|v| v == audience),
        }
    }

    /// First audience of a list, or the scalar value.
    #[must_use]
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for Audience {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for Audience {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Token payload: the registered claims plus any custom members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Expiration (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Not before (seconds since epoch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Token identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Custom claims
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.sub = Some(subject.into());
        self
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.aud = Some(audience.into());
        self
    }

    /// Sets the token identifier.
    #[must_use]
    pub fn with_jti(mut self, jti: impl Into<String>) -> Self {
        self.jti = Some(jti.into());
        self
    }

    /// Sets a random UUID v4 token identifier.
    #[must_use]
    pub fn with_random_jti(self) -> Self {
        self.with_jti(uuid::Uuid::new_v4().to_string())
    }

    /// Adds a custom claim.
    #[must_use]
    pub fn with_claim(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.custom.insert(key.into(), value);
        self
    }

    /// Looks up a custom claim.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.custom.get(key)
    }

    /// Audience as written to logs.
    #[must_use]
    pub fn log_audience(&self) -> &str {
        self.aud
            .as_ref()
            .and_then(Audience::primary)
            .unwrap_or(UNKNOWN_AUDIENCE)
    }
}
