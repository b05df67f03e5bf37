use serde::{Deserialize, Serialize};
use std::fmt;

/// A client-supplied device identifier. Nothing verifies it; the type
/// exists so a claimed identity can never be passed where an
/// authenticated principal is expected. An empty or missing identifier
/// is the anonymous device: no personalization, no exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimedDeviceId(String);

impl ClaimedDeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn anonymous() -> Self {
        Self(String::new())
    }

    pub fn from_optional(raw: Option<String>) -> Self {
        raw.map(Self::new).unwrap_or_else(Self::anonymous)
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimedDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
