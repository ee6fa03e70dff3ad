//! Device (voter session) identifier.

use crate::ClipVoteError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of one voting device or browser session.
///
/// Must be non-empty and printable ASCII without whitespace, since it is used
/// as a storage key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ClipVoteError> {
        let s = raw.into();
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ClipVoteError::InvalidDeviceId(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ClipVoteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(DeviceId::new("").is_err());
        assert!(DeviceId::new("a b").is_err());
        assert!(DeviceId::new("phone-7f3a").is_ok());
    }
}
