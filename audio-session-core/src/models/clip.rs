use std::fmt;

use serde::{Deserialize, Serialize};

/// Location of a finished clip, as handed outward to callers.
///
/// The concrete scheme is backend-defined: a filesystem path from the native
/// backend, a blob URL from the browser backend. Session code treats it as
/// opaque and never retains it after returning it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipUri(String);

impl ClipUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ClipUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClipUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl From<&str> for ClipUri {
    fn from(uri: &str) -> Self {
        Self(uri.to_owned())
    }
}
