//! In-memory plaintext secrets.

use std::fmt;

use zeroize::Zeroizing;

/// A plaintext secret held in memory.
///
/// The buffer is zeroed on drop. `Debug` and `Display` both emit
/// `[REDACTED]` so a secret can never end up in a log line by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct Plaintext(Zeroizing<String>);

impl Plaintext {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Expose the plaintext value. Use sparingly.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for Plaintext {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Plaintext {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
