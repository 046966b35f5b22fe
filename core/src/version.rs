//! Record versioning for optimistic concurrency control.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version number of a stored record.
///
/// An absent key is at version 0 and every successful write increments the
/// version by one. Writers pass the version they read back to the store; when
/// the key has moved on, the write fails with a concurrency conflict instead
/// of silently overwriting the newer value.
///
/// # Examples
///
/// ```
/// use marquee_core::version::Version;
///
/// let absent = Version::ABSENT;
/// let first = absent.next();
/// assert_eq!(first, Version::new(1));
/// assert!(absent.is_absent());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a key that has never been written.
    ///
    /// Passing it as the expected version turns a put into "create only".
    pub const ABSENT: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// True for the version of a key that does not exist.
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.0 == 0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::ABSENT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
