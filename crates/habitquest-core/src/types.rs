//! Shared primitive types: timestamps, time sources, and the session credential.

use core::fmt;
use core::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw milliseconds
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0 + other)
    }
}

impl Sub for Timestamp {
    type Output = u64;

    /// Elapsed milliseconds, saturating at zero for out-of-order clocks.
    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

// ----------------------------------------------------------------------------
// Time Sources
// ----------------------------------------------------------------------------

/// Source of the current time, injected so timing-sensitive logic
/// (retention, debounce) can run against a manual clock in tests.
pub trait TimeSource {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::new(duration.as_millis() as u64)
    }
}

/// Hand-advanced clock for deterministic tests.
///
/// Clones share the same underlying clock, so a test can hold one handle
/// while the component under test holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    millis: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn new(start_millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.millis.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Session Token
// ----------------------------------------------------------------------------

/// Opaque session credential handed to the client by the auth layer.
///
/// The token is only ever used in the connection handshake. Its `Debug`
/// impl is redacted so the credential cannot leak through logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Validate and wrap a raw credential string.
    ///
    /// Rejects empty, all-whitespace, and whitespace-containing
    /// credentials; anything else is opaque to this crate.
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidSession("credential is empty"));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidSession(
                "credential contains whitespace",
            ));
        }
        Ok(Self(raw))
    }

    /// Expose the raw credential for the connection handshake
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
