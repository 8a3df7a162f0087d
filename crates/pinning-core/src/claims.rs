//! Claim set bound into every signed envelope

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::crypto::KeyId;
use crate::error::{PinningError, Result};
use crate::pin::Pin;

/// The facts attested by one envelope
///
/// Built fresh per request. `expires_at` is always `issued_at + ttl_seconds`,
/// both in whole seconds of wall-clock UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    /// Lowercased host the pins belong to
    pub domain: String,
    /// Pins, leaf first
    pub pins: Vec<Pin>,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds
    pub ttl_seconds: u64,
    /// Identifier of the signing key
    pub key_id: KeyId,
}

impl ClaimSet {
    /// Build a claim set issued now
    pub fn new(
        domain: impl Into<String>,
        pins: Vec<Pin>,
        lifetime: std::time::Duration,
        key_id: KeyId,
    ) -> Result<Self> {
        Self::issued_at(domain, pins, Utc::now(), lifetime, key_id)
    }

    /// Build a claim set with an explicit issuance time
    ///
    /// Sub-second precision is dropped from both `issued_at` and `lifetime`.
    pub fn issued_at(
        domain: impl Into<String>,
        pins: Vec<Pin>,
        issued_at: DateTime<Utc>,
        lifetime: std::time::Duration,
        key_id: KeyId,
    ) -> Result<Self> {
        let issued_at = from_unix(issued_at.timestamp())?;
        let ttl_seconds = lifetime.as_secs();
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                PinningError::SerializationError(format!("lifetime too large: {}s", ttl_seconds))
            })?;
        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            PinningError::SerializationError("expiry overflows timestamp range".into())
        })?;

        Ok(Self {
            domain: domain.into(),
            pins,
            issued_at,
            expires_at,
            ttl_seconds,
            key_id,
        })
    }

    /// Issuance time as Unix seconds
    pub fn created(&self) -> i64 {
        self.issued_at.timestamp()
    }

    /// Expiry time as Unix seconds
    pub fn expires(&self) -> i64 {
        self.expires_at.timestamp()
    }

    /// Whether the claims are past expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Convert Unix seconds to a UTC timestamp
pub(crate) fn from_unix(seconds: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| PinningError::MalformedEnvelope(format!("timestamp out of range: {}", seconds)))
}
