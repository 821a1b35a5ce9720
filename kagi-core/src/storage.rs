use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    crypto::{hash_token, verify_token_hash},
    error::{ValidationError, utilities::RequiredFieldExt},
    validation::{validate_token, validate_uid},
};

/// The single active token record held for one user identifier.
///
/// Only the SHA256 digest of the token is kept. A record is replaced wholesale whenever a new
/// token is stored for the same `uid`; fields are never updated one by one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub uid: String,
    pub token_hash: String,
    pub referrer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        uid: String,
        token_hash: String,
        referrer: Option<String>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            uid,
            token_hash,
            referrer,
            created_at,
            expires_at,
        }
    }

    /// Build the record a [`NewToken`] produces when issued at `now`.
    ///
    /// A ttl that would overflow the calendar saturates to the latest representable instant.
    pub fn issue(new_token: &NewToken, now: DateTime<Utc>) -> Self {
        let expires_at = now
            .checked_add_signed(new_token.ttl)
            .unwrap_or(if new_token.ttl < Duration::zero() {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });

        Self {
            uid: new_token.uid.clone(),
            token_hash: hash_token(&new_token.token),
            referrer: new_token.referrer.clone(),
            created_at: now,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether `token` presented for `uid` authenticates against this record at `now`.
    ///
    /// All three conditions must hold: the uid matches exactly, `now` is strictly before
    /// `expires_at`, and the token digest matches.
    pub fn accepts(&self, token: &str, uid: &str, now: DateTime<Utc>) -> bool {
        self.uid == uid && !self.is_expired_at(now) && verify_token_hash(token, &self.token_hash)
    }

    /// Evaluate a presentation of `token` for `uid` at `now`.
    pub fn authenticate(&self, token: &str, uid: &str, now: DateTime<Utc>) -> Authentication {
        if self.accepts(token, uid, now) {
            Authentication::Valid {
                referrer: self.referrer.clone().unwrap_or_default(),
            }
        } else {
            Authentication::Invalid
        }
    }
}

impl PartialEq for TokenRecord {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.token_hash == other.token_hash
            && self.referrer == other.referrer
            // Backends persist millisecond precision, so compare at that resolution
            && self.created_at.timestamp_millis() == other.created_at.timestamp_millis()
            && self.expires_at.timestamp_millis() == other.expires_at.timestamp_millis()
    }
}

/// Outcome of presenting a token.
///
/// A wrong, unknown, expired or foreign token is [`Authentication::Invalid`], not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    /// The token is the uid's current token and has not expired.
    ///
    /// `referrer` is the value stored with the token, or the empty string if none was given.
    Valid { referrer: String },
    Invalid,
}

impl Authentication {
    pub fn is_valid(&self) -> bool {
        matches!(self, Authentication::Valid { .. })
    }

    pub fn referrer(&self) -> Option<&str> {
        match self {
            Authentication::Valid { referrer } => Some(referrer),
            Authentication::Invalid => None,
        }
    }

    pub fn into_referrer(self) -> Option<String> {
        match self {
            Authentication::Valid { referrer } => Some(referrer),
            Authentication::Invalid => None,
        }
    }
}

/// A validated request to store (or replace) the token of a user.
///
/// Construct through [`NewToken::builder`] or [`NewToken::new`]; both reject an empty token,
/// an empty uid and a missing ttl.
#[derive(Debug, Clone)]
pub struct NewToken {
    token: String,
    uid: String,
    ttl: Duration,
    referrer: Option<String>,
}

impl NewToken {
    pub fn builder() -> NewTokenBuilder {
        NewTokenBuilder::default()
    }

    pub fn new(
        token: impl Into<String>,
        uid: impl Into<String>,
        ttl: Duration,
        referrer: Option<&str>,
    ) -> Result<Self, ValidationError> {
        NewTokenBuilder::default()
            .token(token)
            .uid(uid)
            .ttl(ttl)
            .maybe_referrer(referrer.map(str::to_string))
            .build()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }
}

#[derive(Debug, Default)]
pub struct NewTokenBuilder {
    token: Option<String>,
    uid: Option<String>,
    ttl: Option<Duration>,
    referrer: Option<String>,
}

impl NewTokenBuilder {
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn ttl_millis(self, millis: i64) -> Self {
        self.ttl(Duration::milliseconds(millis))
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn maybe_referrer(mut self, referrer: Option<String>) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn build(self) -> Result<NewToken, ValidationError> {
        let token = self.token.require_field("token")?;
        validate_token(&token)?;

        let uid = self.uid.require_field("uid")?;
        validate_uid(&uid)?;

        Ok(NewToken {
            token,
            uid,
            ttl: self.ttl.require_field("ttl")?,
            referrer: self.referrer,
        })
    }
}

/// Configuration for background removal of expired records.
///
/// Cleanup is disabled by default. Authentication never depends on it: an expired record
/// fails to authenticate whether or not it has been collected yet.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub interval: std::time::Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: std::time::Duration::from_secs(3600),
        }
    }
}

impl CleanupConfig {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Reject a zero interval, which would run cleanup back to back against the backend.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval.is_zero() {
            return Err(ValidationError::InvalidField(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
