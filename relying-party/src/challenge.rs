//! Single-use challenges.
//!
//! A challenge is issued by the start of a ceremony and consumed by its finish. Consuming removes
//! the entry before looking at it, so a nonce is observed by at most one finish even when two race.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use relying_party_types::{rand::random_vec, Bytes};

use crate::StoreError;

/// Length of issued nonces. WebAuthn requires at least 16.
pub const CHALLENGE_LEN: usize = 32;

/// The ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ceremony {
    /// Creating a credential.
    Registration,
    /// Asserting an existing credential.
    Authentication,
}

impl fmt::Display for Ceremony {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ceremony::Registration => "registration",
            Ceremony::Authentication => "authentication",
        })
    }
}

/// A pending challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// The identity the ceremony is for.
    pub identity: String,
    /// The ceremony the challenge belongs to.
    pub ceremony: Ceremony,
    /// The random nonce the authenticator signs over.
    pub nonce: Bytes,
    /// When the challenge was issued.
    pub issued_at: SystemTime,
}

impl Challenge {
    /// Whether the challenge is older than `timeout` at `now`. A clock that moved backwards never
    /// expires a challenge.
    pub fn is_expired(&self, now: SystemTime, timeout: Duration) -> bool {
        now.duration_since(self.issued_at)
            .map(|elapsed| elapsed > timeout)
            .unwrap_or(false)
    }
}

/// Storage for pending challenges, one per identity and ceremony.
#[async_trait::async_trait]
pub trait ChallengeCache: Send + Sync {
    /// Store the challenge, replacing any pending challenge for the same identity and ceremony.
    async fn put(&self, challenge: Challenge) -> Result<(), StoreError>;

    /// Atomically remove and return the pending challenge. Of two concurrent calls at most one
    /// returns `Some`.
    async fn take(
        &self,
        identity: &str,
        ceremony: Ceremony,
    ) -> Result<Option<Challenge>, StoreError>;

    /// Remove every challenge issued strictly before `cutoff`, returning how many were removed.
    async fn remove_issued_before(&self, cutoff: SystemTime) -> Result<usize, StoreError>;
}

/// In-memory [`ChallengeCache`].
#[derive(Debug, Default)]
pub struct MemoryChallengeCache {
    pending: DashMap<(String, Ceremony), Challenge>,
}

impl MemoryChallengeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending challenges, expired or not.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no challenge is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[async_trait::async_trait]
impl ChallengeCache for MemoryChallengeCache {
    async fn put(&self, challenge: Challenge) -> Result<(), StoreError> {
        self.pending.insert(
            (challenge.identity.clone(), challenge.ceremony),
            challenge,
        );
        Ok(())
    }

    async fn take(
        &self,
        identity: &str,
        ceremony: Ceremony,
    ) -> Result<Option<Challenge>, StoreError> {
        Ok(self
            .pending
            .remove(&(identity.to_owned(), ceremony))
            .map(|(_, challenge)| challenge))
    }

    async fn remove_issued_before(&self, cutoff: SystemTime) -> Result<usize, StoreError> {
        let before = self.pending.len();
        self.pending.retain(|_, c| c.issued_at >= cutoff);
        Ok(before.saturating_sub(self.pending.len()))
    }
}

/// Why a challenge could not be consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    /// No challenge is pending: never issued, already consumed or replaced.
    NotFound,
    /// The challenge was pending but older than the timeout. It has been removed.
    Expired,
    /// The cache failed.
    Storage(StoreError),
}

impl From<StoreError> for ConsumeError {
    fn from(err: StoreError) -> Self {
        ConsumeError::Storage(err)
    }
}

/// Issues and consumes challenges on top of a [`ChallengeCache`], enforcing the timeout.
#[derive(Debug)]
pub struct Challenges<C> {
    cache: C,
    timeout: Duration,
}

impl<C: ChallengeCache> Challenges<C> {
    /// Wrap `cache`, expiring challenges older than `timeout`.
    pub fn new(cache: C, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    /// The underlying cache.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Issue a fresh nonce for `identity` and `ceremony`, invalidating any pending one.
    pub async fn issue(
        &self,
        identity: &str,
        ceremony: Ceremony,
        now: SystemTime,
    ) -> Result<Bytes, StoreError> {
        let nonce: Bytes = random_vec(CHALLENGE_LEN).into();
        self.cache
            .put(Challenge {
                identity: identity.to_owned(),
                ceremony,
                nonce: nonce.clone(),
                issued_at: now,
            })
            .await?;
        log::debug!("issued {ceremony} challenge for {identity}");
        Ok(nonce)
    }

    /// Consume the pending nonce for `identity` and `ceremony`.
    pub async fn consume(
        &self,
        identity: &str,
        ceremony: Ceremony,
        now: SystemTime,
    ) -> Result<Bytes, ConsumeError> {
        let challenge = self
            .cache
            .take(identity, ceremony)
            .await?
            .ok_or(ConsumeError::NotFound)?;
        if challenge.is_expired(now, self.timeout) {
            return Err(ConsumeError::Expired);
        }
        Ok(challenge.nonce)
    }

    /// Drop every challenge that has expired at `now`. Correctness never depends on calling this,
    /// it only reclaims memory.
    pub async fn evict_expired(&self, now: SystemTime) -> Result<usize, StoreError> {
        let Some(cutoff) = now.checked_sub(self.timeout) else {
            return Ok(0);
        };
        let evicted = self.cache.remove_issued_before(cutoff).await?;
        if evicted > 0 {
            log::debug!("evicted {evicted} expired challenges");
        }
        Ok(evicted)
    }
}
