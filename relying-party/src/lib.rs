//! # Relying Party
//!
//! This crate implements the server side of [WebAuthn] passkey ceremonies. A [`RelyingParty`]
//! issues single-use challenges, verifies the responses produced by the browser and the user's
//! authenticator, stores the resulting public keys and, after a successful authentication, mints
//! a signed [`SessionToken`].
//!
//! Storage is pluggable through the [`CredentialStore`] and [`ChallengeCache`] traits. In-memory
//! implementations of both are provided. This crate does no networking: the transport layer
//! deserializes the browser's JSON into the types of [`relying_party_types::webauthn`] and
//! serializes the options returned here.
//!
//! ```no_run
//! # async fn example(response: relying_party::types::webauthn::CreatedPublicKeyCredential) -> Result<(), Box<dyn std::error::Error>> {
//! use relying_party::{
//!     Config, MemoryChallengeCache, MemoryCredentialStore, RelyingParty, SessionSecret,
//! };
//!
//! let config = Config::builder("example.com", "https://example.com")
//!     .rp_name("Example")
//!     .session_secret(SessionSecret::from_encoded("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8")?)
//!     .build()?;
//! let rp = RelyingParty::new(config, MemoryCredentialStore::new(), MemoryChallengeCache::new());
//!
//! // send `options` to `navigator.credentials.create()`
//! let options = rp.start_registration("alice").await?;
//! // ... and hand the browser's answer back
//! let credential = rp.finish_registration("alice", &response).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [WebAuthn]: https://w3c.github.io/webauthn/

use std::{sync::Arc, time::SystemTime};

use relying_party_types::Bytes;

mod authentication;
mod challenge;
mod clock;
mod config;
mod credential_store;
mod error;
mod registration;
mod session;
mod verify;

#[cfg(test)]
mod tests;

pub use relying_party_types as types;

pub use self::{
    challenge::{
        Ceremony, Challenge, ChallengeCache, Challenges, ConsumeError, MemoryChallengeCache,
        CHALLENGE_LEN,
    },
    clock::{Clock, SystemClock},
    config::{
        Config, ConfigBuilder, ConfigError, SessionSecret, ZeroCounterPolicy,
        DEFAULT_CHALLENGE_TIMEOUT, DEFAULT_SESSION_TTL, MIN_SESSION_SECRET_LEN,
    },
    credential_store::{counter_advances, Credential, CredentialStore, MemoryCredentialStore},
    error::{Error, StoreError},
    session::{SessionIssuer, SessionToken},
};

#[cfg(any(test, feature = "testable"))]
pub use self::{clock::MockClock, credential_store::MockCredentialStore};

/// Length of generated user handles.
pub const USER_HANDLE_LEN: usize = 16;

/// A WebAuthn relying party.
///
/// `S` stores credentials and user handles, `C` holds pending challenges. Both are shared between
/// concurrent ceremonies, the relying party itself holds no per-request state.
pub struct RelyingParty<S, C = MemoryChallengeCache> {
    config: Config,
    store: S,
    challenges: Challenges<C>,
    sessions: SessionIssuer,
    clock: Arc<dyn Clock>,
}

impl<S, C> RelyingParty<S, C>
where
    S: CredentialStore,
    C: ChallengeCache,
{
    /// Create a relying party from a validated configuration and its storage.
    pub fn new(config: Config, store: S, cache: C) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            challenges: Challenges::new(cache, config.challenge_timeout()),
            sessions: SessionIssuer::new(
                config.session_secret().clone(),
                config.session_ttl(),
                Arc::clone(&clock),
            ),
            config,
            store,
            clock,
        }
    }

    /// Replace the clock used for challenge and session expiry.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self.sessions = SessionIssuer::new(
            self.config.session_secret().clone(),
            self.config.session_ttl(),
            Arc::clone(&self.clock),
        );
        self
    }

    /// The configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The credential store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The challenge issuer.
    pub fn challenges(&self) -> &Challenges<C> {
        &self.challenges
    }

    /// The session issuer, for validating tokens on later requests.
    pub fn sessions(&self) -> &SessionIssuer {
        &self.sessions
    }

    /// Validate a session token, returning its identity.
    pub fn validate_session(&self, token: &str) -> Result<String, Error> {
        self.sessions.validate(token)
    }

    /// Drop expired challenges. Meant to be called periodically, e.g. from a background task.
    pub async fn evict_expired_challenges(&self) -> Result<usize, Error> {
        Ok(self.challenges.evict_expired(self.now()).await?)
    }

    fn now(&self) -> SystemTime {
        self.clock.now()
    }

    /// Consume the pending challenge of `identity` for `ceremony`.
    async fn consume_challenge(&self, identity: &str, ceremony: Ceremony) -> Result<Bytes, Error> {
        self.challenges
            .consume(identity, ceremony, self.now())
            .await
            .map_err(|err| match err {
                ConsumeError::NotFound => {
                    log::debug!("{ceremony} for {identity} rejected: no pending challenge");
                    Error::ChallengeInvalid
                }
                ConsumeError::Expired => {
                    log::debug!("{ceremony} for {identity} rejected: challenge expired");
                    Error::ChallengeInvalid
                }
                ConsumeError::Storage(err) => Error::Storage(err),
            })
    }
}
