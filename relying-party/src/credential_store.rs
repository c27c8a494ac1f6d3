use std::sync::Arc;

use dashmap::DashMap;
use relying_party_types::Bytes;

use crate::StoreError;

/// A passkey registered to an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The identity (username) owning the credential.
    pub identity: String,

    /// The credential ID chosen by the authenticator, at most 1023 bytes.
    pub credential_id: Bytes,

    /// The credential public key in COSE_Key encoding.
    pub public_key: Bytes,

    /// The last signature counter accepted for this credential.
    pub counter: u32,
}

/// Whether an authenticator reporting `reported` may follow a stored counter of `stored`.
///
/// The counter must strictly increase, except for authenticators that do not implement one and
/// report 0 forever.
pub fn counter_advances(stored: u32, reported: u32) -> bool {
    reported > stored || (stored == 0 && reported == 0)
}

/// Durable storage of credentials and user handles, keyed by identity.
///
/// Implementations must be safe to share between tasks. [`CredentialStore::advance_counter`] must
/// evaluate [`counter_advances`] and write the new value as a single atomic step per identity.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert the credential, replacing any credential previously held by the same identity.
    async fn put(&self, credential: Credential) -> Result<(), StoreError>;

    /// Fetch the credential of `identity`.
    async fn get(&self, identity: &str) -> Result<Option<Credential>, StoreError>;

    /// Move the counter of `identity` to `counter`.
    ///
    /// Fails with [`StoreError::CounterRejected`] when [`counter_advances`] does not hold for the
    /// value stored at the time of the write, and with [`StoreError::NotFound`] when the identity
    /// has no credential.
    async fn advance_counter(&self, identity: &str, counter: u32) -> Result<(), StoreError>;

    /// Return the user handle of `identity`, binding `fresh` to it if it has none yet.
    async fn user_handle(&self, identity: &str, fresh: Bytes) -> Result<Bytes, StoreError>;

    /// Look up the user handle bound to `identity` without binding one.
    async fn find_user_handle(&self, identity: &str) -> Result<Option<Bytes>, StoreError>;
}

/// In-memory [`CredentialStore`]. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: DashMap<String, Credential>,
    user_handles: DashMap<String, Bytes>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered credentials.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether no credential has been registered.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        self.credentials
            .insert(credential.identity.clone(), credential);
        Ok(())
    }

    async fn get(&self, identity: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.get(identity).map(|c| c.clone()))
    }

    async fn advance_counter(&self, identity: &str, counter: u32) -> Result<(), StoreError> {
        // The entry guard holds the shard lock, so the check and the write cannot interleave with
        // another advance for the same identity.
        let mut credential = self
            .credentials
            .get_mut(identity)
            .ok_or(StoreError::NotFound)?;
        if !counter_advances(credential.counter, counter) {
            return Err(StoreError::CounterRejected);
        }
        credential.counter = counter;
        Ok(())
    }

    async fn user_handle(&self, identity: &str, fresh: Bytes) -> Result<Bytes, StoreError> {
        Ok(self
            .user_handles
            .entry(identity.to_owned())
            .or_insert(fresh)
            .clone())
    }

    async fn find_user_handle(&self, identity: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.user_handles.get(identity).map(|handle| handle.clone()))
    }
}

#[async_trait::async_trait]
impl<S: CredentialStore + ?Sized> CredentialStore for Arc<S> {
    async fn put(&self, credential: Credential) -> Result<(), StoreError> {
        (**self).put(credential).await
    }

    async fn get(&self, identity: &str) -> Result<Option<Credential>, StoreError> {
        (**self).get(identity).await
    }

    async fn advance_counter(&self, identity: &str, counter: u32) -> Result<(), StoreError> {
        (**self).advance_counter(identity, counter).await
    }

    async fn user_handle(&self, identity: &str, fresh: Bytes) -> Result<Bytes, StoreError> {
        (**self).user_handle(identity, fresh).await
    }

    async fn find_user_handle(&self, identity: &str) -> Result<Option<Bytes>, StoreError> {
        (**self).find_user_handle(identity).await
    }
}
