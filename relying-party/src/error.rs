use std::fmt;

use typeshare::typeshare;

/// Errors produced by a storage collaborator, either a [`CredentialStore`] or a
/// [`ChallengeCache`].
///
/// [`CredentialStore`]: crate::CredentialStore
/// [`ChallengeCache`]: crate::ChallengeCache
#[typeshare]
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum StoreError {
    /// No credential is registered for the identity.
    NotFound,
    /// The counter advance was refused because it would not move the counter forward.
    CounterRejected,
    /// The backing store failed. The message is for logs, not for end users.
    Unavailable(String),
}

impl StoreError {
    /// Was the error a refusal to move the signature counter?
    pub fn is_counter_rejected(&self) -> bool {
        matches!(self, StoreError::CounterRejected)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound => f.write_str("no credential for identity"),
            StoreError::CounterRejected => f.write_str("signature counter did not advance"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Outcome of a failed ceremony or session check.
///
/// Rejections only carry their kind. The failing check is logged at debug level so that
/// responses cannot be used as an oracle.
#[typeshare]
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content")]
pub enum Error {
    /// No credential is registered for the identity.
    UnknownIdentity,
    /// The challenge was never issued, was already used or has expired.
    ChallengeInvalid,
    /// The registration response did not verify.
    AttestationInvalid,
    /// The authentication response did not verify.
    AssertionInvalid,
    /// The signature counter did not move forward, the authenticator may have been cloned or the
    /// response replayed.
    ReplayDetected,
    /// The session token is malformed, forged or expired.
    TokenInvalid,
    /// A storage collaborator failed.
    Storage(StoreError),
}

impl Error {
    /// Was the error a detected replay?
    pub fn is_replay(&self) -> bool {
        matches!(self, Error::ReplayDetected)
    }

    /// Was the error caused by a failing collaborator rather than by the request?
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Error::UnknownIdentity,
            StoreError::CounterRejected => Error::ReplayDetected,
            err @ StoreError::Unavailable(_) => Error::Storage(err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownIdentity => f.write_str("unknown identity"),
            Error::ChallengeInvalid => f.write_str("challenge is missing, used or expired"),
            Error::AttestationInvalid => f.write_str("attestation verification failed"),
            Error::AssertionInvalid => f.write_str("assertion verification failed"),
            Error::ReplayDetected => f.write_str("signature counter replay detected"),
            Error::TokenInvalid => f.write_str("session token is invalid"),
            Error::Storage(err) => write!(f, "storage failure: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_ceremony_errors() {
        assert_eq!(Error::from(StoreError::NotFound), Error::UnknownIdentity);
        assert!(Error::from(StoreError::CounterRejected).is_replay());
        assert!(Error::from(StoreError::Unavailable("disk full".into())).is_storage());
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_value(Error::ReplayDetected).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "ReplayDetected" }));

        let json = serde_json::to_value(Error::Storage(StoreError::Unavailable("down".into())))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Storage",
                "content": { "type": "Unavailable", "content": "down" }
            })
        );
    }
}
