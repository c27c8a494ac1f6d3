use std::fmt;

/// Reasons the soft authenticator refuses a ceremony.
///
/// These mirror the `DOMException`s a browser would raise for the same situations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorError {
    /// The configured origin is not a URL with a domain.
    InvalidOrigin,
    /// The requested RP ID is not a registrable suffix of the origin's host.
    RpIdMismatch,
    /// None of the requested algorithms matches the authenticator's key algorithm.
    UnsupportedAlgorithm,
    /// The held credential is on the exclude list.
    CredentialExcluded,
    /// No held credential matches the request.
    NoCredentials,
}

impl fmt::Display for AuthenticatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AuthenticatorError::InvalidOrigin => "origin is not a valid web origin",
            AuthenticatorError::RpIdMismatch => "rp id is not scoped to the origin",
            AuthenticatorError::UnsupportedAlgorithm => "no supported algorithm was requested",
            AuthenticatorError::CredentialExcluded => "credential is excluded",
            AuthenticatorError::NoCredentials => "no matching credential",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for AuthenticatorError {}
