use std::fmt;

/// Failure to decode one of the authenticator's binary structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended before the structure was complete.
    Truncated,
    /// Bytes remained after the structure was fully decoded.
    TrailingData,
    /// The input was not well-formed CBOR.
    InvalidCbor,
    /// The credential public key is not a well-formed COSE_Key.
    InvalidCoseKey,
    /// A credential ID can be a maximum of 1023 bytes.
    CredentialIdTooLong,
    /// A required member of a CBOR map was absent.
    MissingField(&'static str),
    /// A CBOR member was present with the wrong type.
    UnexpectedType(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated => f.write_str("input ended early"),
            DecodeError::TrailingData => f.write_str("unexpected trailing bytes"),
            DecodeError::InvalidCbor => f.write_str("malformed CBOR"),
            DecodeError::InvalidCoseKey => f.write_str("malformed COSE key"),
            DecodeError::CredentialIdTooLong => f.write_str("credential id longer than 1023 bytes"),
            DecodeError::MissingField(name) => write!(f, "missing field `{name}`"),
            DecodeError::UnexpectedType(name) => write!(f, "field `{name}` has the wrong type"),
        }
    }
}

impl std::error::Error for DecodeError {}
