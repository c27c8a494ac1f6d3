use ciborium::value::{Integer, Value};

use crate::authenticator::{AuthenticatorData, DecodeError};

/// The attestation statement carried in an [`AttestationObject`], keyed by its format identifier.
///
/// Only the formats a relying party without a trust store can check are modelled. Everything
/// else is kept as [`AttestationStatement::Unsupported`] so that callers can reject it explicitly.
///
/// <https://w3c.github.io/webauthn/#sctn-defined-attestation-formats>
#[derive(Debug, Clone, PartialEq)]
pub enum AttestationStatement {
    /// `"none"`: the authenticator makes no claim about its provenance. The statement is an
    /// empty map.
    None,

    /// `"packed"`: a signature over `authData || SHA-256(clientDataJSON)`.
    Packed {
        /// COSE algorithm identifier of the signature.
        alg: i64,
        /// The signature bytes.
        sig: Vec<u8>,
        /// The attestation certificate chain, absent for self attestation.
        x5c: Option<Vec<Vec<u8>>>,
    },

    /// Any other format, such as `"tpm"` or `"android-key"`.
    Unsupported {
        /// The format identifier as sent by the authenticator.
        fmt: String,
    },
}

impl AttestationStatement {
    /// The format identifier of this statement.
    pub fn fmt(&self) -> &str {
        match self {
            AttestationStatement::None => "none",
            AttestationStatement::Packed { .. } => "packed",
            AttestationStatement::Unsupported { fmt } => fmt,
        }
    }

    fn from_cbor(fmt: String, att_stmt: Vec<(Value, Value)>) -> Result<Self, DecodeError> {
        match fmt.as_str() {
            "none" if att_stmt.is_empty() => Ok(AttestationStatement::None),
            "none" => Err(DecodeError::UnexpectedType("attStmt")),
            "packed" => {
                let mut alg = None;
                let mut sig = None;
                let mut x5c = None;
                for (key, value) in att_stmt {
                    match (key.as_text(), value) {
                        (Some("alg"), Value::Integer(i)) => {
                            alg = Some(
                                i64::try_from(i).map_err(|_| DecodeError::UnexpectedType("alg"))?,
                            )
                        }
                        (Some("sig"), Value::Bytes(b)) => sig = Some(b),
                        (Some("x5c"), Value::Array(certs)) => {
                            x5c = Some(
                                certs
                                    .into_iter()
                                    .map(|c| c.into_bytes())
                                    .collect::<Result<Vec<_>, _>>()
                                    .map_err(|_| DecodeError::UnexpectedType("x5c"))?,
                            )
                        }
                        (Some("alg"), _) => return Err(DecodeError::UnexpectedType("alg")),
                        (Some("sig"), _) => return Err(DecodeError::UnexpectedType("sig")),
                        (Some("x5c"), _) => return Err(DecodeError::UnexpectedType("x5c")),
                        _ => {}
                    }
                }
                Ok(AttestationStatement::Packed {
                    alg: alg.ok_or(DecodeError::MissingField("alg"))?,
                    sig: sig.ok_or(DecodeError::MissingField("sig"))?,
                    x5c,
                })
            }
            _ => Ok(AttestationStatement::Unsupported { fmt }),
        }
    }

    fn to_cbor(&self) -> Value {
        match self {
            AttestationStatement::None | AttestationStatement::Unsupported { .. } => {
                Value::Map(Vec::new())
            }
            AttestationStatement::Packed { alg, sig, x5c } => {
                let mut map = vec![
                    (Value::Text("alg".into()), Value::Integer(Integer::from(*alg))),
                    (Value::Text("sig".into()), Value::Bytes(sig.clone())),
                ];
                if let Some(x5c) = x5c {
                    map.push((
                        Value::Text("x5c".into()),
                        Value::Array(x5c.iter().cloned().map(Value::Bytes).collect()),
                    ));
                }
                Value::Map(map)
            }
        }
    }
}

/// The CBOR attestation object returned by an authenticator at registration.
///
/// The raw authenticator data bytes are kept next to their decoded form because attestation
/// signatures cover the bytes exactly as the authenticator emitted them.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    /// The attestation statement and its format.
    pub att_stmt: AttestationStatement,

    /// The decoded authenticator data.
    pub auth_data: AuthenticatorData,

    raw_auth_data: Vec<u8>,
}

impl AttestationObject {
    /// Build an attestation object around already encoded authenticator data.
    pub fn new(att_stmt: AttestationStatement, auth_data: AuthenticatorData) -> Self {
        let raw_auth_data = auth_data.to_vec();
        Self {
            att_stmt,
            auth_data,
            raw_auth_data,
        }
    }

    /// The authenticator data exactly as it was encoded.
    pub fn raw_auth_data(&self) -> &[u8] {
        &self.raw_auth_data
    }

    /// Decode an attestation object from its CBOR encoding.
    pub fn from_slice(v: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = ciborium::de::from_reader(v).map_err(|_| DecodeError::InvalidCbor)?;
        let map = value
            .into_map()
            .map_err(|_| DecodeError::UnexpectedType("attestationObject"))?;

        let mut fmt = None;
        let mut att_stmt = None;
        let mut raw_auth_data = None;
        for (key, value) in map {
            match key.as_text() {
                Some("fmt") => {
                    fmt = Some(
                        value
                            .into_text()
                            .map_err(|_| DecodeError::UnexpectedType("fmt"))?,
                    )
                }
                Some("attStmt") => {
                    att_stmt = Some(
                        value
                            .into_map()
                            .map_err(|_| DecodeError::UnexpectedType("attStmt"))?,
                    )
                }
                Some("authData") => {
                    raw_auth_data = Some(
                        value
                            .into_bytes()
                            .map_err(|_| DecodeError::UnexpectedType("authData"))?,
                    )
                }
                _ => {}
            }
        }

        let raw_auth_data = raw_auth_data.ok_or(DecodeError::MissingField("authData"))?;
        let auth_data = AuthenticatorData::from_slice(&raw_auth_data)?;
        let att_stmt = AttestationStatement::from_cbor(
            fmt.ok_or(DecodeError::MissingField("fmt"))?,
            att_stmt.ok_or(DecodeError::MissingField("attStmt"))?,
        )?;

        Ok(Self {
            att_stmt,
            auth_data,
            raw_auth_data,
        })
    }

    /// Encode the attestation object to CBOR.
    pub fn to_vec(&self) -> Vec<u8> {
        let value = Value::Map(vec![
            (
                Value::Text("fmt".into()),
                Value::Text(self.att_stmt.fmt().into()),
            ),
            (Value::Text("attStmt".into()), self.att_stmt.to_cbor()),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.raw_auth_data.clone()),
            ),
        ]);
        let mut bytes = Vec::new();
        // SAFETY: writing a `Value` into a `Vec` cannot fail.
        ciborium::ser::into_writer(&value, &mut bytes).unwrap();
        bytes
    }
}
