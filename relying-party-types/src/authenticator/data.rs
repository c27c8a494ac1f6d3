use std::io::{Cursor, Read};

use ciborium::value::Value;
use coset::{AsCborValue, CborSerializable, CoseKey};

use crate::{
    authenticator::{Aaguid, DecodeError, Flags},
    crypto::rp_id_hash,
};

/// Length of the fixed prefix: RP ID hash (32 bytes) + flags (1 byte) + counter (4 bytes).
const FIXED_LEN: usize = 37;

/// Largest credential ID a relying party accepts.
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// The authenticator data structure encodes contextual bindings made by the authenticator: which
/// relying party the credential is scoped to, whether the user was present and verified, and the
/// signature counter. During registration it also carries the newly created credential.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    /// SHA-256 hash of the RP ID the credential is scoped to.
    rp_id_hash: [u8; 32],

    /// The flags representing the information of this credential. See [Flags] for more information.
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer. Authenticators without a counter
    /// always report `0`.
    pub counter: u32,

    /// The credential created during registration, only present when [`Flags::AT`] is set.
    pub attested_credential_data: Option<AttestedCredentialData>,

    /// Extension-defined authenticator data, a CBOR map present when [`Flags::ED`] is set.
    pub extensions: Option<Value>,
}

impl AuthenticatorData {
    /// Create a new AuthenticatorData scoped to `rp_id` with the given counter and no flags set.
    pub fn new(rp_id: &str, counter: u32) -> Self {
        Self {
            rp_id_hash: rp_id_hash(rp_id),
            flags: Flags::empty(),
            counter,
            attested_credential_data: None,
            extensions: None,
        }
    }

    /// Add an [`AttestedCredentialData`] to the authenticator data.
    ///
    /// This sets the [`Flags::AT`] value as well.
    pub fn set_attested_credential_data(mut self, acd: AttestedCredentialData) -> Self {
        self.attested_credential_data = Some(acd);
        self.set_flags(Flags::AT)
    }

    /// Set additional [`Flags`] to the authenticator data.
    pub fn set_flags(mut self, flags: Flags) -> Self {
        self.flags |= flags;
        self
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    /// Whether the authenticator tested for user presence.
    pub fn user_present(&self) -> bool {
        self.flags.contains(Flags::UP)
    }

    /// Whether the authenticator verified the user (biometrics, PIN, ...).
    pub fn user_verified(&self) -> bool {
        self.flags.contains(Flags::UV)
    }

    /// Decode authenticator data, rejecting truncated input and trailing bytes.
    pub fn from_slice(v: &[u8]) -> Result<Self, DecodeError> {
        if v.len() < FIXED_LEN {
            return Err(DecodeError::Truncated);
        }

        let (rp_id_hash, v) = v.split_at(32);
        let (flag_byte, v) = v.split_at(1);
        let (counter, v) = v.split_at(4);

        let flags = Flags::from(flag_byte[0]);
        let mut reader = Cursor::new(v);
        let attested_credential_data = flags
            .contains(Flags::AT)
            .then(|| AttestedCredentialData::from_reader(&mut reader))
            .transpose()?;
        let extensions = flags
            .contains(Flags::ED)
            .then(|| {
                let value: Value =
                    ciborium::de::from_reader(&mut reader).map_err(|_| DecodeError::InvalidCbor)?;
                if value.is_map() {
                    Ok(value)
                } else {
                    Err(DecodeError::UnexpectedType("extensions"))
                }
            })
            .transpose()?;

        let mut rest = Vec::new();
        reader
            .read_to_end(&mut rest)
            .map_err(|_| DecodeError::Truncated)?;
        if !rest.is_empty() {
            return Err(DecodeError::TrailingData);
        }

        let rp_id_hash = rp_id_hash.try_into().map_err(|_| DecodeError::Truncated)?;
        let counter = counter.try_into().map_err(|_| DecodeError::Truncated)?;
        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter: u32::from_be_bytes(counter),
            attested_credential_data,
            extensions,
        })
    }

    /// Encode an authenticator data to its byte representation.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut flags = self.flags;
        flags.set(Flags::AT, self.attested_credential_data.is_some());
        flags.set(Flags::ED, self.extensions.is_some());

        let mut bytes = Vec::with_capacity(FIXED_LEN);
        bytes.extend_from_slice(&self.rp_id_hash);
        bytes.push(flags.into());
        bytes.extend_from_slice(&self.counter.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            acd.write_to(&mut bytes);
        }
        if let Some(extensions) = &self.extensions {
            // SAFETY: writing a `Value` into a `Vec` cannot fail.
            ciborium::ser::into_writer(extensions, &mut bytes).unwrap();
        }
        bytes
    }
}

/// Attested credential data is a variable-length byte array added to the authenticator data when
/// generating an attestation object for a credential
///
/// <https://w3c.github.io/webauthn/#attested-credential-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    /// The credential ID. Not public so that its length stays within [`MAX_CREDENTIAL_ID_LEN`].
    credential_id: Vec<u8>,

    /// The credential public key encoded in COSE_Key format, as defined in Section 7 of [RFC9052].
    ///
    /// [RFC9052]: https://www.rfc-editor.org/rfc/rfc9052
    pub key: CoseKey,
}

impl AttestedCredentialData {
    /// Create a new [AttestedCredentialData]
    ///
    /// # Error
    /// Returns [`DecodeError::CredentialIdTooLong`] if `credential_id` exceeds
    /// [`MAX_CREDENTIAL_ID_LEN`] bytes.
    pub fn new(aaguid: Aaguid, credential_id: Vec<u8>, key: CoseKey) -> Result<Self, DecodeError> {
        if credential_id.len() > MAX_CREDENTIAL_ID_LEN {
            return Err(DecodeError::CredentialIdTooLong);
        }

        Ok(Self {
            aaguid,
            credential_id,
            key,
        })
    }

    /// Get read access to the credential ID,
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The credential public key in its COSE_Key byte encoding, the form in which relying parties
    /// store it.
    pub fn public_key_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        self.key
            .clone()
            .to_vec()
            .map_err(|_| DecodeError::InvalidCoseKey)
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.aaguid.0);
        // SAFETY: the constructor and decoder bound the length to MAX_CREDENTIAL_ID_LEN.
        let len = u16::try_from(self.credential_id.len()).unwrap();
        bytes.extend_from_slice(&len.to_be_bytes());
        bytes.extend_from_slice(&self.credential_id);
        // SAFETY: coset only fails to serialize keys it could not have built.
        bytes.extend(self.key.clone().to_vec().unwrap());
    }

    fn from_reader<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut aaguid = [0; Aaguid::LEN];
        reader
            .read_exact(&mut aaguid)
            .map_err(|_| DecodeError::Truncated)?;

        let mut cred_len = [0; 2];
        reader
            .read_exact(&mut cred_len)
            .map_err(|_| DecodeError::Truncated)?;
        let cred_len: usize = u16::from_be_bytes(cred_len).into();
        if cred_len > MAX_CREDENTIAL_ID_LEN {
            return Err(DecodeError::CredentialIdTooLong);
        }

        let mut credential_id = vec![0; cred_len];
        reader
            .read_exact(&mut credential_id)
            .map_err(|_| DecodeError::Truncated)?;

        let cose_val: Value =
            ciborium::de::from_reader(reader).map_err(|_| DecodeError::InvalidCbor)?;
        let key = CoseKey::from_cbor_value(cose_val).map_err(|_| DecodeError::InvalidCoseKey)?;

        Ok(Self {
            aaguid: Aaguid(aaguid),
            credential_id,
            key,
        })
    }
}
