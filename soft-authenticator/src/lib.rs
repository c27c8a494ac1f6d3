//! # Soft Authenticator
//!
//! A software authenticator bundled with the client half of the WebAuthn ceremonies. Given the
//! options a relying party produces, it answers with the same [`CreatedPublicKeyCredential`] and
//! [`AuthenticatedPublicKeyCredential`] a browser would post back, signed with a real key.
//!
//! It holds a single credential and keeps its private key in memory. Its only purpose is to drive
//! relying parties in tests and demos.

use coset::{
    iana::{self, EnumI64},
    CoseKey, CoseKeyBuilder,
};
use p256::{
    ecdsa::{signature::Signer, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey},
    SecretKey,
};
use relying_party_types::{
    authenticator::{
        Aaguid, AttestationObject, AttestationStatement, AttestedCredentialData,
        AuthenticatorData, Flags,
    },
    crypto::sha256,
    encoding,
    rand::random_vec,
    webauthn::{
        AuthenticatedPublicKeyCredential, AuthenticatorAssertionResponse, AuthenticatorAttachment,
        AuthenticatorAttestationResponse, AuthenticatorTransport, ClientDataType,
        CollectedClientData, CreatedPublicKeyCredential, CredentialCreationOptions,
        CredentialRequestOptions, PublicKeyCredential, PublicKeyCredentialType,
    },
    Bytes,
};
use url::Url;

mod error;

pub use self::error::AuthenticatorError;

/// The AAGUID this authenticator reports.
pub const AAGUID: Aaguid = Aaguid([
    0x50, 0x61, 0x73, 0x73, 0x6b, 0x65, 0x79, 0x20, 0x54, 0x65, 0x73, 0x74, 0x20, 0x4b, 0x65, 0x79,
]);

/// Signature algorithm of the credential the authenticator creates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// ECDSA on P-256 with SHA-256.
    #[default]
    Es256,
    /// Ed25519.
    EdDsa,
}

impl KeyAlgorithm {
    fn cose(self) -> iana::Algorithm {
        match self {
            KeyAlgorithm::Es256 => iana::Algorithm::ES256,
            KeyAlgorithm::EdDsa => iana::Algorithm::EdDSA,
        }
    }
}

/// How the signature counter behaves.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CounterMode {
    /// Starts at 0 on registration and increments before every assertion.
    #[default]
    Incrementing,
    /// Always 0, like authenticators without a counter.
    AlwaysZero,
}

/// The attestation statement returned at registration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AttestationFormat {
    /// `"none"`.
    #[default]
    None,
    /// `"packed"` self attestation, signed by the credential key.
    PackedSelf,
}

#[derive(Clone)]
enum PrivateKey {
    Es256(EcdsaSigningKey),
    EdDsa(ed25519_dalek::SigningKey),
}

impl PrivateKey {
    fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Es256 => {
                let mut rng = rand::thread_rng();
                PrivateKey::Es256(EcdsaSigningKey::from(SecretKey::random(&mut rng)))
            }
            KeyAlgorithm::EdDsa => {
                let mut rng = rand::thread_rng();
                PrivateKey::EdDsa(ed25519_dalek::SigningKey::generate(&mut rng))
            }
        }
    }

    fn algorithm(&self) -> iana::Algorithm {
        match self {
            PrivateKey::Es256(_) => iana::Algorithm::ES256,
            PrivateKey::EdDsa(_) => iana::Algorithm::EdDSA,
        }
    }

    fn public_cose_key(&self) -> CoseKey {
        match self {
            PrivateKey::Es256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                // SAFETY: These unwraps are safe because the point above is not compressed (false
                // parameter) therefore x and y are guaranteed to contain values.
                let x = point.x().unwrap().to_vec();
                let y = point.y().unwrap().to_vec();
                CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, x, y)
                    .algorithm(iana::Algorithm::ES256)
                    .build()
            }
            PrivateKey::EdDsa(key) => CoseKeyBuilder::new_okp_key()
                .param(
                    iana::OkpKeyParameter::Crv.to_i64(),
                    coset::cbor::value::Value::from(iana::EllipticCurve::Ed25519.to_i64()),
                )
                .param(
                    iana::OkpKeyParameter::X.to_i64(),
                    coset::cbor::value::Value::Bytes(key.verifying_key().to_bytes().to_vec()),
                )
                .algorithm(iana::Algorithm::EdDSA)
                .build(),
        }
    }

    /// Sign `authData || SHA-256(clientDataJSON)` in the encoding relying parties expect.
    fn sign(&self, auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
        let mut message = auth_data.to_vec();
        message.extend_from_slice(&sha256(client_data_json));
        match self {
            PrivateKey::Es256(key) => {
                let signature: EcdsaSignature = key.sign(&message);
                signature.to_der().as_bytes().to_vec()
            }
            PrivateKey::EdDsa(key) => {
                let signature: ed25519_dalek::Signature = key.sign(&message);
                signature.to_bytes().to_vec()
            }
        }
    }
}

#[derive(Clone)]
struct StoredCredential {
    id: Vec<u8>,
    rp_id: String,
    user_handle: Bytes,
    key: PrivateKey,
}

/// A software authenticator with an attached client, acting for a single origin.
///
/// Cloning it clones the credential and its counter, which is how a cloned authenticator is
/// simulated.
#[derive(Clone)]
pub struct SoftAuthenticator {
    origin: Url,
    algorithm: KeyAlgorithm,
    counter_mode: CounterMode,
    attestation: AttestationFormat,
    user_verified: bool,
    return_user_handle: bool,
    counter: u32,
    credential: Option<StoredCredential>,
}

impl SoftAuthenticator {
    /// Create an authenticator acting for `origin`, such as `http://localhost:3000`.
    pub fn new(origin: &str) -> Result<Self, AuthenticatorError> {
        let origin = Url::parse(origin).map_err(|_| AuthenticatorError::InvalidOrigin)?;
        if origin.domain().is_none() {
            return Err(AuthenticatorError::InvalidOrigin);
        }
        Ok(Self {
            origin,
            algorithm: KeyAlgorithm::default(),
            counter_mode: CounterMode::default(),
            attestation: AttestationFormat::default(),
            user_verified: true,
            return_user_handle: true,
            counter: 0,
            credential: None,
        })
    }

    /// Choose the algorithm of the next credential.
    pub fn algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Choose how the signature counter behaves.
    pub fn counter_mode(mut self, mode: CounterMode) -> Self {
        self.counter_mode = mode;
        self
    }

    /// Choose the attestation statement format.
    pub fn attestation(mut self, format: AttestationFormat) -> Self {
        self.attestation = format;
        self
    }

    /// Whether the authenticator reports the user as verified. Defaults to `true`.
    pub fn user_verified(mut self, verified: bool) -> Self {
        self.user_verified = verified;
        self
    }

    /// Whether assertions include the user handle. Defaults to `true`.
    pub fn return_user_handle(mut self, include: bool) -> Self {
        self.return_user_handle = include;
        self
    }

    /// The current signature counter.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Force the signature counter, e.g. to report a stale value.
    pub fn set_counter(&mut self, counter: u32) {
        self.counter = counter;
    }

    /// The id of the held credential, if one was created.
    pub fn credential_id(&self) -> Option<&[u8]> {
        self.credential.as_ref().map(|c| c.id.as_slice())
    }

    fn flags(&self) -> Flags {
        if self.user_verified {
            Flags::UP | Flags::UV
        } else {
            Flags::UP
        }
    }

    fn serialized_origin(&self) -> String {
        self.origin.origin().ascii_serialization()
    }

    fn effective_rp_id(&self, requested: Option<&str>) -> Result<String, AuthenticatorError> {
        let host = self.origin.domain().unwrap_or_default();
        let rp_id = requested.unwrap_or(host);
        let scoped = host == rp_id
            || host
                .strip_suffix(rp_id)
                .is_some_and(|prefix| prefix.ends_with('.'));
        if scoped {
            Ok(rp_id.to_owned())
        } else {
            Err(AuthenticatorError::RpIdMismatch)
        }
    }

    /// Perform `navigator.credentials.create()`: create a credential and attest it.
    pub fn register(
        &mut self,
        options: &CredentialCreationOptions,
    ) -> Result<CreatedPublicKeyCredential, AuthenticatorError> {
        let options = &options.public_key;
        let rp_id = self.effective_rp_id(options.rp.id.as_deref())?;

        let alg = self.algorithm.cose();
        if !options
            .pub_key_cred_params
            .iter()
            .any(|p| p.ty == PublicKeyCredentialType::PublicKey && p.alg == alg)
        {
            return Err(AuthenticatorError::UnsupportedAlgorithm);
        }
        if let (Some(held), Some(excluded)) = (&self.credential, &options.exclude_credentials) {
            if excluded.iter().any(|d| d.id.as_slice() == held.id.as_slice()) {
                return Err(AuthenticatorError::CredentialExcluded);
            }
        }

        let key = PrivateKey::generate(self.algorithm);
        let credential_id = random_vec(16);
        self.counter = 0;

        let client_data_json = CollectedClientData::new(
            ClientDataType::Create,
            &options.challenge,
            self.serialized_origin(),
        )
        .to_json_bytes();

        let auth_data = AuthenticatorData::new(&rp_id, self.counter)
            .set_flags(self.flags())
            .set_attested_credential_data(
                AttestedCredentialData::new(AAGUID, credential_id.clone(), key.public_cose_key())
                    .map_err(|_| AuthenticatorError::UnsupportedAlgorithm)?,
            );

        let att_stmt = match self.attestation {
            AttestationFormat::None => AttestationStatement::None,
            AttestationFormat::PackedSelf => AttestationStatement::Packed {
                alg: key.algorithm().to_i64(),
                sig: key.sign(&auth_data.to_vec(), &client_data_json),
                x5c: None,
            },
        };
        let attestation_object = AttestationObject::new(att_stmt, auth_data);

        self.credential = Some(StoredCredential {
            id: credential_id.clone(),
            rp_id,
            user_handle: options.user.id.clone(),
            key,
        });
        log::debug!("created a {alg:?} credential");

        Ok(PublicKeyCredential {
            id: encoding::base64url(&credential_id),
            raw_id: credential_id.into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAttestationResponse {
                client_data_json: client_data_json.into(),
                attestation_object: attestation_object.to_vec().into(),
                transports: Some(vec![AuthenticatorTransport::Internal]),
            },
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
            client_extension_results: Default::default(),
        })
    }

    /// Perform `navigator.credentials.get()`: sign the challenge with the held credential.
    pub fn authenticate(
        &mut self,
        options: &CredentialRequestOptions,
    ) -> Result<AuthenticatedPublicKeyCredential, AuthenticatorError> {
        let options = &options.public_key;
        let rp_id = self.effective_rp_id(options.rp_id.as_deref())?;

        let credential = self
            .credential
            .as_ref()
            .filter(|c| c.rp_id == rp_id)
            .ok_or(AuthenticatorError::NoCredentials)?;
        if let Some(allowed) = &options.allow_credentials {
            if !allowed.iter().any(|d| d.id.as_slice() == credential.id.as_slice()) {
                return Err(AuthenticatorError::NoCredentials);
            }
        }

        let counter = match self.counter_mode {
            CounterMode::Incrementing => self.counter.wrapping_add(1),
            CounterMode::AlwaysZero => 0,
        };

        let client_data_json = CollectedClientData::new(
            ClientDataType::Get,
            &options.challenge,
            self.serialized_origin(),
        )
        .to_json_bytes();
        let auth_data = AuthenticatorData::new(&rp_id, counter)
            .set_flags(self.flags())
            .to_vec();
        let signature = credential.key.sign(&auth_data, &client_data_json);

        let response = PublicKeyCredential {
            id: encoding::base64url(&credential.id),
            raw_id: credential.id.clone().into(),
            ty: PublicKeyCredentialType::PublicKey,
            response: AuthenticatorAssertionResponse {
                client_data_json: client_data_json.into(),
                authenticator_data: auth_data.into(),
                signature: signature.into(),
                user_handle: self
                    .return_user_handle
                    .then(|| credential.user_handle.clone()),
            },
            authenticator_attachment: Some(AuthenticatorAttachment::Platform),
            client_extension_results: Default::default(),
        };
        self.counter = counter;
        Ok(response)
    }
}
