//! Checks shared by the registration and authentication ceremonies.
//!
//! Every check returns a [`Rejected`] naming what failed. Ceremonies log the reason and collapse it
//! into a single [`Error`](crate::Error) kind.

use std::fmt;

use coset::{
    iana::{self, EnumI64},
    CborSerializable, CoseKey, Label, RegisteredLabel, RegisteredLabelWithPrivate,
};
use p256::{
    ecdsa::{signature::Verifier, Signature as EcdsaSignature, VerifyingKey as EcdsaKey},
    EncodedPoint, FieldBytes,
};
use relying_party_types::{
    authenticator::AuthenticatorData,
    crypto::{rp_id_hash, sha256},
    webauthn::{ClientDataType, CollectedClientData, UserVerificationRequirement},
};

/// The reason a response was rejected. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rejected(pub &'static str);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Check `clientDataJSON` against the ceremony, the issued nonce and the configured origin.
pub(crate) fn check_client_data(
    client_data_json: &[u8],
    ty: ClientDataType,
    nonce: &[u8],
    origin: &str,
) -> Result<(), Rejected> {
    let client_data: CollectedClientData = serde_json::from_slice(client_data_json)
        .map_err(|_| Rejected("client data is not valid JSON"))?;
    if client_data.ty != ty {
        return Err(Rejected("client data type does not match the ceremony"));
    }
    if client_data.challenge_bytes().as_deref().map(Vec::as_slice) != Some(nonce) {
        return Err(Rejected("client data challenge does not match the issued nonce"));
    }
    if client_data.origin != origin {
        return Err(Rejected("client data origin does not match"));
    }
    if client_data.is_cross_origin() {
        return Err(Rejected("cross-origin request"));
    }
    Ok(())
}

/// Check the RP ID hash and the user presence and verification flags.
pub(crate) fn check_authenticator_data(
    auth_data: &AuthenticatorData,
    rp_id: &str,
    user_verification: UserVerificationRequirement,
) -> Result<(), Rejected> {
    if auth_data.rp_id_hash() != &rp_id_hash(rp_id) {
        return Err(Rejected("RP ID hash mismatch"));
    }
    if !auth_data.user_present() {
        return Err(Rejected("user presence flag not set"));
    }
    if user_verification == UserVerificationRequirement::Required && !auth_data.user_verified() {
        return Err(Rejected("user verification required but flag not set"));
    }
    Ok(())
}

/// The message authenticators sign: `authenticatorData || SHA-256(clientDataJSON)`.
pub(crate) fn signed_message(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut message = auth_data.to_vec();
    message.extend_from_slice(&sha256(client_data_json));
    message
}

/// A credential public key the relying party can verify signatures with.
#[derive(Debug, Clone)]
pub(crate) enum CredentialPublicKey {
    /// ECDSA over P-256 with SHA-256, DER encoded signatures.
    Es256(EcdsaKey),
    /// Ed25519, raw 64 byte signatures.
    EdDsa(ed25519_dalek::VerifyingKey),
}

impl CredentialPublicKey {
    /// Decode a COSE_Key as stored in a [`Credential`](crate::Credential).
    pub(crate) fn from_cose_slice(bytes: &[u8]) -> Result<Self, Rejected> {
        let key = CoseKey::from_slice(bytes).map_err(|_| Rejected("malformed COSE key"))?;
        Self::from_cose_key(&key)
    }

    pub(crate) fn from_cose_key(key: &CoseKey) -> Result<Self, Rejected> {
        match key.kty {
            RegisteredLabel::Assigned(iana::KeyType::EC2) => {
                check_key_alg(key, iana::Algorithm::ES256)?;
                Self::ec2_from_params(key)
            }
            RegisteredLabel::Assigned(iana::KeyType::OKP) => {
                check_key_alg(key, iana::Algorithm::EdDSA)?;
                Self::okp_from_params(key)
            }
            _ => Err(Rejected("unsupported COSE key type")),
        }
    }

    fn ec2_from_params(key: &CoseKey) -> Result<Self, Rejected> {
        let (mut crv, mut x, mut y) = (None, None, None);
        for (label, value) in &key.params {
            let Label::Int(i) = label else { continue };
            match iana::Ec2KeyParameter::from_i64(*i) {
                Some(iana::Ec2KeyParameter::Crv) => {
                    crv = value.as_integer().and_then(|c| i64::try_from(c).ok())
                }
                Some(iana::Ec2KeyParameter::X) => {
                    if value.as_bytes().and_then(|v| x.replace(v)).is_some() {
                        log::warn!("Cose key has multiple entries for X coordinate");
                    }
                }
                Some(iana::Ec2KeyParameter::Y) => {
                    if value.as_bytes().and_then(|v| y.replace(v)).is_some() {
                        log::warn!("Cose key has multiple entries for Y coordinate");
                    }
                }
                _ => (),
            }
        }

        if crv != Some(iana::EllipticCurve::P_256.to_i64()) {
            return Err(Rejected("EC2 key is not on P-256"));
        }
        let (Some(x), Some(y)) = (x, y) else {
            return Err(Rejected("EC2 key is missing a coordinate"));
        };
        if x.len() != 32 || y.len() != 32 {
            return Err(Rejected("EC2 coordinate has the wrong length"));
        }

        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(x),
            FieldBytes::from_slice(y),
            false,
        );
        EcdsaKey::from_encoded_point(&point)
            .map(CredentialPublicKey::Es256)
            .map_err(|_| Rejected("EC2 key is not a point on the curve"))
    }

    fn okp_from_params(key: &CoseKey) -> Result<Self, Rejected> {
        let (mut crv, mut x) = (None, None);
        for (label, value) in &key.params {
            let Label::Int(i) = label else { continue };
            match iana::OkpKeyParameter::from_i64(*i) {
                Some(iana::OkpKeyParameter::Crv) => {
                    crv = value.as_integer().and_then(|c| i64::try_from(c).ok())
                }
                Some(iana::OkpKeyParameter::X) => x = value.as_bytes(),
                _ => (),
            }
        }

        if crv != Some(iana::EllipticCurve::Ed25519.to_i64()) {
            return Err(Rejected("OKP key is not Ed25519"));
        }
        let x: &[u8; 32] = x
            .and_then(|x| x.as_slice().try_into().ok())
            .ok_or(Rejected("Ed25519 key has the wrong length"))?;
        ed25519_dalek::VerifyingKey::from_bytes(x)
            .map(CredentialPublicKey::EdDsa)
            .map_err(|_| Rejected("Ed25519 key is not a valid point"))
    }

    /// The COSE algorithm this key signs with.
    pub(crate) fn algorithm(&self) -> iana::Algorithm {
        match self {
            CredentialPublicKey::Es256(_) => iana::Algorithm::ES256,
            CredentialPublicKey::EdDsa(_) => iana::Algorithm::EdDSA,
        }
    }

    /// Verify `signature` over `message`.
    pub(crate) fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), Rejected> {
        match self {
            CredentialPublicKey::Es256(key) => {
                let signature = EcdsaSignature::from_der(signature)
                    .map_err(|_| Rejected("malformed ECDSA signature"))?;
                key.verify(message, &signature)
                    .map_err(|_| Rejected("bad signature"))
            }
            CredentialPublicKey::EdDsa(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .map_err(|_| Rejected("malformed Ed25519 signature"))?;
                key.verify_strict(message, &signature)
                    .map_err(|_| Rejected("bad signature"))
            }
        }
    }
}

/// A key's optional `alg` must agree with its key type.
fn check_key_alg(key: &CoseKey, expected: iana::Algorithm) -> Result<(), Rejected> {
    match &key.alg {
        None => Ok(()),
        Some(RegisteredLabelWithPrivate::Assigned(alg)) if *alg == expected => Ok(()),
        Some(_) => Err(Rejected("COSE key algorithm does not match its key type")),
    }
}

#[cfg(test)]
mod tests {
    use coset::CoseKeyBuilder;
    use p256::ecdsa::{signature::Signer, SigningKey};
    use relying_party_types::{authenticator::Flags, encoding, rand::random_vec};

    use super::*;

    fn p256_cose(key: &SigningKey) -> CoseKey {
        let point = key.verifying_key().to_encoded_point(false);
        CoseKeyBuilder::new_ec2_pub_key(
            iana::EllipticCurve::P_256,
            point.x().unwrap().to_vec(),
            point.y().unwrap().to_vec(),
        )
        .algorithm(iana::Algorithm::ES256)
        .build()
    }

    #[test]
    fn es256_signature_verifies() {
        let signing_key = SigningKey::from_slice(&random_vec(32)).unwrap();
        let key = CredentialPublicKey::from_cose_slice(&p256_cose(&signing_key).to_vec().unwrap())
            .unwrap();
        assert_eq!(key.algorithm(), iana::Algorithm::ES256);

        let signature: EcdsaSignature = signing_key.sign(b"authenticator data");
        let der = signature.to_der();
        assert!(key.verify(b"authenticator data", der.as_bytes()).is_ok());
        assert_eq!(
            key.verify(b"authenticator dat4", der.as_bytes()),
            Err(Rejected("bad signature"))
        );
        // WebAuthn ES256 signatures are DER, raw r||s is refused
        assert!(key.verify(b"authenticator data", &signature.to_bytes()).is_err());
    }

    #[test]
    fn eddsa_signature_verifies() {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(&[7; 32]);
        let cose = CoseKeyBuilder::new_okp_key()
            .param(
                iana::OkpKeyParameter::Crv.to_i64(),
                coset::cbor::value::Value::from(iana::EllipticCurve::Ed25519.to_i64()),
            )
            .param(
                iana::OkpKeyParameter::X.to_i64(),
                coset::cbor::value::Value::Bytes(signing_key.verifying_key().to_bytes().to_vec()),
            )
            .algorithm(iana::Algorithm::EdDSA)
            .build();

        let key = CredentialPublicKey::from_cose_key(&cose).unwrap();
        assert_eq!(key.algorithm(), iana::Algorithm::EdDSA);
        let signature = signing_key.sign(b"message");
        assert!(key.verify(b"message", &signature.to_bytes()).is_ok());
        assert!(key.verify(b"massage", &signature.to_bytes()).is_err());
    }

    #[test]
    fn rejects_mismatched_algorithm_and_curve() {
        let signing_key = SigningKey::from_slice(&random_vec(32)).unwrap();
        let mut cose = p256_cose(&signing_key);
        cose.alg = Some(RegisteredLabelWithPrivate::Assigned(iana::Algorithm::EdDSA));
        assert!(CredentialPublicKey::from_cose_key(&cose).is_err());

        let point = signing_key.verifying_key().to_encoded_point(false);
        let p384 = CoseKeyBuilder::new_ec2_pub_key(
            iana::EllipticCurve::P_384,
            point.x().unwrap().to_vec(),
            point.y().unwrap().to_vec(),
        )
        .build();
        assert_eq!(
            CredentialPublicKey::from_cose_key(&p384).unwrap_err(),
            Rejected("EC2 key is not on P-256")
        );

        let off_curve =
            CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, vec![1; 32], vec![2; 32])
                .build();
        assert!(CredentialPublicKey::from_cose_key(&off_curve).is_err());
    }

    #[test]
    fn client_data_checks() {
        let nonce = random_vec(32);
        let good = format!(
            r#"{{"type":"webauthn.get","challenge":"{}","origin":"https://example.com"}}"#,
            encoding::base64url(&nonce)
        );
        assert!(check_client_data(
            good.as_bytes(),
            ClientDataType::Get,
            &nonce,
            "https://example.com"
        )
        .is_ok());
        assert_eq!(
            check_client_data(
                good.as_bytes(),
                ClientDataType::Create,
                &nonce,
                "https://example.com"
            ),
            Err(Rejected("client data type does not match the ceremony"))
        );
        assert!(check_client_data(
            good.as_bytes(),
            ClientDataType::Get,
            &random_vec(32),
            "https://example.com"
        )
        .is_err());
        assert!(check_client_data(
            good.as_bytes(),
            ClientDataType::Get,
            &nonce,
            "https://evil.example.com"
        )
        .is_err());
        assert!(check_client_data(b"not json", ClientDataType::Get, &nonce, "x").is_err());
    }

    #[test]
    fn authenticator_data_checks() {
        let present = AuthenticatorData::new("example.com", 1).set_flags(Flags::UP);
        assert!(
            check_authenticator_data(&present, "example.com", UserVerificationRequirement::Preferred)
                .is_ok()
        );
        assert_eq!(
            check_authenticator_data(&present, "example.com", UserVerificationRequirement::Required),
            Err(Rejected("user verification required but flag not set"))
        );
        assert_eq!(
            check_authenticator_data(&present, "other.com", UserVerificationRequirement::Preferred),
            Err(Rejected("RP ID hash mismatch"))
        );

        let absent = AuthenticatorData::new("example.com", 1);
        assert_eq!(
            check_authenticator_data(&absent, "example.com", UserVerificationRequirement::Discouraged),
            Err(Rejected("user presence flag not set"))
        );
    }
}
