//! Types used during registration.

use coset::iana;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{i64_to_iana, ignore_unknown, ignore_unknown_opt_vec},
    webauthn::{
        AuthenticatorAttachment, AuthenticatorTransport, PublicKeyCredential,
        PublicKeyCredentialDescriptor, PublicKeyCredentialType, UserVerificationRequirement,
    },
    Bytes,
};

#[cfg(doc)]
use crate::{authenticator::AttestationObject, webauthn::CollectedClientData};

/// The credential returned by `navigator.credentials.create()`.
#[typeshare]
pub type CreatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAttestationResponse>;

/// The argument to [`navigator.credentials.create`].
///
/// [`navigator.credentials.create`]: https://developer.mozilla.org/en-US/docs/Web/API/CredentialsContainer/create
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct CredentialCreationOptions {
    /// The webauthn part of the request.
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// Parameters for creating a new credential.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialCreationOptions {
    /// The relying party the credential will be scoped to.
    pub rp: PublicKeyCredentialRpEntity,

    /// The user account the credential is created for.
    pub user: PublicKeyCredentialUserEntity,

    /// The single-use challenge the authenticator signs over.
    pub challenge: Bytes,

    /// Accepted key types and signature algorithms, most preferred first.
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,

    /// How long, in milliseconds, the relying party is willing to wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// Credentials already registered for this user, so that an authenticator holding one of them
    /// does not create a duplicate.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// Requirements on the authenticator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// Whether the relying party wants an attestation statement.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub attestation: AttestationConveyancePreference,
}

/// The relying party as presented to the user.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrpentity>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialRpEntity {
    /// The RP ID, a registrable domain suffix of the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name of the relying party.
    pub name: String,
}

/// The user account a credential is created for.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialuserentity>
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle: opaque, at most 64 bytes and free of personal information. Authenticators
    /// return it as [`AuthenticatorAssertionResponse::user_handle`](crate::webauthn::AuthenticatorAssertionResponse::user_handle).
    pub id: Bytes,

    /// Name shown to the user, such as "Alex Müller".
    pub display_name: String,

    /// Account identifier shown to the user, such as "alexm".
    pub name: String,
}

/// A key type and signature algorithm the relying party accepts.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialparameters>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[typeshare]
pub struct PublicKeyCredentialParameters {
    /// The credential type.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The COSE algorithm identifier.
    #[serde(with = "i64_to_iana")]
    #[typeshare(serialized_as = "I54")] // because i64 fails for js
    pub alg: iana::Algorithm,
}

impl PublicKeyCredentialParameters {
    /// A public key credential parameter for `alg`.
    pub fn public_key(alg: iana::Algorithm) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }
}

/// Relying party requirements on the authenticator.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorSelectionCriteria {
    /// Restrict the ceremony to platform or roaming authenticators.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown",
        default
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Whether a discoverable credential should be created.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown",
        default
    )]
    pub resident_key: Option<ResidentKeyRequirement>,

    /// Legacy boolean form of [`Self::resident_key`].
    #[serde(default)]
    pub require_resident_key: bool,

    /// The user verification requirement of the registration.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,
}

/// Preference for client-side discoverable credentials.
///
/// <https://w3c.github.io/webauthn/#enumdef-residentkeyrequirement>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum ResidentKeyRequirement {
    /// Prefer a server-side credential.
    Discouraged,
    /// Prefer a discoverable credential.
    Preferred,
    /// Fail unless a discoverable credential can be created.
    Required,
}

/// Whether and how the relying party wants to receive attestation.
///
/// <https://w3c.github.io/webauthn/#enumdef-attestationconveyancepreference>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AttestationConveyancePreference {
    /// No attestation wanted. Unknown values fall back to this.
    #[default]
    None,
    /// Attestation wanted, the client may anonymize it.
    Indirect,
    /// The attestation exactly as the authenticator produced it.
    Direct,
    /// Uniquely identifying attestation for managed deployments.
    Enterprise,
}

/// The authenticator's answer to a registration request.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorattestationresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare(swift = "Equatable, Hashable")]
pub struct AuthenticatorAttestationResponse {
    /// The exact bytes of the JSON [`CollectedClientData`] the authenticator signed over. They must
    /// not be re-serialized before hashing.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// The CBOR [`AttestationObject`].
    pub attestation_object: Bytes,

    /// Transports the authenticator believes it supports.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}
