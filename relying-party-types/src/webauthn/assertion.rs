//! Types used during authentication.

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    webauthn::{PublicKeyCredential, PublicKeyCredentialDescriptor, UserVerificationRequirement},
    Bytes,
};

#[cfg(doc)]
use crate::{
    authenticator::AuthenticatorData,
    webauthn::{CollectedClientData, PublicKeyCredentialUserEntity},
};

/// The credential returned by `navigator.credentials.get()`.
#[typeshare]
pub type AuthenticatedPublicKeyCredential = PublicKeyCredential<AuthenticatorAssertionResponse>;

/// The argument to [`navigator.credentials.get`].
///
/// [`navigator.credentials.get`]: https://developer.mozilla.org/en-US/docs/Web/API/CredentialsContainer/get
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct CredentialRequestOptions {
    /// The webauthn part of the request.
    pub public_key: PublicKeyCredentialRequestOptions,
}

/// Parameters for requesting an assertion from an existing credential.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrequestoptions>
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredentialRequestOptions {
    /// The single-use challenge the authenticator signs over.
    pub challenge: Bytes,

    /// How long, in milliseconds, the relying party is willing to wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// The RP ID the credential must be scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,

    /// The credentials acceptable for this ceremony. When the account is known this lists its
    /// credentials; otherwise it is left out and only discoverable credentials are offered.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// The user verification requirement of the authentication.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,
}

/// The authenticator's answer to an authentication request.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorassertionresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct AuthenticatorAssertionResponse {
    /// The exact bytes of the JSON [`CollectedClientData`] the authenticator signed over.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// The encoded [`AuthenticatorData`].
    pub authenticator_data: Bytes,

    /// Signature over `authenticatorData || SHA-256(clientDataJSON)`.
    pub signature: Bytes,

    /// The [`PublicKeyCredentialUserEntity::id`] given at registration, when the authenticator
    /// returns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_options_omit_absent_members() {
        let options = PublicKeyCredentialRequestOptions {
            challenge: vec![1; 32].into(),
            timeout: None,
            rp_id: Some("example.com".into()),
            allow_credentials: Some(vec![PublicKeyCredentialDescriptor::public_key(
                vec![1, 2, 3].into(),
            )]),
            user_verification: UserVerificationRequirement::Required,
        };

        let json = serde_json::to_value(&options).unwrap();
        assert!(json.get("timeout").is_none());
        assert_eq!(json["rpId"], "example.com");
        assert_eq!(json["userVerification"], "required");
        assert_eq!(
            json["allowCredentials"],
            serde_json::json!([{ "type": "public-key", "id": "AQID" }])
        );
    }

    #[test]
    fn null_user_handle_is_absent() {
        let json = r#"{
            "id": "AQID",
            "rawId": "AQID",
            "type": "public-key",
            "response": {
                "clientDataJSON": "e30",
                "authenticatorData": "AAAA",
                "signature": "MEQ",
                "userHandle": null
            }
        }"#;

        let credential: AuthenticatedPublicKeyCredential = serde_json::from_str(json).unwrap();
        assert!(credential.response.user_handle.is_none());
        assert!(credential.client_extension_results.is_empty());
    }
}
