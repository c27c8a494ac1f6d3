//! Types shared by registration and authentication.

use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    Bytes,
};

#[cfg(doc)]
use crate::webauthn::{PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions};

/// The kind of credential. Only public key credentials exist today.
///
/// <https://w3c.github.io/webauthn/#enumdef-publickeycredentialtype>
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum PublicKeyCredentialType {
    /// The `"public-key"` credential type.
    PublicKey,
    /// Any value this crate does not know about. Unknown values deserialize to this variant.
    #[default]
    Unknown,
}

/// Points at a specific credential, used in
/// [`PublicKeyCredentialCreationOptions::exclude_credentials`] and
/// [`PublicKeyCredentialRequestOptions::allow_credentials`].
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[typeshare]
pub struct PublicKeyCredentialDescriptor {
    /// The credential type.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The credential ID.
    pub id: Bytes,

    /// Transport hints for reaching the authenticator holding the credential.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// A public key credential descriptor for `id` without transport hints.
    pub fn public_key(id: Bytes) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            id,
            transports: None,
        }
    }
}

/// How strongly a relying party wants the authenticator to verify the user (PIN, biometrics).
///
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum UserVerificationRequirement {
    /// Fail the ceremony unless the UV flag is set.
    Required,

    /// Ask for user verification but accept responses without it.
    #[default]
    Preferred,

    /// Ask the authenticator not to verify the user.
    Discouraged,
}

/// Transports over which an authenticator may be reached.
///
/// <https://w3c.github.io/webauthn/#enum-transport>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorTransport {
    /// Removable USB.
    Usb,
    /// Near Field Communication.
    Nfc,
    /// Bluetooth Low Energy.
    Ble,
    /// Cross-device, for example a phone used to sign in on a desktop.
    #[serde(alias = "cable")]
    Hybrid,
    /// Built into the client device.
    Internal,
}

/// Whether the authenticator is built into the client device or roams between devices.
///
/// <https://w3c.github.io/webauthn/#enumdef-authenticatorattachment>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[typeshare(serialized_as = "String")]
pub enum AuthenticatorAttachment {
    /// A platform authenticator.
    Platform,
    /// A roaming authenticator such as a security key.
    CrossPlatform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_transports_are_dropped() {
        let json = r#"{"type":"public-key","id":"AQID","transports":["usb","smoke-signal","cable"]}"#;
        let descriptor: PublicKeyCredentialDescriptor = serde_json::from_str(json).unwrap();

        assert_eq!(descriptor.id, Bytes::from(vec![1, 2, 3]));
        assert_eq!(
            descriptor.transports,
            Some(vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Hybrid])
        );
    }

    #[test]
    fn unknown_credential_type_is_not_an_error() {
        let json = r#"{"type":"password","id":"AQID"}"#;
        let descriptor: PublicKeyCredentialDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.ty, PublicKeyCredentialType::Unknown);
    }
}
