use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use typeshare::typeshare;

use crate::{encoding, Bytes};

/// The contextual bindings the browser hands to the authenticator: the ceremony type, the
/// challenge and the calling origin. The authenticator signs over the SHA-256 of its JSON bytes.
///
/// Parsing tolerates unknown keys and reordering. Serializing emits `type`, `challenge`,
/// `origin` and `crossOrigin` first and then the unknown keys in their original order, which is
/// the byte layout browsers produce.
///
/// <https://w3c.github.io/webauthn/#dictionary-client-data>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// Which ceremony produced this client data.
    #[serde(rename = "type")]
    pub ty: ClientDataType,

    /// The base64url encoding of the relying party's challenge.
    pub challenge: String,

    /// The fully qualified origin of the caller, e.g. `https://example.com:8443`.
    pub origin: String,

    /// Set when the call came from an iframe of a different origin than its ancestors.
    #[serde(default, serialize_with = "truthiness")]
    pub cross_origin: Option<bool>,

    /// Keys this crate does not know about, such as `topOrigin` or `tokenBinding`.
    #[serde(flatten)]
    pub unknown_keys: IndexMap<String, serde_json::Value>,
}

impl CollectedClientData {
    /// Client data for a ceremony of type `ty` over `challenge`, issued from `origin`.
    pub fn new(ty: ClientDataType, challenge: &[u8], origin: impl Into<String>) -> Self {
        Self {
            ty,
            challenge: encoding::base64url(challenge),
            origin: origin.into(),
            cross_origin: None,
            unknown_keys: IndexMap::new(),
        }
    }

    /// Decode the challenge. Browsers send it unpadded base64url but padded input is tolerated.
    pub fn challenge_bytes(&self) -> Option<Bytes> {
        Bytes::try_from(self.challenge.as_str()).ok()
    }

    /// Whether the browser flagged the call as cross-origin.
    pub fn is_cross_origin(&self) -> bool {
        self.cross_origin.unwrap_or(false)
    }

    /// The JSON bytes of this client data, as they would reach the authenticator.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        // SAFETY: a struct of strings and JSON values always serializes.
        serde_json::to_vec(self).unwrap()
    }
}

fn truthiness<S>(cross_origin: &Option<bool>, ser: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    ser.serialize_bool(cross_origin.filter(|b| *b).is_some())
}

/// The ceremony recorded in [`CollectedClientData::ty`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[typeshare]
pub enum ClientDataType {
    /// `"webauthn.create"`, a registration.
    #[serde(rename = "webauthn.create")]
    Create,

    /// `"webauthn.get"`, an authentication.
    #[serde(rename = "webauthn.get")]
    Get,
}

impl fmt::Display for ClientDataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ClientDataType::Create => "webauthn.create",
            ClientDataType::Get => "webauthn.get",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_browser_client_data_with_extra_keys() {
        let json = br#"{"type":"webauthn.get","challenge":"AQID","origin":"http://localhost:3000","crossOrigin":false,"other_keys_can_be_added_here":"do not compare clientDataJSON against a template. See https://goo.gl/yabPex"}"#;

        let client_data: CollectedClientData = serde_json::from_slice(json).unwrap();
        assert_eq!(client_data.ty, ClientDataType::Get);
        assert_eq!(client_data.challenge_bytes(), Some(Bytes::from(vec![1, 2, 3])));
        assert_eq!(client_data.origin, "http://localhost:3000");
        assert!(!client_data.is_cross_origin());
        assert_eq!(client_data.unknown_keys.len(), 1);

        // Byte-exact re-serialization keeps the signed hash stable.
        assert_eq!(client_data.to_json_bytes(), json.to_vec());
    }

    #[test]
    fn missing_cross_origin_serializes_as_false() {
        let client_data =
            CollectedClientData::new(ClientDataType::Create, &[1, 2, 3], "https://example.com");
        let json = String::from_utf8(client_data.to_json_bytes()).unwrap();
        assert_eq!(
            json,
            r#"{"type":"webauthn.create","challenge":"AQID","origin":"https://example.com","crossOrigin":false}"#
        );
    }

    #[test]
    fn cross_origin_true_is_reported() {
        let json = br#"{"type":"webauthn.create","challenge":"AQID","origin":"https://evil.example","crossOrigin":true}"#;
        let client_data: CollectedClientData = serde_json::from_slice(json).unwrap();
        assert!(client_data.is_cross_origin());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let json = br#"{"type":"payment.get","challenge":"AQID","origin":"https://example.com"}"#;
        assert!(serde_json::from_slice::<CollectedClientData>(json).is_err());
    }

    #[test]
    fn display_matches_wire_value() {
        assert_eq!(ClientDataType::Create.to_string(), "webauthn.create");
        assert_eq!(ClientDataType::Get.to_string(), "webauthn.get");
    }
}
