//! Types exchanged with the browser through `navigator.credentials.create()` and
//! `navigator.credentials.get()`, following [WebAuthn Level 3].
//!
//! Options go out to the browser, credentials come back. Every binary member is a [`Bytes`] so
//! that the JSON produced by `PublicKeyCredential.toJSON()` deserializes directly.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::{utils::serde::ignore_unknown, Bytes};

mod assertion;
mod attestation;
mod client_data;
mod common;

// re-export types
pub use self::{assertion::*, attestation::*, client_data::*, common::*};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::AuthenticatorAssertionResponse {}
    impl Sealed for super::AuthenticatorAttestationResponse {}
}

/// Marker trait for the two kinds of authenticator responses.
pub trait AuthenticatorResponse: sealed::Sealed {}

impl AuthenticatorResponse for AuthenticatorAssertionResponse {}
impl AuthenticatorResponse for AuthenticatorAttestationResponse {}

/// A credential returned by the browser after a successful ceremony.
///
/// Use the aliases rather than naming the response type:
/// * registration: [CreatedPublicKeyCredential]
/// * authentication: [AuthenticatedPublicKeyCredential]
///
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[typeshare]
pub struct PublicKeyCredential<R: AuthenticatorResponse> {
    /// The base64url encoding of [Self::raw_id].
    pub id: String,

    /// The credential ID chosen by the authenticator.
    pub raw_id: Bytes,

    /// Always [`PublicKeyCredentialType::PublicKey`] for well-formed responses.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The authenticator's signed response.
    pub response: R,

    /// How the authenticator was attached to the client, when the browser reports it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Client extension outputs. No extension is processed, they are kept opaque.
    #[serde(default)]
    pub client_extension_results: IndexMap<String, serde_json::Value>,
}
