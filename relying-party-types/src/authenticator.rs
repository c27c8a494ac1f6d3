//! Binary structures produced by authenticators, as defined in [WebAuthn Level 3] and encoded
//! according to [CTAP 2.0].
//!
//! A relying party only ever decodes these; the encoders exist so software authenticators used in
//! tests produce byte-for-byte what a hardware key would.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn
//! [CTAP 2.0]: https://fidoalliance.org/specs/fido-v2.0-ps-20190130/fido-client-to-authenticator-protocol-v2.0-ps-20190130.html

mod aaguid;
mod attestation_object;
mod data;
mod error;
mod flags;

pub use self::{aaguid::*, attestation_object::*, data::*, error::*, flags::*};
