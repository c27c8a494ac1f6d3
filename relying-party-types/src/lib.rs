//! # Relying Party Types
//!
//! Rust type definitions for the parts of the [WebAuthn Level 3] specification that a
//! Relying Party exchanges with browsers and authenticators:
//!
//! * [`webauthn`] holds the options sent to `navigator.credentials.create()`/`get()` and the
//!   credential responses sent back, ready for (de)serialization from the browser's JSON.
//! * [`authenticator`] decodes the binary structures produced by authenticators: the
//!   authenticator data, attested credential data and the CBOR attestation object.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

mod utils;

pub mod authenticator;
pub mod webauthn;

// Re-exports
pub use utils::{
    bytes::{Bytes, NotBase64Encoded},
    crypto, encoding, rand,
};
