//! Stateless session tokens.
//!
//! A token is `base64url(payload) "." base64url(HMAC-SHA256(key, base64url(payload)))` where the
//! payload is the JSON `{"sub":…,"iat":…,"exp":…}` with times in Unix seconds. Tokens are signed,
//! not encrypted: the identity is readable by whoever holds the token.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use hmac::{Hmac, Mac};
use relying_party_types::encoding;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use typeshare::typeshare;

use crate::{config::SessionSecret, Clock, Error};

type HmacSha256 = Hmac<Sha256>;

/// An opaque bearer token proving a successful authentication.
#[typeshare(transparent)]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// The token as sent to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<SessionToken> for String {
    fn from(token: SessionToken) -> Self {
        token.0
    }
}

impl From<String> for SessionToken {
    fn from(token: String) -> Self {
        SessionToken(token)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // bearer credential
        f.write_str("SessionToken(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// Mints and validates [`SessionToken`]s.
#[derive(Clone)]
pub struct SessionIssuer {
    secret: SessionSecret,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("secret", &self.secret)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionIssuer {
    /// Create an issuer signing with `secret`, minting tokens valid for `ttl`.
    pub fn new(secret: SessionSecret, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { secret, ttl, clock }
    }

    fn mac(&self) -> HmacSha256 {
        // SAFETY: HMAC accepts keys of any length.
        HmacSha256::new_from_slice(self.secret.expose()).unwrap()
    }

    fn unix_now(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Mint a token for `identity`, valid from now until now + TTL.
    pub fn mint(&self, identity: &str) -> SessionToken {
        let iat = self.unix_now();
        let claims = Claims {
            sub: identity.to_owned(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };
        // SAFETY: a struct of a string and integers always serializes.
        let payload = encoding::base64url(&serde_json::to_vec(&claims).unwrap());

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let tag = encoding::base64url(&mac.finalize().into_bytes());

        SessionToken(format!("{payload}.{tag}"))
    }

    /// Validate `token`, returning the identity it was minted for.
    ///
    /// The tag is compared in constant time before the payload is parsed.
    pub fn validate(&self, token: &str) -> Result<String, Error> {
        let (payload, tag) = token.split_once('.').ok_or_else(|| {
            log::debug!("session token rejected: not two segments");
            Error::TokenInvalid
        })?;
        let tag = encoding::try_from_base64url(tag).ok_or_else(|| {
            log::debug!("session token rejected: tag is not base64url");
            Error::TokenInvalid
        })?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).map_err(|_| {
            log::debug!("session token rejected: bad tag");
            Error::TokenInvalid
        })?;

        let claims: Claims = encoding::try_from_base64url(payload)
            .and_then(|json| serde_json::from_slice(&json).ok())
            .ok_or_else(|| {
                log::debug!("session token rejected: unparseable payload");
                Error::TokenInvalid
            })?;

        if self.unix_now() > claims.exp {
            log::debug!("session token for {} rejected: expired", claims.sub);
            return Err(Error::TokenInvalid);
        }
        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::MockClock, SystemClock};

    fn secret(byte: u8) -> SessionSecret {
        SessionSecret::new(vec![byte; 32]).unwrap()
    }

    fn issuer_at(time: SystemTime) -> SessionIssuer {
        let mut clock = MockClock::new();
        clock.expect_now().return_const(time);
        SessionIssuer::new(secret(1), Duration::from_secs(3600), Arc::new(clock))
    }

    #[test]
    fn validate_after_mint() {
        let issuer = SessionIssuer::new(secret(1), Duration::from_secs(60), Arc::new(SystemClock));
        let token = issuer.mint("alice");
        assert_eq!(issuer.validate(token.as_str()), Ok("alice".to_owned()));
    }

    #[test]
    fn payload_layout() {
        let issued = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let token = issuer_at(issued).mint("alice");
        let (payload, tag) = token.as_str().split_once('.').unwrap();

        let json = encoding::try_from_base64url(payload).unwrap();
        assert_eq!(
            json,
            br#"{"sub":"alice","iat":1700000000,"exp":1700003600}"#.to_vec()
        );
        assert!(!tag.contains('='));
        assert_eq!(encoding::try_from_base64url(tag).unwrap().len(), 32);
    }

    #[test]
    fn expires_after_ttl() {
        let issued = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let token = issuer_at(issued).mint("alice");

        let at_expiry = issuer_at(issued + Duration::from_secs(3600));
        assert_eq!(at_expiry.validate(token.as_str()), Ok("alice".to_owned()));

        let after_expiry = issuer_at(issued + Duration::from_secs(3601));
        assert_eq!(
            after_expiry.validate(token.as_str()),
            Err(Error::TokenInvalid)
        );
    }

    #[test]
    fn rejects_other_keys_and_tampering() {
        let issuer = SessionIssuer::new(secret(1), Duration::from_secs(60), Arc::new(SystemClock));
        let other = SessionIssuer::new(secret(2), Duration::from_secs(60), Arc::new(SystemClock));
        let token = issuer.mint("alice");
        assert_eq!(other.validate(token.as_str()), Err(Error::TokenInvalid));

        let (_, tag) = token.as_str().split_once('.').unwrap();
        let forged_payload = encoding::base64url(br#"{"sub":"mallory","iat":0,"exp":99999999999}"#);
        assert_eq!(
            issuer.validate(&format!("{forged_payload}.{tag}")),
            Err(Error::TokenInvalid)
        );

        for garbage in ["", ".", "abc", "a.b.c", "!!!.???"] {
            assert_eq!(issuer.validate(garbage), Err(Error::TokenInvalid));
        }
    }

    #[test]
    fn debug_does_not_leak() {
        let issuer = issuer_at(UNIX_EPOCH);
        let token = issuer.mint("alice");
        assert_eq!(format!("{token:?}"), "SessionToken(<redacted>)");
        assert!(format!("{issuer:?}").contains("<redacted>"));
    }
}
