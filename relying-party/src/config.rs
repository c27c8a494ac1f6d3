//! Relying party configuration.
//!
//! A [`Config`] is only obtainable through [`ConfigBuilder::build`] or [`Config::from_env`], both
//! of which validate the origin against the RP ID and require a session signing secret.

use std::{env, fmt, str::FromStr, time::Duration};

use relying_party_types::{webauthn::UserVerificationRequirement, Bytes};
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Default lifetime of a pending challenge.
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Default lifetime of a session token.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum length of the session signing secret, the output size of HMAC-SHA256.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// What to do with an assertion whose signature counter is 0 while the stored counter is also 0.
///
/// Authenticators that do not implement a counter always report 0, so rejecting these locks out
/// most synced passkeys. Accepting them gives up clone detection for that credential.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ZeroCounterPolicy {
    /// Accept silently.
    Allow,
    /// Accept and log a warning.
    #[default]
    Flag,
    /// Treat as a replay.
    Reject,
}

impl FromStr for ZeroCounterPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(ZeroCounterPolicy::Allow),
            "flag" => Ok(ZeroCounterPolicy::Flag),
            "reject" => Ok(ZeroCounterPolicy::Reject),
            _ => Err(ConfigError::InvalidVar("ZERO_COUNTER_POLICY")),
        }
    }
}

/// The HMAC key used to sign session tokens. Zeroed on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    /// Wrap raw key bytes, rejecting keys shorter than [`MIN_SESSION_SECRET_LEN`].
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::WeakSessionSecret);
        }
        Ok(Self(key))
    }

    /// Decode a base64 or base64url encoded key.
    pub fn from_encoded(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = Bytes::try_from(encoded.trim()).map_err(|_| ConfigError::InvalidSessionSecret)?;
        Self::new(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

/// Errors produced while building a [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The RP ID is empty or not a domain.
    InvalidRpId,
    /// The origin is not a URL with a host.
    InvalidOrigin,
    /// The origin host is neither the RP ID nor a subdomain of it.
    OriginRpMismatch,
    /// The origin does not use HTTPS.
    UnprotectedOrigin,
    /// The origin is `http://localhost` but `allows_insecure_localhost` was not set.
    InsecureLocalhostNotAllowed,
    /// The challenge timeout or session lifetime is zero.
    ZeroDuration(&'static str),
    /// No session signing secret was provided.
    MissingSessionSecret,
    /// The session signing secret is shorter than [`MIN_SESSION_SECRET_LEN`] bytes.
    WeakSessionSecret,
    /// The session signing secret is not base64 encoded.
    InvalidSessionSecret,
    /// A required environment variable is not set.
    MissingVar(&'static str),
    /// An environment variable could not be parsed.
    InvalidVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRpId => f.write_str("invalid relying party id"),
            ConfigError::InvalidOrigin => f.write_str("origin is not a valid URL with a host"),
            ConfigError::OriginRpMismatch => {
                f.write_str("origin host is not the relying party id or one of its subdomains")
            }
            ConfigError::UnprotectedOrigin => f.write_str("origin does not use https"),
            ConfigError::InsecureLocalhostNotAllowed => {
                f.write_str("http://localhost origin requires allows_insecure_localhost")
            }
            ConfigError::ZeroDuration(name) => write!(f, "{name} must be greater than zero"),
            ConfigError::MissingSessionSecret => f.write_str("session secret is required"),
            ConfigError::WeakSessionSecret => write!(
                f,
                "session secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            ),
            ConfigError::InvalidSessionSecret => f.write_str("session secret is not base64"),
            ConfigError::MissingVar(name) => write!(f, "environment variable {name} is not set"),
            ConfigError::InvalidVar(name) => write!(f, "environment variable {name} is invalid"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validated relying party configuration.
#[derive(Debug, Clone)]
pub struct Config {
    rp_id: String,
    rp_name: String,
    origin: String,
    challenge_timeout: Duration,
    session_ttl: Duration,
    user_verification: UserVerificationRequirement,
    zero_counter_policy: ZeroCounterPolicy,
    session_secret: SessionSecret,
}

impl Config {
    /// Start building a configuration for `rp_id` served from `origin`.
    pub fn builder(rp_id: impl Into<String>, origin: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            rp_id: rp_id.into(),
            rp_name: None,
            origin: origin.into(),
            allows_insecure_localhost: false,
            challenge_timeout: DEFAULT_CHALLENGE_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            user_verification: UserVerificationRequirement::default(),
            zero_counter_policy: ZeroCounterPolicy::default(),
            session_secret: None,
        }
    }

    /// Load the configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `RP_ID` | required |
    /// | `RP_ORIGIN` | required |
    /// | `RP_NAME` | the RP ID |
    /// | `RP_ALLOW_INSECURE_LOCALHOST` | `false` |
    /// | `CHALLENGE_TIMEOUT_SECS` | `300` |
    /// | `SESSION_TTL_SECS` | `86400` |
    /// | `SESSION_SECRET` | required, base64 or base64url |
    /// | `USER_VERIFICATION` | `preferred` |
    /// | `ZERO_COUNTER_POLICY` | `flag` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingVar(name));
        let secs = |name: &'static str, default: Duration| {
            lookup(name).map_or(Ok(default), |v| {
                v.trim()
                    .parse()
                    .map(Duration::from_secs)
                    .map_err(|_| ConfigError::InvalidVar(name))
            })
        };

        let mut builder = Config::builder(required("RP_ID")?, required("RP_ORIGIN")?)
            .challenge_timeout(secs("CHALLENGE_TIMEOUT_SECS", DEFAULT_CHALLENGE_TIMEOUT)?)
            .session_ttl(secs("SESSION_TTL_SECS", DEFAULT_SESSION_TTL)?);

        if let Some(name) = lookup("RP_NAME") {
            builder = builder.rp_name(name);
        }
        if let Some(allow) = lookup("RP_ALLOW_INSECURE_LOCALHOST") {
            let allow = allow
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidVar("RP_ALLOW_INSECURE_LOCALHOST"))?;
            builder = builder.allows_insecure_localhost(allow);
        }
        if let Some(uv) = lookup("USER_VERIFICATION") {
            let uv = serde_json::from_value(serde_json::Value::String(uv.trim().to_lowercase()))
                .map_err(|_| ConfigError::InvalidVar("USER_VERIFICATION"))?;
            builder = builder.user_verification(uv);
        }
        if let Some(policy) = lookup("ZERO_COUNTER_POLICY") {
            builder = builder.zero_counter_policy(policy.trim().parse()?);
        }
        if let Some(secret) = lookup("SESSION_SECRET") {
            builder = builder.session_secret(SessionSecret::from_encoded(&secret)?);
        }

        builder.build()
    }

    /// The RP ID credentials are scoped to.
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    /// The relying party name shown by authenticators.
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    /// The serialized origin client data must carry, e.g. `https://login.example.com`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// How long a challenge stays valid after being issued.
    pub fn challenge_timeout(&self) -> Duration {
        self.challenge_timeout
    }

    /// The lifetime of minted session tokens.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// The user verification requirement sent to browsers and enforced on responses.
    pub fn user_verification(&self) -> UserVerificationRequirement {
        self.user_verification
    }

    /// The handling of assertions whose counter is 0 on both sides.
    pub fn zero_counter_policy(&self) -> ZeroCounterPolicy {
        self.zero_counter_policy
    }

    pub(crate) fn session_secret(&self) -> &SessionSecret {
        &self.session_secret
    }

    /// The challenge timeout in milliseconds, the unit browsers expect.
    pub(crate) fn timeout_millis(&self) -> u32 {
        u32::try_from(self.challenge_timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Builder for [`Config`]. See [`Config::builder`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    rp_id: String,
    rp_name: Option<String>,
    origin: String,
    allows_insecure_localhost: bool,
    challenge_timeout: Duration,
    session_ttl: Duration,
    user_verification: UserVerificationRequirement,
    zero_counter_policy: ZeroCounterPolicy,
    session_secret: Option<SessionSecret>,
}

impl ConfigBuilder {
    /// Set the relying party name. Defaults to the RP ID.
    pub fn rp_name(mut self, name: impl Into<String>) -> Self {
        self.rp_name = Some(name.into());
        self
    }

    /// Allow an `http://localhost` origin, for local development.
    pub fn allows_insecure_localhost(mut self, is_allowed: bool) -> Self {
        self.allows_insecure_localhost = is_allowed;
        self
    }

    /// Set how long challenges stay valid.
    pub fn challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    /// Set the lifetime of session tokens.
    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set the user verification requirement.
    pub fn user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.user_verification = requirement;
        self
    }

    /// Set the zero counter policy.
    pub fn zero_counter_policy(mut self, policy: ZeroCounterPolicy) -> Self {
        self.zero_counter_policy = policy;
        self
    }

    /// Set the session signing secret.
    pub fn session_secret(mut self, secret: SessionSecret) -> Self {
        self.session_secret = Some(secret);
        self
    }

    /// Validate and produce the [`Config`].
    pub fn build(self) -> Result<Config, ConfigError> {
        let rp_id = self.rp_id.trim().to_ascii_lowercase();
        if rp_id.is_empty() || rp_id.contains(['/', ':']) {
            return Err(ConfigError::InvalidRpId);
        }

        let url = Url::parse(&self.origin).map_err(|_| ConfigError::InvalidOrigin)?;
        let host = url.domain().ok_or(ConfigError::InvalidOrigin)?;
        match url.scheme() {
            "https" => {}
            "http" if host == "localhost" => {
                if !self.allows_insecure_localhost {
                    return Err(ConfigError::InsecureLocalhostNotAllowed);
                }
            }
            _ => return Err(ConfigError::UnprotectedOrigin),
        }
        let within_rp_id = host == rp_id
            || host
                .strip_suffix(rp_id.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'));
        if !within_rp_id {
            return Err(ConfigError::OriginRpMismatch);
        }

        if self.challenge_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("challenge timeout"));
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("session ttl"));
        }
        let session_secret = self
            .session_secret
            .ok_or(ConfigError::MissingSessionSecret)?;

        Ok(Config {
            rp_name: self.rp_name.unwrap_or_else(|| rp_id.clone()),
            rp_id,
            origin: url.origin().ascii_serialization(),
            challenge_timeout: self.challenge_timeout,
            session_ttl: self.session_ttl,
            user_verification: self.user_verification,
            zero_counter_policy: self.zero_counter_policy,
            session_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn secret() -> SessionSecret {
        SessionSecret::new(vec![42; 32]).unwrap()
    }

    #[test]
    fn localhost_requires_opt_in() {
        let err = Config::builder("localhost", "http://localhost:3000")
            .session_secret(secret())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InsecureLocalhostNotAllowed);

        let config = Config::builder("localhost", "http://localhost:3000")
            .allows_insecure_localhost(true)
            .session_secret(secret())
            .build()
            .unwrap();
        assert_eq!(config.origin(), "http://localhost:3000");
        assert_eq!(config.rp_name(), "localhost");
        assert_eq!(config.challenge_timeout(), DEFAULT_CHALLENGE_TIMEOUT);
        assert_eq!(config.zero_counter_policy(), ZeroCounterPolicy::Flag);
    }

    #[test]
    fn plain_http_is_rejected() {
        let err = Config::builder("example.com", "http://example.com")
            .allows_insecure_localhost(true)
            .session_secret(secret())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnprotectedOrigin);
    }

    #[test]
    fn origin_must_be_within_rp_id() {
        let build = |rp_id: &str, origin: &str| {
            Config::builder(rp_id, origin)
                .session_secret(secret())
                .build()
        };

        assert!(build("example.com", "https://example.com").is_ok());
        assert!(build("example.com", "https://login.example.com:8443").is_ok());
        assert_eq!(
            build("example.com", "https://notexample.com").unwrap_err(),
            ConfigError::OriginRpMismatch
        );
        assert_eq!(
            build("login.example.com", "https://example.com").unwrap_err(),
            ConfigError::OriginRpMismatch
        );
        assert_eq!(
            build("example.com", "https://127.0.0.1").unwrap_err(),
            ConfigError::InvalidOrigin
        );
        assert_eq!(
            build("example.com", "not a url").unwrap_err(),
            ConfigError::InvalidOrigin
        );
    }

    #[test]
    fn origin_is_normalized() {
        let config = Config::builder("example.com", "https://Example.com:443/login?next=/")
            .session_secret(secret())
            .build()
            .unwrap();
        assert_eq!(config.origin(), "https://example.com");
    }

    #[test]
    fn session_secret_is_required_and_strong() {
        let err = Config::builder("example.com", "https://example.com")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingSessionSecret);

        assert_eq!(
            SessionSecret::new(vec![1; 16]).unwrap_err(),
            ConfigError::WeakSessionSecret
        );
    }

    #[test]
    fn secret_is_redacted() {
        let config = Config::builder("example.com", "https://example.com")
            .session_secret(SessionSecret::new(b"correct horse battery staple 1234".to_vec()).unwrap())
            .build()
            .unwrap();
        let printed = format!("{config:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("correct horse"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let err = Config::builder("example.com", "https://example.com")
            .challenge_timeout(Duration::ZERO)
            .session_secret(secret())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroDuration("challenge timeout"));
    }

    #[test]
    fn loads_from_environment() {
        let vars: HashMap<&str, String> = HashMap::from([
            ("RP_ID", "localhost".to_owned()),
            ("RP_ORIGIN", "http://localhost:3000".to_owned()),
            ("RP_NAME", "Passkey Demo".to_owned()),
            ("RP_ALLOW_INSECURE_LOCALHOST", "true".to_owned()),
            ("CHALLENGE_TIMEOUT_SECS", "60".to_owned()),
            ("USER_VERIFICATION", "Required".to_owned()),
            ("ZERO_COUNTER_POLICY", "reject".to_owned()),
            (
                "SESSION_SECRET",
                "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8".to_owned(),
            ),
        ]);

        let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();
        assert_eq!(config.rp_name(), "Passkey Demo");
        assert_eq!(config.challenge_timeout(), Duration::from_secs(60));
        assert_eq!(config.session_ttl(), DEFAULT_SESSION_TTL);
        assert_eq!(
            config.user_verification(),
            UserVerificationRequirement::Required
        );
        assert_eq!(config.zero_counter_policy(), ZeroCounterPolicy::Reject);
        assert_eq!(config.session_secret().expose(), (0..32).collect::<Vec<u8>>());
        assert_eq!(config.timeout_millis(), 60_000);
    }

    #[test]
    fn environment_without_secret_fails() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("RP_ID", "example.com"), ("RP_ORIGIN", "https://example.com")]);
        let err = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap_err();
        assert_eq!(err, ConfigError::MissingSessionSecret);

        let err = Config::from_lookup(|_| None).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("RP_ID"));
    }
}
