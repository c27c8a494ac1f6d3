//! Registers and logs in a passkey held by a software authenticator.
//!
//! ```sh
//! cargo run -p relying-party --example ceremony
//! ```

use relying_party::{
    Config, MemoryChallengeCache, MemoryCredentialStore, RelyingParty, SessionSecret,
};
use soft_authenticator::SoftAuthenticator;

const ORIGIN: &str = "http://localhost:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder("localhost", ORIGIN)
        .rp_name("Passkey Demo")
        .allows_insecure_localhost(true)
        .session_secret(SessionSecret::new(relying_party::types::rand::random_vec(32))?)
        .build()?;
    let rp = RelyingParty::new(config, MemoryCredentialStore::new(), MemoryChallengeCache::new());
    let mut authenticator = SoftAuthenticator::new(ORIGIN)?;

    let options = rp.start_registration("alice").await?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    let created = authenticator.register(&options)?;
    let credential = rp.finish_registration("alice", &created).await?;
    println!("registered credential {}", created.id);

    let options = rp.start_authentication("alice").await?;
    let asserted = authenticator.authenticate(&options)?;
    let token = rp.finish_authentication("alice", &asserted).await?;
    println!("session token: {token}");
    println!(
        "token identity: {}, counter {} -> {}",
        rp.validate_session(token.as_str())?,
        credential.counter,
        authenticator.counter()
    );
    Ok(())
}
