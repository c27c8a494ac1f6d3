use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, UNIX_EPOCH},
};

use soft_authenticator::SoftAuthenticator;

use super::*;

const ORIGIN: &str = "https://example.com";

fn config() -> Config {
    Config::builder("example.com", ORIGIN)
        .rp_name("Example")
        .challenge_timeout(Duration::from_secs(60))
        .session_secret(SessionSecret::new(vec![9; 32]).unwrap())
        .build()
        .unwrap()
}

/// A clock that only moves when the test says so.
fn manual_clock() -> (MockClock, Arc<AtomicU64>) {
    let seconds = Arc::new(AtomicU64::new(1_700_000_000));
    let mut clock = MockClock::new();
    let shared = Arc::clone(&seconds);
    clock
        .expect_now()
        .returning(move || UNIX_EPOCH + Duration::from_secs(shared.load(Ordering::SeqCst)));
    (clock, seconds)
}

/// A credential and user handle registered through the full ceremony against an in-memory store.
async fn registered(authenticator: &mut SoftAuthenticator) -> (Credential, Bytes) {
    let rp = RelyingParty::new(
        config(),
        MemoryCredentialStore::new(),
        MemoryChallengeCache::new(),
    );
    let options = rp.start_registration("alice").await.unwrap();
    let created = authenticator.register(&options).unwrap();
    let credential = rp.finish_registration("alice", &created).await.unwrap();
    (credential, options.public_key.user.id)
}

#[tokio::test]
async fn tampered_registration_never_reaches_the_store() {
    let mut store = MockCredentialStore::new();
    store
        .expect_user_handle()
        .returning(|_, fresh| Ok(fresh));
    store.expect_get().returning(|_| Ok(None));
    store.expect_put().never();

    let rp = RelyingParty::new(config(), store, MemoryChallengeCache::new());
    let mut options = rp.start_registration("alice").await.unwrap();
    options.public_key.challenge[0] ^= 0xff;

    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let created = authenticator.register(&options).unwrap();

    assert_eq!(
        rp.finish_registration("alice", &created).await,
        Err(Error::AttestationInvalid)
    );
}

#[tokio::test]
async fn store_outage_is_reported_as_storage_error() {
    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .returning(|_| Err(StoreError::Unavailable("connection reset".into())));

    let rp = RelyingParty::new(config(), store, MemoryChallengeCache::new());
    let err = rp.start_authentication("alice").await.unwrap_err();
    assert!(err.is_storage());
}

#[tokio::test]
async fn lost_counter_race_is_a_replay() {
    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let (credential, handle) = registered(&mut authenticator).await;

    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .times(2)
        .returning(move |_| Ok(Some(credential.clone())));
    store
        .expect_find_user_handle()
        .returning(move |_| Ok(Some(handle.clone())));
    store
        .expect_advance_counter()
        .withf(|_, counter| *counter == 1)
        .times(1)
        .returning(|_, _| Err(StoreError::CounterRejected));

    let rp = RelyingParty::new(config(), store, MemoryChallengeCache::new());
    let options = rp.start_authentication("alice").await.unwrap();
    let asserted = authenticator.authenticate(&options).unwrap();

    assert_eq!(
        rp.finish_authentication("alice", &asserted).await,
        Err(Error::ReplayDetected)
    );
}

#[tokio::test]
async fn login_never_binds_a_user_handle() {
    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let (credential, _) = registered(&mut authenticator).await;

    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .returning(move |_| Ok(Some(credential.clone())));
    store.expect_user_handle().never();
    store.expect_find_user_handle().times(1).returning(|_| Ok(None));
    store.expect_advance_counter().times(1).returning(|_, _| Ok(()));

    let rp = RelyingParty::new(config(), store, MemoryChallengeCache::new());
    let options = rp.start_authentication("alice").await.unwrap();
    let asserted = authenticator.authenticate(&options).unwrap();
    assert!(asserted.response.user_handle.is_some());

    let token = rp.finish_authentication("alice", &asserted).await.unwrap();
    assert_eq!(rp.validate_session(token.as_str()), Ok("alice".to_owned()));
}

#[tokio::test]
async fn stale_counter_is_reported_before_the_challenge_mismatch() {
    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let (mut credential, handle) = registered(&mut authenticator).await;
    credential.counter = 5;

    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .returning(move |_| Ok(Some(credential.clone())));
    store
        .expect_find_user_handle()
        .returning(move |_| Ok(Some(handle.clone())));
    store.expect_advance_counter().never();

    let rp = RelyingParty::new(config(), store, MemoryChallengeCache::new());
    let mut options = rp.start_authentication("alice").await.unwrap();
    options.public_key.challenge[0] ^= 0xff;
    let asserted = authenticator.authenticate(&options).unwrap();

    assert_eq!(
        rp.finish_authentication("alice", &asserted).await,
        Err(Error::ReplayDetected)
    );
}

#[tokio::test]
async fn challenges_expire_with_the_clock() {
    let (clock, seconds) = manual_clock();
    let rp = RelyingParty::new(
        config(),
        MemoryCredentialStore::new(),
        MemoryChallengeCache::new(),
    )
    .with_clock(clock);

    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let options = rp.start_registration("alice").await.unwrap();
    let created = authenticator.register(&options).unwrap();

    seconds.fetch_add(61, Ordering::SeqCst);
    assert_eq!(
        rp.finish_registration("alice", &created).await,
        Err(Error::ChallengeInvalid)
    );
    assert!(rp.store().is_empty());
}

#[tokio::test]
async fn challenge_at_the_timeout_is_still_valid() {
    let (clock, seconds) = manual_clock();
    let rp = RelyingParty::new(
        config(),
        MemoryCredentialStore::new(),
        MemoryChallengeCache::new(),
    )
    .with_clock(clock);

    let mut authenticator = SoftAuthenticator::new(ORIGIN).unwrap();
    let options = rp.start_registration("alice").await.unwrap();
    let created = authenticator.register(&options).unwrap();

    seconds.fetch_add(60, Ordering::SeqCst);
    assert!(rp.finish_registration("alice", &created).await.is_ok());
}

#[tokio::test]
async fn eviction_follows_the_clock() {
    let (clock, seconds) = manual_clock();
    let rp = RelyingParty::new(
        config(),
        MemoryCredentialStore::new(),
        MemoryChallengeCache::new(),
    )
    .with_clock(clock);

    rp.start_registration("alice").await.unwrap();
    seconds.fetch_add(30, Ordering::SeqCst);
    rp.start_registration("bob").await.unwrap();

    seconds.fetch_add(31, Ordering::SeqCst);
    assert_eq!(rp.evict_expired_challenges().await, Ok(1));
    assert_eq!(rp.challenges().cache().len(), 1);
}

#[tokio::test]
async fn sessions_expire_with_the_clock() {
    let (clock, seconds) = manual_clock();
    let rp = RelyingParty::new(
        config(),
        MemoryCredentialStore::new(),
        MemoryChallengeCache::new(),
    )
    .with_clock(clock);

    let token = rp.sessions().mint("alice");
    assert_eq!(rp.validate_session(token.as_str()), Ok("alice".to_owned()));

    let ttl = rp.config().session_ttl().as_secs();
    seconds.fetch_add(ttl + 1, Ordering::SeqCst);
    assert_eq!(
        rp.validate_session(token.as_str()),
        Err(Error::TokenInvalid)
    );
}
