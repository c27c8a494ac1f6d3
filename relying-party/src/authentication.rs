use relying_party_types::{
    authenticator::AuthenticatorData,
    webauthn::{
        AuthenticatedPublicKeyCredential, ClientDataType, CredentialRequestOptions,
        PublicKeyCredentialDescriptor, PublicKeyCredentialRequestOptions, PublicKeyCredentialType,
    },
};

use crate::{
    counter_advances,
    verify::{
        check_authenticator_data, check_client_data, signed_message, CredentialPublicKey, Rejected,
    },
    Ceremony, ChallengeCache, Credential, CredentialStore, Error, RelyingParty, SessionToken,
    StoreError, ZeroCounterPolicy,
};

impl<S, C> RelyingParty<S, C>
where
    S: CredentialStore,
    C: ChallengeCache,
{
    /// Begin authenticating `identity`.
    ///
    /// Fails with [`Error::UnknownIdentity`] when no credential is registered. Otherwise issues an
    /// authentication challenge and returns the options to pass to `navigator.credentials.get()`,
    /// allowing exactly the registered credential.
    pub async fn start_authentication(
        &self,
        identity: &str,
    ) -> Result<CredentialRequestOptions, Error> {
        let credential = self.store.get(identity).await?.ok_or_else(|| {
            log::debug!("authentication for {identity} rejected: no credential");
            Error::UnknownIdentity
        })?;
        let challenge = self
            .challenges
            .issue(identity, Ceremony::Authentication, self.now())
            .await?;

        log::debug!("authentication started for {identity}");
        Ok(CredentialRequestOptions {
            public_key: PublicKeyCredentialRequestOptions {
                challenge,
                timeout: Some(self.config.timeout_millis()),
                rp_id: Some(self.config.rp_id().to_owned()),
                allow_credentials: Some(vec![PublicKeyCredentialDescriptor::public_key(
                    credential.credential_id,
                )]),
                user_verification: self.config.user_verification(),
            },
        })
    }

    /// Finish authenticating `identity`.
    ///
    /// Consumes the pending authentication challenge, verifies the assertion against the stored
    /// credential, advances the signature counter and mints a session token.
    ///
    /// The counter is checked as soon as the signature proves the assertion came from the
    /// registered credential, before the client data is compared with the challenge. A genuine
    /// assertion whose counter does not move forward, such as a captured one resubmitted in a
    /// later ceremony, fails with [`Error::ReplayDetected`] and leaves the stored counter as is.
    pub async fn finish_authentication(
        &self,
        identity: &str,
        response: &AuthenticatedPublicKeyCredential,
    ) -> Result<SessionToken, Error> {
        let nonce = self
            .consume_challenge(identity, Ceremony::Authentication)
            .await?;
        let stored = self.store.get(identity).await?.ok_or_else(|| {
            log::debug!("authentication for {identity} rejected: no credential");
            Error::UnknownIdentity
        })?;
        let rejected = |rejected: Rejected| {
            log::debug!("authentication for {identity} rejected: {rejected}");
            Error::AssertionInvalid
        };

        let reported = self
            .verify_signature(&stored, response)
            .map_err(rejected)?;
        self.check_counter(identity, stored.counter, reported)?;

        check_client_data(
            &response.response.client_data_json,
            ClientDataType::Get,
            &nonce,
            self.config.origin(),
        )
        .map_err(rejected)?;

        if let Some(user_handle) = &response.response.user_handle {
            // only compared once bound, a login never binds a handle
            if let Some(expected) = self.store.find_user_handle(identity).await? {
                if &expected != user_handle {
                    log::debug!("authentication for {identity} rejected: user handle mismatch");
                    return Err(Error::AssertionInvalid);
                }
            }
        }

        self.store
            .advance_counter(identity, reported)
            .await
            .map_err(|err| match err {
                StoreError::CounterRejected => {
                    log::warn!(
                        "replay detected for {identity}: counter {reported} lost a race with a concurrent login"
                    );
                    Error::ReplayDetected
                }
                err => err.into(),
            })?;

        log::info!("{identity} authenticated");
        Ok(self.sessions.mint(identity))
    }

    /// Check that the assertion was signed by the stored credential and return the counter it
    /// reports.
    fn verify_signature(
        &self,
        stored: &Credential,
        response: &AuthenticatedPublicKeyCredential,
    ) -> Result<u32, Rejected> {
        if response.ty != PublicKeyCredentialType::PublicKey {
            return Err(Rejected("credential type is not public-key"));
        }
        if response.raw_id != stored.credential_id {
            return Err(Rejected("credential id is not the registered one"));
        }

        let assertion = &response.response;
        let auth_data = AuthenticatorData::from_slice(&assertion.authenticator_data)
            .map_err(|_| Rejected("malformed authenticator data"))?;
        check_authenticator_data(
            &auth_data,
            self.config.rp_id(),
            self.config.user_verification(),
        )?;

        let public_key = CredentialPublicKey::from_cose_slice(&stored.public_key)?;
        public_key.verify(
            &signed_message(&assertion.authenticator_data, &assertion.client_data_json),
            &assertion.signature,
        )?;

        Ok(auth_data.counter)
    }

    /// Apply the replay rule and the zero counter policy.
    fn check_counter(&self, identity: &str, stored: u32, reported: u32) -> Result<(), Error> {
        if !counter_advances(stored, reported) {
            log::warn!(
                "replay detected for {identity}: counter {reported} does not exceed stored {stored}"
            );
            return Err(Error::ReplayDetected);
        }
        if reported == 0 {
            match self.config.zero_counter_policy() {
                ZeroCounterPolicy::Allow => {}
                ZeroCounterPolicy::Flag => {
                    log::warn!("{identity} authenticated with an authenticator without a counter");
                }
                ZeroCounterPolicy::Reject => {
                    log::warn!("{identity} rejected: zero counters are not accepted");
                    return Err(Error::ReplayDetected);
                }
            }
        }
        Ok(())
    }
}
