use coset::iana::{self, EnumI64};
use relying_party_types::{
    authenticator::{AttestationObject, AttestationStatement},
    rand::random_vec,
    webauthn::{
        AttestationConveyancePreference, AuthenticatorSelectionCriteria, ClientDataType,
        CreatedPublicKeyCredential, CredentialCreationOptions, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialDescriptor, PublicKeyCredentialParameters, PublicKeyCredentialRpEntity,
        PublicKeyCredentialType, PublicKeyCredentialUserEntity, ResidentKeyRequirement,
    },
};

use crate::{
    verify::{
        check_authenticator_data, check_client_data, signed_message, CredentialPublicKey, Rejected,
    },
    Ceremony, ChallengeCache, Credential, CredentialStore, Error, RelyingParty, USER_HANDLE_LEN,
};

/// Signature algorithms offered to authenticators, most preferred first.
pub(crate) const SUPPORTED_ALGORITHMS: [iana::Algorithm; 2] =
    [iana::Algorithm::ES256, iana::Algorithm::EdDSA];

impl<S, C> RelyingParty<S, C>
where
    S: CredentialStore,
    C: ChallengeCache,
{
    /// Begin registering a passkey for `identity`.
    ///
    /// Issues a registration challenge, replacing any pending one, and returns the options to pass
    /// to `navigator.credentials.create()`. The identity keeps the same user handle across
    /// registrations. An already registered credential is listed in `excludeCredentials`.
    pub async fn start_registration(
        &self,
        identity: &str,
    ) -> Result<CredentialCreationOptions, Error> {
        let user_handle = self
            .store
            .user_handle(identity, random_vec(USER_HANDLE_LEN).into())
            .await?;
        let existing = self.store.get(identity).await?;
        let challenge = self
            .challenges
            .issue(identity, Ceremony::Registration, self.now())
            .await?;

        log::debug!("registration started for {identity}");
        Ok(CredentialCreationOptions {
            public_key: PublicKeyCredentialCreationOptions {
                rp: PublicKeyCredentialRpEntity {
                    id: Some(self.config.rp_id().to_owned()),
                    name: self.config.rp_name().to_owned(),
                },
                user: PublicKeyCredentialUserEntity {
                    id: user_handle,
                    display_name: identity.to_owned(),
                    name: identity.to_owned(),
                },
                challenge,
                pub_key_cred_params: SUPPORTED_ALGORITHMS
                    .into_iter()
                    .map(PublicKeyCredentialParameters::public_key)
                    .collect(),
                timeout: Some(self.config.timeout_millis()),
                exclude_credentials: existing.map(|credential| {
                    vec![PublicKeyCredentialDescriptor::public_key(
                        credential.credential_id,
                    )]
                }),
                authenticator_selection: Some(AuthenticatorSelectionCriteria {
                    authenticator_attachment: None,
                    resident_key: Some(ResidentKeyRequirement::Preferred),
                    require_resident_key: false,
                    user_verification: self.config.user_verification(),
                }),
                attestation: AttestationConveyancePreference::None,
            },
        })
    }

    /// Finish registering a passkey for `identity`.
    ///
    /// Consumes the pending registration challenge, verifies the attestation and stores the new
    /// credential, replacing any previous one. Nothing is stored when verification fails.
    pub async fn finish_registration(
        &self,
        identity: &str,
        response: &CreatedPublicKeyCredential,
    ) -> Result<Credential, Error> {
        let nonce = self
            .consume_challenge(identity, Ceremony::Registration)
            .await?;

        let credential = self
            .verify_attestation(identity, &nonce, response)
            .map_err(|rejected| {
                log::debug!("registration for {identity} rejected: {rejected}");
                Error::AttestationInvalid
            })?;

        self.store.put(credential.clone()).await?;
        log::info!("registered a passkey for {identity}");
        Ok(credential)
    }

    fn verify_attestation(
        &self,
        identity: &str,
        nonce: &[u8],
        response: &CreatedPublicKeyCredential,
    ) -> Result<Credential, Rejected> {
        if response.ty != PublicKeyCredentialType::PublicKey {
            return Err(Rejected("credential type is not public-key"));
        }
        let client_data_json = &response.response.client_data_json;
        check_client_data(
            client_data_json,
            ClientDataType::Create,
            nonce,
            self.config.origin(),
        )?;

        let attestation = AttestationObject::from_slice(&response.response.attestation_object)
            .map_err(|_| Rejected("malformed attestation object"))?;
        let auth_data = &attestation.auth_data;
        check_authenticator_data(
            auth_data,
            self.config.rp_id(),
            self.config.user_verification(),
        )?;

        let attested = auth_data
            .attested_credential_data
            .as_ref()
            .ok_or(Rejected("no attested credential data"))?;
        if attested.credential_id() != response.raw_id.as_slice() {
            return Err(Rejected("attested credential id differs from rawId"));
        }

        let public_key = CredentialPublicKey::from_cose_key(&attested.key)?;
        match &attestation.att_stmt {
            AttestationStatement::None => {}
            AttestationStatement::Packed {
                alg,
                sig,
                x5c: None,
            } => {
                if *alg != public_key.algorithm().to_i64() {
                    return Err(Rejected("packed attestation algorithm differs from the key"));
                }
                public_key.verify(
                    &signed_message(attestation.raw_auth_data(), client_data_json),
                    sig,
                )?;
            }
            AttestationStatement::Packed { x5c: Some(_), .. } => {
                return Err(Rejected("packed attestation with a certificate chain"));
            }
            AttestationStatement::Unsupported { .. } => {
                return Err(Rejected("unsupported attestation format"));
            }
        }

        let encoded_key = attested
            .public_key_bytes()
            .map_err(|_| Rejected("credential public key does not re-encode"))?;

        Ok(Credential {
            identity: identity.to_owned(),
            credential_id: response.raw_id.clone(),
            public_key: encoded_key.into(),
            counter: auth_data.counter,
        })
    }
}
