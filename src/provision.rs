//! Entry points tying the cache, key store and order workflow together.

use crate::acme::client::{AcmeHttpClient, HyperAcmeClient};
use crate::acme::responder::ChallengeResponder;
use crate::acme::workflow::AcmeCertificateOrderer;
use crate::bundle::CertificateBundle;
use crate::cache::CertificateCache;
use crate::configuration::ProvisionerConfig;
use crate::error::ProvisionError;
use crate::keys::{KeyRole, KeyStore};
use crate::self_signed::SelfSignedIssuer;

/// Produces the TLS identity for the embedding web server.
///
/// The ACME path consults the on-disk cache first and only runs an order when
/// no usable certificate exists; the self-signed path never touches the
/// network. There is no automatic fallback from one to the other: the caller
/// chooses the entry point.
pub struct CertProvisioner<C: AcmeHttpClient + Clone = HyperAcmeClient> {
    config: ProvisionerConfig,
    client: C,
    key_store: KeyStore,
    cache: CertificateCache,
    responder: ChallengeResponder,
}

impl CertProvisioner<HyperAcmeClient> {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self::with_client(config, HyperAcmeClient::new())
    }
}

impl<C: AcmeHttpClient + Clone> CertProvisioner<C> {
    pub fn with_client(config: ProvisionerConfig, client: C) -> Self {
        let key_store = KeyStore::new(config.state_dir.clone());
        let cache = CertificateCache::new(config.state_dir.clone());
        Self {
            config,
            client,
            key_store,
            cache,
            responder: ChallengeResponder::new(),
        }
    }

    /// Shared handle for the HTTP layer answering challenge requests.
    pub fn responder(&self) -> ChallengeResponder {
        self.responder.clone()
    }

    /// Publicly trusted certificate for `domain`: the cached bundle when it
    /// is still valid, otherwise a fresh ACME order whose result is written
    /// back for future calls.
    pub async fn public_key_crypto_config(
        &self,
        domain: &str,
    ) -> Result<CertificateBundle, ProvisionError> {
        if let Some(bundle) = self.cache.load()? {
            log::info!(
                "[ACME] Using cached certificate, valid until {:?}",
                bundle.not_after()
            );
            return Ok(bundle);
        }

        let account_key = self.key_store.key_pair(KeyRole::Account)?;
        let domain_key = self.key_store.key_pair(KeyRole::Domain)?;

        let orderer = AcmeCertificateOrderer {
            client: self.client.clone(),
            directory_url: self.config.directory_url.clone(),
            contact_email: self.config.contact_email.clone(),
            responder: self.responder.clone(),
            poll_policy: self.config.poll_policy.clone(),
        };
        let bundle = orderer
            .request_certificate(domain, &account_key, &domain_key)
            .await?;

        self.cache.store(&bundle)?;
        Ok(bundle)
    }

    /// Locally trusted certificate for offline use. Nothing is persisted;
    /// callers that want reuse store the bundle through the cache themselves.
    pub fn self_signed_crypto_config(&self) -> Result<CertificateBundle, ProvisionError> {
        Ok(SelfSignedIssuer::default().issue(&self.config.self_signed_subject)?)
    }
}
