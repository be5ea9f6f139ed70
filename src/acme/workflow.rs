//! Drives one certificate request end to end.

use std::time::{Duration, Instant};

use openssl::pkey::{PKey, Private};

use crate::acme::account::AccountBuilder;
use crate::acme::authorization::{AuthorizationStatus, ChallengeStatus};
use crate::acme::client::AcmeHttpClient;
use crate::acme::directory::Directory;
use crate::acme::error::AcmeError;
use crate::acme::order::{OrderBuilder, OrderStatus};
use crate::acme::responder::ChallengeResponder;
use crate::bundle::CertificateBundle;

/// When to re-poll a pending resource.
///
/// The server's Retry-After hint wins when present; the fixed fallback
/// interval applies otherwise. With a deadline set, polling that outlasts it
/// fails with [`AcmeError::PollDeadlineExceeded`] instead of looping forever.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub fallback_interval: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            fallback_interval: Duration::from_secs(3),
            deadline: None,
        }
    }
}

impl PollPolicy {
    fn wait_interval(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.fallback_interval)
    }

    fn check_deadline(&self, started: Instant, operation: &'static str) -> Result<(), AcmeError> {
        match self.deadline {
            Some(deadline) if started.elapsed() > deadline => {
                Err(AcmeError::PollDeadlineExceeded {
                    operation,
                    waited: started.elapsed(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Runs account registration, ordering, validation, finalization and
/// certificate download as one sequential pass.
///
/// Authorizations are validated one at a time because the responder holds a
/// single challenge slot. At most one request may run at a time; that is
/// caller discipline, not enforced here.
pub struct AcmeCertificateOrderer<T: AcmeHttpClient> {
    pub client: T,
    pub directory_url: String,
    pub contact_email: String,
    pub responder: ChallengeResponder,
    pub poll_policy: PollPolicy,
}

impl<T: AcmeHttpClient> AcmeCertificateOrderer<T> {
    pub async fn request_certificate(
        self,
        domain: &str,
        account_key: &PKey<Private>,
        domain_key: &PKey<Private>,
    ) -> Result<CertificateBundle, AcmeError> {
        let AcmeCertificateOrderer {
            client,
            directory_url,
            contact_email,
            responder,
            poll_policy,
        } = self;

        let directory = Directory::fetch(&directory_url, client).await?;
        let account = AccountBuilder::new(directory)
            .contact_email(&contact_email)
            .terms_of_service_agreed(true)
            .build(account_key.clone())
            .await?;

        let mut order = OrderBuilder::new(account)
            .dns_identifier(domain)
            .build()
            .await?;

        for authorization in order.authorizations().await? {
            if authorization.status() == AuthorizationStatus::Valid {
                continue;
            }

            let Some(mut challenge) = authorization.http01_challenge() else {
                return Err(AcmeError::UnsupportedChallenge {
                    domain: authorization.domain().to_string(),
                });
            };

            let token = challenge.token()?.to_string();
            let key_authorization = challenge.key_authorization()?;
            responder.set_current(&token, &key_authorization);

            log::info!(
                "[ACME] Triggering http-01 validation of {} (token {token})",
                authorization.domain()
            );
            challenge.trigger().await?;

            let started = Instant::now();
            loop {
                let hint = challenge.refresh().await?;
                match challenge.status() {
                    ChallengeStatus::Invalid => {
                        responder.clear();
                        return Err(AcmeError::ChallengeFailed {
                            domain: authorization.domain().to_string(),
                            detail: challenge.problem_detail(),
                        });
                    }
                    ChallengeStatus::Valid => break,
                    ChallengeStatus::Pending | ChallengeStatus::Processing => {
                        poll_policy.check_deadline(started, "challenge validation")?;
                        log::info!(
                            "[ACME] Waiting for {directory_url} to validate {} (status {:?})",
                            authorization.domain(),
                            challenge.status()
                        );
                        tokio::time::sleep(poll_policy.wait_interval(hint)).await;
                    }
                }
            }
            responder.clear();
        }

        order.finalize(domain_key).await?;

        let started = Instant::now();
        loop {
            let hint = order.refresh().await?;
            match order.status() {
                OrderStatus::Invalid => {
                    return Err(AcmeError::IssuanceFailed {
                        detail: order.problem_detail(),
                    });
                }
                OrderStatus::Valid => break,
                OrderStatus::Pending | OrderStatus::Ready | OrderStatus::Processing => {
                    poll_policy.check_deadline(started, "certificate issuance")?;
                    log::info!(
                        "[ACME] Waiting for {directory_url} to provide the certificate (status {:?})",
                        order.status()
                    );
                    tokio::time::sleep(poll_policy.wait_interval(hint)).await;
                }
            }
        }

        let chain = order
            .certificate_chain()
            .await?
            .ok_or_else(|| AcmeError::IssuanceFailed {
                detail: "order is valid but the server supplied no certificate URL".to_string(),
            })?;

        log::info!("[ACME] Certificate issued for {domain}");
        Ok(CertificateBundle::from_x509_chain(&chain, domain_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acme::mocks::scripted::{directory_url, scripted_acme_server, ChallengeScript};
    use openssl::rsa::Rsa;
    use std::sync::Arc;

    fn test_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn instant_policy() -> PollPolicy {
        PollPolicy {
            fallback_interval: Duration::ZERO,
            deadline: None,
        }
    }

    /// Leaf certificate carrying the domain key, as the scripted server
    /// would issue it.
    fn certificate_pem_for(domain: &str, key: &PKey<Private>) -> String {
        use openssl::asn1::Asn1Time;
        use openssl::hash::MessageDigest;
        use openssl::x509::{X509, X509Name};

        let name = {
            let mut name = X509Name::builder().unwrap();
            name.append_entry_by_text("CN", domain).unwrap();
            name.build()
        };
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(90).unwrap())
            .unwrap();
        builder.sign(key, MessageDigest::sha256()).unwrap();
        String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_issuance() {
        let account_key = test_key();
        let domain_key = test_key();
        let certificate_pem = certificate_pem_for("live.example.test", &domain_key);

        let client = Arc::new(scripted_acme_server(
            "live.example.test",
            ChallengeScript::ValidOnFirstPoll,
            certificate_pem,
        ));
        let responder = ChallengeResponder::new();
        let orderer = AcmeCertificateOrderer {
            client,
            directory_url: directory_url(),
            contact_email: "admin@example.test".to_string(),
            responder: responder.clone(),
            poll_policy: instant_policy(),
        };

        let bundle = orderer
            .request_certificate("live.example.test", &account_key, &domain_key)
            .await
            .unwrap();

        assert_eq!(
            bundle.private_key_pem().as_bytes(),
            domain_key.private_key_to_pem_pkcs8().unwrap().as_slice()
        );

        let certificate =
            openssl::x509::X509::from_pem(bundle.certificate_pem().as_bytes()).unwrap();
        assert_eq!(
            certificate
                .public_key()
                .unwrap()
                .public_key_to_pem()
                .unwrap(),
            domain_key.public_key_to_pem().unwrap()
        );

        assert_eq!(responder.current_challenge_path(), None);
    }

    #[tokio::test]
    async fn test_challenge_failure_carries_problem_detail() {
        let account_key = test_key();
        let domain_key = test_key();

        let client = Arc::new(scripted_acme_server(
            "live.example.test",
            ChallengeScript::InvalidWithDetail("dns record not found"),
            String::new(),
        ));
        let responder = ChallengeResponder::new();
        let orderer = AcmeCertificateOrderer {
            client,
            directory_url: directory_url(),
            contact_email: "admin@example.test".to_string(),
            responder: responder.clone(),
            poll_policy: instant_policy(),
        };

        let err = orderer
            .request_certificate("live.example.test", &account_key, &domain_key)
            .await
            .unwrap_err();

        match err {
            AcmeError::ChallengeFailed { domain, detail } => {
                assert_eq!(domain, "live.example.test");
                assert!(detail.contains("dns record not found"), "detail: {detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(responder.current_challenge_path(), None);
    }

    #[tokio::test]
    async fn test_missing_http01_challenge_is_unsupported() {
        let account_key = test_key();
        let domain_key = test_key();

        let client = Arc::new(scripted_acme_server(
            "live.example.test",
            ChallengeScript::Http01NotOffered,
            String::new(),
        ));
        let orderer = AcmeCertificateOrderer {
            client,
            directory_url: directory_url(),
            contact_email: "admin@example.test".to_string(),
            responder: ChallengeResponder::new(),
            poll_policy: instant_policy(),
        };

        let err = orderer
            .request_certificate("live.example.test", &account_key, &domain_key)
            .await
            .unwrap_err();

        assert!(matches!(err, AcmeError::UnsupportedChallenge { .. }));
    }

    #[tokio::test]
    async fn test_poll_deadline_is_enforced() {
        let account_key = test_key();
        let domain_key = test_key();

        let client = Arc::new(scripted_acme_server(
            "live.example.test",
            ChallengeScript::NeverResolves,
            String::new(),
        ));
        let orderer = AcmeCertificateOrderer {
            client,
            directory_url: directory_url(),
            contact_email: "admin@example.test".to_string(),
            responder: ChallengeResponder::new(),
            poll_policy: PollPolicy {
                fallback_interval: Duration::ZERO,
                deadline: Some(Duration::ZERO),
            },
        };

        let err = orderer
            .request_certificate("live.example.test", &account_key, &domain_key)
            .await
            .unwrap_err();

        assert!(matches!(err, AcmeError::PollDeadlineExceeded { .. }));
    }
}
