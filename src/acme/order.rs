//! Order lifecycle: creation, finalization, certificate download.

use std::sync::Arc;
use std::time::Duration;

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509, X509Name, X509Req};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::acme::account::Account;
use crate::acme::client::AcmeHttpClient;
use crate::acme::directory::{location_header, retry_after_hint};
use crate::acme::error::{AcmeError, AcmeProblem};
use crate::acme::helpers::b64;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    Ready,
    Processing,
    Valid,
    Invalid,
}

impl OrderStatus {
    pub fn is_done(self) -> bool {
        matches!(self, OrderStatus::Valid | OrderStatus::Invalid)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Identifier {
    pub r#type: String,
    pub value: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrderResource {
    pub status: OrderStatus,
    pub identifiers: Vec<Identifier>,
    #[serde(rename = "authorizations")]
    pub authorization_urls: Vec<String>,
    #[serde(rename = "finalize")]
    pub finalize_url: String,
    #[serde(rename = "certificate")]
    pub certificate_url: Option<String>,
    pub expires: Option<String>,
    pub error: Option<AcmeProblem>,
}

/// One in-flight certificate request. Never persisted: a process restart
/// abandons the order and a fresh one is created.
pub struct Order<T: AcmeHttpClient> {
    pub(crate) account: Arc<Account<T>>,
    url: String,
    pub(crate) resource: OrderResource,
}

/// Builds a new [`Order`] against the account's directory.
pub struct OrderBuilder<T: AcmeHttpClient> {
    account: Arc<Account<T>>,
    identifiers: Vec<Identifier>,
}

impl<T: AcmeHttpClient> OrderBuilder<T> {
    pub fn new(account: Arc<Account<T>>) -> Self {
        Self {
            account,
            identifiers: Vec::new(),
        }
    }

    pub fn dns_identifier(mut self, fqdn: impl Into<String>) -> Self {
        self.identifiers.push(Identifier {
            r#type: "dns".to_string(),
            value: fqdn.into(),
        });
        self
    }

    pub async fn build(self) -> Result<Order<T>, AcmeError> {
        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(
                &directory.urls.new_order_url,
                Some(json!({ "identifiers": self.identifiers })),
                &self.account.key,
                Some(self.account.id()),
            )
            .await?;

        let url = location_header(&response)?;
        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        let resource: OrderResource = serde_json::from_slice(&resp_bytes)?;

        log::info!(
            "[ACME] Created order {url} for {:?}",
            resource
                .identifiers
                .iter()
                .map(|identifier| identifier.value.as_str())
                .collect::<Vec<_>>()
        );
        Ok(Order {
            account: self.account,
            url,
            resource,
        })
    }
}

impl<T: AcmeHttpClient> Order<T> {
    pub fn status(&self) -> OrderStatus {
        self.resource.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn problem_detail(&self) -> String {
        self.resource
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "no problem detail supplied".to_string())
    }

    /// Re-fetches the order; returns the server's retry hint when given.
    pub async fn refresh(&mut self) -> Result<Option<Duration>, AcmeError> {
        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(&self.url, None, &self.account.key, Some(self.account.id()))
            .await?;

        let hint = retry_after_hint(&response);
        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        self.resource = serde_json::from_slice(&resp_bytes)?;
        Ok(hint)
    }

    /// Submits the CSR derived from the domain key pair.
    pub async fn finalize(&mut self, domain_key: &PKey<Private>) -> Result<(), AcmeError> {
        let domains: Vec<String> = self
            .resource
            .identifiers
            .iter()
            .map(|identifier| identifier.value.clone())
            .collect();
        let csr = gen_csr(domain_key, &domains)?;
        let csr_b64 = b64(&csr.to_der()?);

        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(
                &self.resource.finalize_url,
                Some(json!({ "csr": csr_b64 })),
                &self.account.key,
                Some(self.account.id()),
            )
            .await?;

        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        self.resource = serde_json::from_slice(&resp_bytes)?;
        Ok(())
    }

    /// Downloads the issued chain, leaf first, once the order is valid.
    pub async fn certificate_chain(&self) -> Result<Option<Vec<X509>>, AcmeError> {
        let certificate_url = match self.resource.certificate_url.clone() {
            Some(certificate_url) => certificate_url,
            None => return Ok(None),
        };

        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(
                &certificate_url,
                None,
                &self.account.key,
                Some(self.account.id()),
            )
            .await?;

        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        Ok(Some(X509::stack_from_pem(&resp_bytes)?))
    }
}

fn gen_csr(key_pair: &PKey<Private>, domains: &[String]) -> Result<X509Req, AcmeError> {
    if domains.is_empty() {
        return Err(AcmeError::Csr(
            "at least one domain name needs to be supplied".to_string(),
        ));
    }

    let mut builder = X509Req::builder()?;
    let name = {
        let mut name = X509Name::builder()?;
        name.append_entry_by_text("CN", &domains[0])?;
        name.build()
    };
    builder.set_subject_name(&name)?;

    let san_extension = {
        let mut san = SubjectAlternativeName::new();
        for domain in domains {
            san.dns(domain);
        }
        san.build(&builder.x509v3_context(None))?
    };
    let mut stack = Stack::new()?;
    stack.push(san_extension)?;
    builder.add_extensions(&stack)?;

    builder.set_pubkey(key_pair)?;
    builder.sign(key_pair, MessageDigest::sha256())?;

    Ok(builder.build())
}
