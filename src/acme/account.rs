//! ACME account registration.

use std::sync::Arc;

use openssl::pkey::{PKey, Private};
use serde::Deserialize;
use serde_json::json;

use crate::acme::client::AcmeHttpClient;
use crate::acme::directory::{location_header, Directory};
use crate::acme::error::AcmeError;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AccountStatus {
    Valid,
    Deactivated,
    Revoked,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AccountResource {
    pub status: AccountStatus,
    pub contact: Option<Vec<String>>,
    pub terms_of_service_agreed: Option<bool>,
}

/// A registered account: the signing key plus the `kid` URL the server
/// assigned to it.
pub struct Account<T: AcmeHttpClient> {
    pub(crate) directory: Arc<Directory<T>>,
    pub(crate) key: PKey<Private>,
    id: String,
    resource: AccountResource,
}

impl<T: AcmeHttpClient> Account<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> &AccountStatus {
        &self.resource.status
    }
}

/// Registers the account bound to the supplied key, or fetches the existing
/// one when the server already knows the key.
pub struct AccountBuilder<T: AcmeHttpClient> {
    directory: Arc<Directory<T>>,
    contact: Vec<String>,
    terms_of_service_agreed: bool,
}

impl<T: AcmeHttpClient> AccountBuilder<T> {
    pub fn new(directory: Arc<Directory<T>>) -> Self {
        Self {
            directory,
            contact: Vec::new(),
            terms_of_service_agreed: false,
        }
    }

    pub fn contact_email(mut self, email: &str) -> Self {
        self.contact.push(format!("mailto:{email}"));
        self
    }

    pub fn terms_of_service_agreed(mut self, agreed: bool) -> Self {
        self.terms_of_service_agreed = agreed;
        self
    }

    pub async fn build(self, key: PKey<Private>) -> Result<Arc<Account<T>>, AcmeError> {
        let url = self.directory.urls.new_account_url.clone();
        let payload = json!({
            "contact": self.contact,
            "termsOfServiceAgreed": self.terms_of_service_agreed,
            "onlyReturnExisting": false,
        });

        let response = self
            .directory
            .authenticated_request(&url, Some(payload), &key, None)
            .await
            .map_err(|err| match err {
                AcmeError::FailedRequest { problem, .. } => AcmeError::Account(problem.to_string()),
                other => other,
            })?;

        let id = location_header(&response)?;
        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        let resource: AccountResource = serde_json::from_slice(&resp_bytes)?;

        log::info!(
            "[ACME] Account registered at {id} for contacts {:?}",
            self.contact
        );
        Ok(Arc::new(Account {
            directory: self.directory,
            key,
            id,
            resource,
        }))
    }
}
