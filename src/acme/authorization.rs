//! Domain-ownership proofs and their http-01 challenges.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::acme::account::Account;
use crate::acme::client::AcmeHttpClient;
use crate::acme::directory::retry_after_hint;
use crate::acme::error::{AcmeError, AcmeProblem};
use crate::acme::jws::Jwk;
use crate::acme::order::{Identifier, Order};

pub const HTTP01_CHALLENGE_TYPE: &str = "http-01";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationStatus {
    Pending,
    Valid,
    Invalid,
    Deactivated,
    Expired,
    Revoked,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChallengeStatus {
    Pending,
    Processing,
    Valid,
    Invalid,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResource {
    pub r#type: String,
    pub url: String,
    pub status: ChallengeStatus,
    pub token: Option<String>,
    pub validated: Option<String>,
    pub error: Option<AcmeProblem>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResource {
    pub identifier: Identifier,
    pub status: AuthorizationStatus,
    pub challenges: Vec<ChallengeResource>,
    pub expires: Option<String>,
    pub wildcard: Option<bool>,
}

/// Proof-of-control record for one domain within an order. Created per order,
/// discarded when the order completes or fails.
pub struct Authorization<T: AcmeHttpClient> {
    account: Arc<Account<T>>,
    url: String,
    resource: AuthorizationResource,
}

impl<T: AcmeHttpClient> Order<T> {
    pub async fn authorizations(&self) -> Result<Vec<Authorization<T>>, AcmeError> {
        let mut authorizations = Vec::new();

        for url in self.resource.authorization_urls.clone() {
            let directory = self.account.directory.clone();
            let response = directory
                .authenticated_request(&url, None, &self.account.key, Some(self.account.id()))
                .await?;

            let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
            let resource: AuthorizationResource = serde_json::from_slice(&resp_bytes)?;

            authorizations.push(Authorization {
                account: self.account.clone(),
                url,
                resource,
            });
        }

        Ok(authorizations)
    }
}

impl<T: AcmeHttpClient> Authorization<T> {
    pub fn status(&self) -> AuthorizationStatus {
        self.resource.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn domain(&self) -> &str {
        &self.resource.identifier.value
    }

    pub fn http01_challenge(&self) -> Option<Challenge<T>> {
        self.resource
            .challenges
            .iter()
            .find(|challenge| challenge.r#type == HTTP01_CHALLENGE_TYPE)
            .map(|resource| Challenge {
                account: self.account.clone(),
                resource: resource.clone(),
            })
    }
}

pub struct Challenge<T: AcmeHttpClient> {
    account: Arc<Account<T>>,
    resource: ChallengeResource,
}

impl<T: AcmeHttpClient> Challenge<T> {
    pub fn status(&self) -> ChallengeStatus {
        self.resource.status
    }

    pub fn token(&self) -> Result<&str, AcmeError> {
        self.resource.token.as_deref().ok_or(AcmeError::MissingToken)
    }

    pub fn problem_detail(&self) -> String {
        self.resource
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "no problem detail supplied".to_string())
    }

    /// Token plus the account key thumbprint; served as the http-01 response
    /// body.
    pub fn key_authorization(&self) -> Result<String, AcmeError> {
        let token = self.token()?;
        let thumbprint = Jwk::new(&self.account.key)?.thumbprint()?;
        Ok(format!("{token}.{thumbprint}"))
    }

    /// Signals the server to begin validating.
    pub async fn trigger(&mut self) -> Result<(), AcmeError> {
        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(
                &self.resource.url,
                Some(json!({})),
                &self.account.key,
                Some(self.account.id()),
            )
            .await?;

        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        self.resource = serde_json::from_slice(&resp_bytes)?;
        Ok(())
    }

    /// Re-fetches the challenge; returns the server's retry hint when given.
    pub async fn refresh(&mut self) -> Result<Option<Duration>, AcmeError> {
        let directory = self.account.directory.clone();
        let response = directory
            .authenticated_request(
                &self.resource.url,
                None,
                &self.account.key,
                Some(self.account.id()),
            )
            .await?;

        let hint = retry_after_hint(&response);
        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        self.resource = serde_json::from_slice(&resp_bytes)?;
        Ok(hint)
    }
}
