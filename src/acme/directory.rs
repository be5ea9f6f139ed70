//! Directory discovery, nonce handling and the signed request primitive.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hyper::{Body, Request, Response};
use openssl::pkey::{PKey, Private};
use serde::Deserialize;
use serde_json::Value;

use crate::acme::client::AcmeHttpClient;
use crate::acme::error::{AcmeError, AcmeProblem};
use crate::acme::jws::sign_jws;

const REPLAY_NONCE_HEADER: &str = "replay-nonce";
const RETRY_AFTER_HEADER: &str = "retry-after";
const JOSE_CONTENT_TYPE: &str = "application/jose+json";

#[derive(Deserialize, Debug)]
pub struct DirectoryUrls {
    #[serde(rename = "newNonce")]
    pub new_nonce_url: String,
    #[serde(rename = "newAccount")]
    pub new_account_url: String,
    #[serde(rename = "newOrder")]
    pub new_order_url: String,
    pub meta: Option<DirectoryMeta>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryMeta {
    pub terms_of_service: Option<String>,
    pub website: Option<String>,
}

/// One ACME directory session: the resolved endpoint URLs plus the nonce
/// carried between requests.
pub struct Directory<T: AcmeHttpClient> {
    client: T,
    nonce: Mutex<Option<String>>,
    pub urls: DirectoryUrls,
}

impl<T: AcmeHttpClient> Directory<T> {
    pub async fn fetch(url: &str, client: T) -> Result<Arc<Directory<T>>, AcmeError> {
        let request = Request::builder()
            .method("GET")
            .uri(url)
            .body(Body::empty())?;

        let response = client.send(request).await.map_err(|err| match err {
            AcmeError::Transport(source) => AcmeError::Connection {
                url: url.to_string(),
                reason: source.to_string(),
            },
            other => other,
        })?;
        if !response.status().is_success() {
            return Err(AcmeError::Connection {
                url: url.to_string(),
                reason: format!("directory responded with status {}", response.status()),
            });
        }

        let resp_bytes = hyper::body::to_bytes(response.into_body()).await?;
        let urls: DirectoryUrls = serde_json::from_slice(&resp_bytes)?;

        Ok(Arc::new(Directory {
            client,
            nonce: Mutex::new(None),
            urls,
        }))
    }

    async fn take_nonce(&self) -> Result<String, AcmeError> {
        if let Some(nonce) = lock_slot(&self.nonce).take() {
            return Ok(nonce);
        }

        let request = Request::builder()
            .method("GET")
            .uri(&self.urls.new_nonce_url)
            .body(Body::empty())?;
        let response = self.client.send(request).await?;

        extract_nonce(&response)?.ok_or(AcmeError::NoNonce)
    }

    /// Signs `payload` as a JWS and POSTs it to `url`. A `None` payload is
    /// the empty-body POST-as-GET form. The replay nonce of every response,
    /// success or failure, is kept for the next request.
    pub(crate) async fn authenticated_request(
        &self,
        url: &str,
        payload: Option<Value>,
        key: &PKey<Private>,
        account_id: Option<&str>,
    ) -> Result<Response<Body>, AcmeError> {
        let nonce = self.take_nonce().await?;
        let payload = match &payload {
            Some(value) => value.to_string(),
            None => String::new(),
        };
        let jws = sign_jws(url, Some(nonce), &payload, key, account_id)?;

        let request = Request::builder()
            .method("POST")
            .uri(url)
            .header(hyper::header::CONTENT_TYPE, JOSE_CONTENT_TYPE)
            .body(Body::from(serde_json::to_string(&jws)?))?;
        let response = self.client.send(request).await?;

        if let Some(nonce) = extract_nonce(&response)? {
            *lock_slot(&self.nonce) = Some(nonce);
        }

        if !response.status().is_success() {
            return Err(error_from_response(url, response).await);
        }
        Ok(response)
    }
}

pub(crate) fn retry_after_hint(response: &Response<Body>) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn location_header(response: &Response<Body>) -> Result<String, AcmeError> {
    response
        .headers()
        .get(hyper::header::LOCATION)
        .ok_or(AcmeError::MissingLocationHeader)?
        .to_str()
        .map(str::to_string)
        .map_err(AcmeError::from)
}

fn extract_nonce(response: &Response<Body>) -> Result<Option<String>, AcmeError> {
    response
        .headers()
        .get(REPLAY_NONCE_HEADER)
        .map(|nonce| {
            nonce
                .to_str()
                .map(str::to_string)
                .map_err(AcmeError::HeaderConversion)
        })
        .transpose()
}

async fn error_from_response(url: &str, response: Response<Body>) -> AcmeError {
    let status = response.status();
    let problem = match hyper::body::to_bytes(response.into_body()).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => AcmeProblem::default(),
    };
    AcmeError::FailedRequest {
        url: url.to_string(),
        status,
        problem,
    }
}

fn lock_slot(nonce: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    nonce.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
