//! HTTP transport used to reach the ACME directory.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use tokio_rustls::rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};

use crate::acme::error::AcmeError;

/// Transport seam for ACME requests; mocked in tests.
#[async_trait]
pub trait AcmeHttpClient: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, AcmeError>;
}

#[async_trait]
impl<T: AcmeHttpClient> AcmeHttpClient for Arc<T> {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, AcmeError> {
        self.as_ref().send(request).await
    }
}

/// Hyper client with the webpki trust anchors; the default transport.
#[derive(Clone)]
pub struct HyperAcmeClient {
    client: hyper::Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperAcmeClient {
    pub fn new() -> Self {
        let mut root_cert_store = RootCertStore::empty();
        root_cert_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(config)
            .https_only()
            .enable_http1()
            .build();

        Self {
            client: hyper::Client::builder().build(connector),
        }
    }
}

impl Default for HyperAcmeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcmeHttpClient for HyperAcmeClient {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, AcmeError> {
        Ok(self.client.request(request).await?)
    }
}
