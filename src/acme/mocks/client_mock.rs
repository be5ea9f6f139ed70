use async_trait::async_trait;
use hyper::{Body, Request, Response};
use mockall::mock;

use crate::acme::client::AcmeHttpClient;
use crate::acme::error::AcmeError;

mock! {
    pub AcmeHttpClient {}

    #[async_trait]
    impl AcmeHttpClient for AcmeHttpClient {
        async fn send(&self, request: Request<Body>) -> Result<Response<Body>, AcmeError>;
    }
}
