//! A scripted ACME server behind the mocked HTTP client.
//!
//! Routes on the request path and walks a single order through the issuance
//! flow: directory, nonce, account, order, one authorization with one http-01
//! challenge, finalize, certificate download.

use std::sync::{Arc, Mutex};

use hyper::{Body, Response};
use serde_json::json;

use super::client_mock::MockAcmeHttpClient;

pub const BASE_URL: &str = "https://acme.test";

pub fn directory_url() -> String {
    format!("{BASE_URL}/directory")
}

/// How the scripted server resolves the http-01 challenge.
#[derive(Debug, Clone, Copy)]
pub enum ChallengeScript {
    /// Pending on trigger, valid on the first poll.
    ValidOnFirstPoll,
    /// Pending on trigger, invalid with this problem detail on the first poll.
    InvalidWithDetail(&'static str),
    /// Pending forever.
    NeverResolves,
    /// The authorization only offers dns-01.
    Http01NotOffered,
}

pub fn scripted_acme_server(
    domain: &str,
    script: ChallengeScript,
    certificate_pem: String,
) -> MockAcmeHttpClient {
    let domain = domain.to_string();
    let challenge_calls = Arc::new(Mutex::new(0u32));

    let mut mock = MockAcmeHttpClient::new();
    mock.expect_send().returning(move |request| {
        let path = request.uri().path().to_string();

        let response = match path.as_str() {
            "/directory" => json_response(
                200,
                None,
                json!({
                    "newNonce": format!("{BASE_URL}/new-nonce"),
                    "newAccount": format!("{BASE_URL}/new-account"),
                    "newOrder": format!("{BASE_URL}/new-order"),
                    "meta": { "termsOfService": format!("{BASE_URL}/terms") },
                })
                .to_string(),
            ),
            "/new-nonce" => json_response(200, None, String::new()),
            "/new-account" => json_response(
                201,
                Some(format!("{BASE_URL}/account/1")),
                json!({ "status": "valid", "termsOfServiceAgreed": true }).to_string(),
            ),
            "/new-order" => json_response(
                201,
                Some(format!("{BASE_URL}/order/1")),
                order_body("pending", &domain, None).to_string(),
            ),
            "/authz/1" => {
                let challenges = match script {
                    ChallengeScript::Http01NotOffered => json!([{
                        "type": "dns-01",
                        "url": format!("{BASE_URL}/chall/1"),
                        "status": "pending",
                        "token": "tok1",
                    }]),
                    _ => json!([{
                        "type": "http-01",
                        "url": format!("{BASE_URL}/chall/1"),
                        "status": "pending",
                        "token": "tok1",
                    }]),
                };
                json_response(
                    200,
                    None,
                    json!({
                        "identifier": { "type": "dns", "value": domain },
                        "status": "pending",
                        "challenges": challenges,
                    })
                    .to_string(),
                )
            }
            "/chall/1" => {
                let mut calls = challenge_calls.lock().unwrap();
                *calls += 1;
                // the first request is the trigger, later requests are polls
                let body = if *calls == 1 {
                    challenge_body("pending", None)
                } else {
                    match script {
                        ChallengeScript::ValidOnFirstPoll => challenge_body("valid", None),
                        ChallengeScript::InvalidWithDetail(detail) => {
                            challenge_body("invalid", Some(detail))
                        }
                        ChallengeScript::NeverResolves | ChallengeScript::Http01NotOffered => {
                            challenge_body("pending", None)
                        }
                    }
                };
                json_response(200, None, body.to_string())
            }
            "/order/1/finalize" => json_response(
                200,
                None,
                order_body("processing", &domain, None).to_string(),
            ),
            "/order/1" => json_response(
                200,
                None,
                order_body("valid", &domain, Some(format!("{BASE_URL}/cert/1"))).to_string(),
            ),
            "/cert/1" => json_response(200, None, certificate_pem.clone()),
            other => json_response(404, None, format!("unexpected path {other}")),
        };
        Ok(response)
    });
    mock
}

fn order_body(status: &str, domain: &str, certificate_url: Option<String>) -> serde_json::Value {
    let mut body = json!({
        "status": status,
        "identifiers": [{ "type": "dns", "value": domain }],
        "authorizations": [format!("{BASE_URL}/authz/1")],
        "finalize": format!("{BASE_URL}/order/1/finalize"),
    });
    if let Some(url) = certificate_url {
        body["certificate"] = json!(url);
    }
    body
}

fn challenge_body(status: &str, detail: Option<&str>) -> serde_json::Value {
    let mut body = json!({
        "type": "http-01",
        "url": format!("{BASE_URL}/chall/1"),
        "status": status,
        "token": "tok1",
    });
    if let Some(detail) = detail {
        body["error"] = json!({
            "type": "urn:ietf:params:acme:error:unauthorized",
            "detail": detail,
        });
    }
    body
}

fn json_response(status: u16, location: Option<String>, body: String) -> Response<Body> {
    let mut builder = Response::builder()
        .status(status)
        .header("replay-nonce", "test-nonce")
        .header("content-type", "application/json");
    if let Some(location) = location {
        builder = builder.header(hyper::header::LOCATION, location);
    }
    builder.body(Body::from(body)).unwrap()
}
