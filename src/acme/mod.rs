//! ACME v2 (RFC 8555) client surface.
//!
//! Only http-01 domain validation is implemented: the validation response is
//! published through [`responder::ChallengeResponder`] and served by the
//! embedding HTTP server at `/.well-known/acme-challenge/<token>`. The
//! [`workflow`] module drives account registration, ordering, validation,
//! finalization and certificate download against a directory reached through
//! the [`client::AcmeHttpClient`] seam.

pub mod account;
pub mod authorization;
pub mod client;
pub mod directory;
pub mod error;
pub mod helpers;
pub mod jws;
pub mod order;
pub mod responder;
pub mod workflow;

#[cfg(test)]
pub mod mocks;
