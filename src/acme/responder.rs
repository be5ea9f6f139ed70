//! Single-slot http-01 challenge register shared with the embedding server.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Path prefix the ACME server fetches challenge responses from.
pub const ACME_CHALLENGE_PREFIX: &str = "/.well-known/acme-challenge/";

#[derive(Debug, Clone)]
struct ActiveChallenge {
    token: String,
    key_authorization: String,
}

/// Hands the current challenge response to the external HTTP layer.
///
/// At most one challenge is active at a time; registering a new one replaces
/// the previous. Clones share the same slot, so the workflow task and the
/// HTTP worker threads each hold their own handle. The challenge path must be
/// reachable without authentication, by protocol design.
#[derive(Debug, Clone, Default)]
pub struct ChallengeResponder {
    current: Arc<RwLock<Option<ActiveChallenge>>>,
}

impl ChallengeResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&self, token: &str, key_authorization: &str) {
        log::debug!("[ACME] Activating http-01 challenge for token {token}");
        *write_slot(&self.current) = Some(ActiveChallenge {
            token: token.to_string(),
            key_authorization: key_authorization.to_string(),
        });
    }

    pub fn clear(&self) {
        if write_slot(&self.current).take().is_some() {
            log::debug!("[ACME] Cleared active http-01 challenge");
        }
    }

    /// The absolute path the active challenge answers, if one is active.
    pub fn current_challenge_path(&self) -> Option<String> {
        read_slot(&self.current)
            .as_ref()
            .map(|challenge| format!("{ACME_CHALLENGE_PREFIX}{}", challenge.token))
    }

    /// Key-authorization bytes (to be served as `text/plain`) when `path` is
    /// exactly the active challenge path. `None` means the request is not
    /// ours and the caller should fall through to its other handlers.
    pub fn respond(&self, path: &str) -> Option<Vec<u8>> {
        let slot = read_slot(&self.current);
        let challenge = slot.as_ref()?;
        if path == format!("{ACME_CHALLENGE_PREFIX}{}", challenge.token) {
            Some(challenge.key_authorization.clone().into_bytes())
        } else {
            None
        }
    }
}

fn read_slot(
    slot: &RwLock<Option<ActiveChallenge>>,
) -> RwLockReadGuard<'_, Option<ActiveChallenge>> {
    slot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_slot(
    slot: &RwLock<Option<ActiveChallenge>>,
) -> RwLockWriteGuard<'_, Option<ActiveChallenge>> {
    slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
