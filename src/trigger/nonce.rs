//! Anti-replay tokens for admin actions.
//!
//! A token is an HMAC-SHA256 over `action|user_id|tick`, truncated and
//! base64url encoded. Ticks are half a lifetime long and a token is accepted
//! during the tick it was issued in and the one after, so it stays valid for
//! between half and a full lifetime.

use crate::site_store::SiteStore;
use anyhow::{Context, Result};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

type HmacSha256 = Hmac<Sha256>;

pub const ACTION_FORCE_RUN: &str = "stc-force-run";
pub const ACTION_QUEUE_REMOVE: &str = "stc-queue-remove";

pub const NONCE_LIFETIME_SECS: i64 = 86_400;
const TOKEN_BYTES: usize = 12;
const SECRET_OPTION: &str = "stc_nonce_secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("nonce secret must not be empty")]
    EmptySecret,
    #[error("nonce secret was rejected by the MAC")]
    InvalidKey,
}

pub struct NonceIssuer {
    secret: Vec<u8>,
    lifetime_secs: i64,
}

impl NonceIssuer {
    pub fn new(secret: Vec<u8>) -> Result<Self, NonceError> {
        if secret.is_empty() {
            return Err(NonceError::EmptySecret);
        }
        HmacSha256::new_from_slice(&secret).map_err(|_| NonceError::InvalidKey)?;
        Ok(Self {
            secret,
            lifetime_secs: NONCE_LIFETIME_SECS,
        })
    }

    fn tick(&self, now: i64) -> i64 {
        now.div_euclid(self.lifetime_secs / 2)
    }

    fn mac(&self, action: &str, user_id: usize, tick: i64) -> Result<HmacSha256, NonceError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| NonceError::InvalidKey)?;
        mac.update(format!("{}|{}|{}", action, user_id, tick).as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, action: &str, user_id: usize) -> Result<String, NonceError> {
        self.issue_at(action, user_id, Utc::now().timestamp())
    }

    pub fn issue_at(&self, action: &str, user_id: usize, now: i64) -> Result<String, NonceError> {
        let tag = self.mac(action, user_id, self.tick(now))?.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(&tag[..TOKEN_BYTES]))
    }

    pub fn verify(&self, token: &str, action: &str, user_id: usize) -> bool {
        self.verify_at(token, action, user_id, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, action: &str, user_id: usize, now: i64) -> bool {
        let Ok(bytes) = URL_SAFE_NO_PAD.decode(token.trim()) else {
            return false;
        };
        if bytes.len() != TOKEN_BYTES {
            return false;
        }
        let tick = self.tick(now);
        [tick, tick - 1].into_iter().any(|t| {
            self.mac(action, user_id, t)
                .map(|mac| mac.verify_truncated_left(&bytes).is_ok())
                .unwrap_or(false)
        })
    }
}

/// Decodes the configured secret, or the one persisted in the site options,
/// generating and persisting a new one when neither exists.
pub fn load_or_create_secret(
    site_store: &Arc<dyn SiteStore>,
    configured: Option<&str>,
) -> Result<Vec<u8>> {
    if let Some(configured) = configured {
        return Ok(configured.as_bytes().to_vec());
    }
    if let Some(stored) = site_store.get_option(SECRET_OPTION)? {
        return STANDARD
            .decode(stored.trim())
            .context("Stored nonce secret is not valid base64");
    }

    let mut secret = [0u8; 32];
    rand::rng().fill(&mut secret);
    site_store.set_option(SECRET_OPTION, &STANDARD.encode(secret))?;
    info!("Generated a new nonce secret");
    Ok(secret.to_vec())
}
