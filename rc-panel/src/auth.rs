use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use axum::http::{HeaderMap, header::COOKIE};
use tracing::{info, warn};
use uuid::Uuid;

use crate::logging::category_auth;

pub const SESSION_COOKIE: &str = "rtoken";

/// In-process operator sessions unlocked by a shared PIN.
#[derive(Clone, Debug, Default)]
pub struct OperatorSessions {
    pin: Option<String>,
    tokens: Arc<Mutex<HashSet<String>>>,
}

impl OperatorSessions {
    pub fn new(pin: Option<String>) -> Self {
        if pin.is_none() {
            warn!(
                "{} no operator PIN configured; operator login is disabled",
                category_auth()
            );
        }
        Self {
            pin,
            tokens: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Returns a fresh session token when `pin` matches.
    pub fn login_with_pin(&self, pin: &str) -> Option<String> {
        let expected = self.pin.as_deref()?;
        if pin.trim() != expected {
            warn!("{} rejected operator PIN", category_auth());
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.lock_tokens().insert(token.clone());
        info!("{} operator session opened", category_auth());
        Some(token)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.lock_tokens().contains(token)
    }

    pub fn logout(&self, token: &str) -> bool {
        let removed = self.lock_tokens().remove(token);
        if removed {
            info!("{} operator session closed", category_auth());
        }
        removed
    }

    pub fn is_operator(&self, headers: &HeaderMap) -> bool {
        token_from_cookie(headers).is_some_and(|token| self.is_valid(&token))
    }

    fn lock_tokens(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.tokens.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

pub fn token_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
