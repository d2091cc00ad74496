//! API key authentication for the HTTP transport.
//!
//! Keys come from `MCP_API_KEY_<NAME>` environment variables (never expire)
//! or from the key generation endpoint (expire after a number of days).
//! Expired keys are dropped the next time they are presented.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Prefix of environment variables holding preconfigured keys.
pub const ENV_KEY_PREFIX: &str = "MCP_API_KEY_";

#[derive(Debug, Clone)]
struct ApiKeyInfo {
    name: String,
    expires_at: Option<DateTime<Utc>>,
}

impl ApiKeyInfo {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Authentication summary reported by the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStatus {
    pub enabled: bool,
    pub active_keys: usize,
    pub auth_type: &'static str,
}

/// In-memory API key table.
#[derive(Debug)]
pub struct ApiKeyStore {
    enabled: bool,
    keys: DashMap<String, ApiKeyInfo>,
}

impl ApiKeyStore {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            keys: DashMap::new(),
        }
    }

    /// Create a store preloaded with keys from the process environment.
    pub fn from_env(enabled: bool) -> Self {
        let store = Self::new(enabled);
        store.load_from_vars(std::env::vars());
        store
    }

    /// Load `MCP_API_KEY_<NAME>=<key>` pairs. Returns how many keys were added.
    pub fn load_from_vars<I>(&self, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (var, value) in vars {
            let Some(name) = var.strip_prefix(ENV_KEY_PREFIX) else {
                continue;
            };
            if name.is_empty() || value.is_empty() {
                continue;
            }
            info!("Loaded API key for '{}' from environment", name);
            self.insert(value, name, None);
            loaded += 1;
        }
        loaded
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn insert(
        &self,
        key: impl Into<String>,
        name: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.keys.insert(
            key.into(),
            ApiKeyInfo {
                name: name.into(),
                expires_at,
            },
        );
    }

    /// Generate a random key for `name` that expires after `expires_days`.
    pub fn generate(&self, name: &str, expires_days: i64) -> Result<String> {
        let expires_at = Duration::try_days(expires_days)
            .filter(|_| expires_days > 0)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                Error::InvalidParams(format!("Invalid expires_days: {}", expires_days))
            })?;

        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let key = URL_SAFE_NO_PAD.encode(bytes);

        self.insert(key.clone(), name, Some(expires_at));
        info!(
            "Generated new API key for '{}', expires in {} days",
            name, expires_days
        );
        Ok(key)
    }

    /// Whether `key` is known and unexpired. Expired keys are removed.
    pub fn validate(&self, key: &str) -> bool {
        let now = Utc::now();
        let expired = match self.keys.get(key) {
            None => return false,
            Some(info) => info.is_expired(now),
        };
        if expired {
            if let Some((_, info)) = self.keys.remove(key) {
                info!("API key for '{}' expired", info.name);
            }
            return false;
        }
        true
    }

    pub fn active_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            enabled: self.enabled,
            active_keys: self.active_keys(),
            auth_type: "API Key",
        }
    }
}

/// Reject requests without a valid key. The health route stays open.
pub async fn require_api_key(
    State(store): State<Arc<ApiKeyStore>>,
    request: Request,
    next: Next,
) -> Response {
    if !store.is_enabled() || request.uri().path() == "/" {
        return next.run(request).await;
    }

    let valid = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| store.validate(key));

    if valid {
        next.run(request).await
    } else {
        warn!("Rejected request to {}: invalid or missing API key", request.uri().path());
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "Invalid or missing API key" })),
        )
            .into_response()
    }
}
