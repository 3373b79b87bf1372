// Cached authentication check
// TTL cache over the external tool's auth probe, driven by an injected clock

use crate::port::{AuthProbe, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

pub const UNAUTHENTICATED_MESSAGE: &str =
    "The external generation tool is not authenticated. Log in with its CLI, then retry.";
pub const AUTHENTICATED_MESSAGE: &str = "The external generation tool is ready.";

/// Test hook forcing the reported authentication result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOverride {
    Authenticated,
    Unauthenticated,
}

impl std::str::FromStr for AuthOverride {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authenticated" => Ok(AuthOverride::Authenticated),
            "unauthenticated" => Ok(AuthOverride::Unauthenticated),
            other => Err(format!(
                "force must be 'authenticated' or 'unauthenticated', got '{}'",
                other
            )),
        }
    }
}

/// Status report for the generation tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub cli_authenticated: bool,
    #[serde(rename = "canUseAI")]
    pub can_use_ai: bool,
    pub message: String,
}

impl AuthStatus {
    pub fn from_authenticated(authenticated: bool) -> Self {
        Self {
            authenticated,
            cli_authenticated: authenticated,
            can_use_ai: authenticated,
            message: if authenticated {
                AUTHENTICATED_MESSAGE
            } else {
                UNAUTHENTICATED_MESSAGE
            }
            .to_string(),
        }
    }
}

/// Cached result: (authenticated, checked_at epoch ms)
type CacheEntry = (bool, i64);

/// Authentication check with an explicit TTL
pub struct CachedAuthCheck {
    probe: Arc<dyn AuthProbe>,
    time_provider: Arc<dyn TimeProvider>,
    ttl_ms: i64,
    cache: Mutex<Option<CacheEntry>>,
}

impl CachedAuthCheck {
    pub fn new(probe: Arc<dyn AuthProbe>, time_provider: Arc<dyn TimeProvider>, ttl: Duration) -> Self {
        Self {
            probe,
            time_provider,
            ttl_ms: ttl.as_millis() as i64,
            cache: Mutex::new(None),
        }
    }

    /// Cached answer, re-probing once the TTL has elapsed
    pub async fn is_authenticated(&self) -> bool {
        let now = self.time_provider.now_millis();
        let mut cache = self.cache.lock().await;

        if let Some((authenticated, checked_at)) = *cache {
            if now - checked_at < self.ttl_ms {
                return authenticated;
            }
        }

        let authenticated = self.probe.is_authenticated().await;
        debug!(authenticated = authenticated, "Authentication probe refreshed");
        *cache = Some((authenticated, now));
        authenticated
    }

    /// Status with an optional forced result (never touches the cache)
    pub async fn status(&self, force: Option<AuthOverride>) -> AuthStatus {
        let authenticated = match force {
            Some(AuthOverride::Authenticated) => true,
            Some(AuthOverride::Unauthenticated) => false,
            None => self.is_authenticated().await,
        };
        AuthStatus::from_authenticated(authenticated)
    }
}
