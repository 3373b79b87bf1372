// Authentication probe port
// Answers "is the external generation tool logged in and usable right now?"
use async_trait::async_trait;

/// Uncached authentication check against the external tool
///
/// Callers normally go through `application::auth::CachedAuthCheck`.
#[async_trait]
pub trait AuthProbe: Send + Sync {
    async fn is_authenticated(&self) -> bool;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Probe with a switchable answer that counts how often it was asked
    pub struct StaticAuthProbe {
        authenticated: AtomicBool,
        calls: AtomicUsize,
    }

    impl StaticAuthProbe {
        pub fn new(authenticated: bool) -> Self {
            Self {
                authenticated: AtomicBool::new(authenticated),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_authenticated(&self, authenticated: bool) {
            self.authenticated.store(authenticated, Ordering::SeqCst);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthProbe for StaticAuthProbe {
        async fn is_authenticated(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.authenticated.load(Ordering::SeqCst)
        }
    }
}
