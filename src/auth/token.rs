use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::error::ApiError;

pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(300);

/// A bearer credential and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    scheme: String,
    value: String,
    lifetime: Duration,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(scheme: impl Into<String>, value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            scheme: scheme.into(),
            value: value.into(),
            lifetime,
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn bearer(value: impl Into<String>, lifetime: Duration) -> Self {
        Self::new("Bearer", value, lifetime)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.scheme, self.value)
    }

    /// The margin never exceeds half the reported lifetime, so short-lived
    /// tokens are still reused.
    fn is_fresh(&self, margin: Duration) -> bool {
        Instant::now() + margin.min(self.lifetime / 2) < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("scheme", &self.scheme)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where fresh credentials come from.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, ApiError>;
}

type SharedFetch = Shared<BoxFuture<'static, Result<AccessToken, ApiError>>>;

enum Slot {
    Empty,
    Ready(AccessToken),
    Pending { generation: u64, fetch: SharedFetch },
}

struct State {
    slot: Slot,
    generation: u64,
}

/// Single-tenant token cache.
///
/// Concurrent callers that find no fresh token share one in-flight refresh.
/// A failed refresh is handed to every waiter and leaves the cache empty,
/// so the next call starts over.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    margin: Duration,
    state: Mutex<State>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            margin: DEFAULT_SAFETY_MARGIN,
            state: Mutex::new(State {
                slot: Slot::Empty,
                generation: 0,
            }),
        }
    }

    /// Treat tokens as expired this long before their reported expiry.
    pub fn safety_margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    pub async fn fetch_token(&self) -> Result<AccessToken, ApiError> {
        let (generation, fetch) = {
            let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let state = &mut *guard;
            match &state.slot {
                Slot::Ready(token) if token.is_fresh(self.margin) => return Ok(token.clone()),
                Slot::Pending { generation, fetch } => (*generation, fetch.clone()),
                _ => {
                    state.generation += 1;
                    let generation = state.generation;
                    let source = self.source.clone();
                    let fetch = async move { source.fetch_token().await }.boxed().shared();

                    #[cfg(feature = "tracing")]
                    tracing::event!(
                        tracing::Level::DEBUG,
                        event = "waivepipe.token.refresh",
                        generation = generation,
                        "waivepipe.token.refresh"
                    );

                    state.slot = Slot::Pending {
                        generation,
                        fetch: fetch.clone(),
                    };
                    (generation, fetch)
                }
            }
        };

        let result = fetch.await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = matches!(&state.slot, Slot::Pending { generation: g, .. } if *g == generation);
        if current {
            state.slot = match &result {
                Ok(token) => Slot::Ready(token.clone()),
                Err(_) => Slot::Empty,
            };
        }

        #[cfg(feature = "tracing")]
        if let Err(err) = &result {
            tracing::event!(
                tracing::Level::WARN,
                event = "waivepipe.token.refresh_failed",
                error = %err,
                "waivepipe.token.refresh_failed"
            );
        }

        result
    }

    /// Drop a cached token so the next call refreshes it.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(state.slot, Slot::Ready(_)) {
            state.slot = Slot::Empty;
        }
    }
}
