use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use waivepipe::auth::token::{AccessToken, TokenCache, TokenSource};
use waivepipe::error::{ApiError, Result};

mod common;
use common::{client, FakeApi};

/// Takes one second per exchange; optionally fails the first `fail_first`.
struct SlowSource {
    fetches: AtomicUsize,
    fail_first: usize,
    lifetime: Duration,
}

impl SlowSource {
    fn new(lifetime: Duration) -> Self {
        Self {
            fetches: AtomicUsize::new(0),
            fail_first: 0,
            lifetime,
        }
    }

    fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for SlowSource {
    async fn fetch_token(&self) -> std::result::Result<AccessToken, ApiError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(Duration::from_secs(1)).await;
        if n <= self.fail_first {
            return Err(ApiError::Status {
                status: 503,
                reason: "Service Unavailable".to_string(),
            });
        }
        Ok(AccessToken::bearer(format!("tok-{n}"), self.lifetime))
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_exchange() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(3600)));
    let cache = TokenCache::new(source.clone());

    let (a, b, c) = tokio::join!(cache.fetch_token(), cache.fetch_token(), cache.fetch_token());

    assert_eq!(source.fetches(), 1);
    let a = a.expect("token");
    assert_eq!(a.value(), "tok-1");
    assert_eq!(b.expect("token"), a);
    assert_eq!(c.expect("token"), a);
}

#[tokio::test(start_paused = true)]
async fn fresh_token_is_served_from_cache() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(3600)));
    let cache = TokenCache::new(source.clone());

    for _ in 0..5 {
        cache.fetch_token().await.expect("token");
    }
    assert_eq!(source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn token_is_refreshed_inside_the_safety_margin() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(600)));
    let cache = TokenCache::new(source.clone()).safety_margin(Duration::from_secs(300));

    cache.fetch_token().await.expect("token");
    tokio::time::advance(Duration::from_secs(200)).await;
    let still = cache.fetch_token().await.expect("token");
    assert_eq!(still.value(), "tok-1");

    tokio::time::advance(Duration::from_secs(120)).await;
    let renewed = cache.fetch_token().await.expect("token");
    assert_eq!(renewed.value(), "tok-2");
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn short_lived_token_is_reused_despite_a_larger_margin() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(60)));
    let cache = TokenCache::new(source.clone()).safety_margin(Duration::from_secs(300));

    cache.fetch_token().await.expect("token");
    tokio::time::advance(Duration::from_secs(20)).await;
    let still = cache.fetch_token().await.expect("token");
    assert_eq!(still.value(), "tok-1");
    assert_eq!(source.fetches(), 1);

    tokio::time::advance(Duration::from_secs(15)).await;
    let renewed = cache.fetch_token().await.expect("token");
    assert_eq!(renewed.value(), "tok-2");
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_exchange_reaches_every_waiter_and_is_not_cached() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(3600)).failing_first(1));
    let cache = TokenCache::new(source.clone());

    let (a, b, c) = tokio::join!(cache.fetch_token(), cache.fetch_token(), cache.fetch_token());
    for result in [a, b, c] {
        let err = result.expect_err("shared failure");
        assert_eq!(err.status(), Some(503));
    }
    assert_eq!(source.fetches(), 1);

    let token = cache.fetch_token().await.expect("next call starts over");
    assert_eq!(token.value(), "tok-2");
    assert_eq!(source.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidate_forces_a_new_exchange() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(3600)));
    let cache = TokenCache::new(source.clone());

    cache.fetch_token().await.expect("token");
    cache.invalidate();
    let token = cache.fetch_token().await.expect("token");

    assert_eq!(token.value(), "tok-2");
}

#[test]
fn debug_output_hides_the_secret() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let token = rt.block_on(async { AccessToken::bearer("super-secret", Duration::from_secs(60)) });

    let printed = format!("{token:?}");
    assert!(!printed.contains("super-secret"), "{printed}");
    assert_eq!(token.authorization(), "Bearer super-secret");
}

#[tokio::test(start_paused = true)]
async fn api_client_requests_share_one_token_exchange() -> Result<()> {
    let api = Arc::new(FakeApi::new().with_latency(Duration::from_millis(50)));
    let client = client(api.clone());

    let (a, b, c) = tokio::join!(
        client.list_documents(),
        client.list_documents(),
        client.list_documents()
    );
    a?;
    b?;
    c?;

    assert_eq!(api.token_requests(), 1);
    assert_eq!(api.count(waivepipe::http::request::Method::Get, "/documents"), 3);
    Ok(())
}
