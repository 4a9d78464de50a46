//! Memoized client handle keyed by certificate bytes.
//!
//! # Design
//! - Compare and rebuild happen under one async mutex, so concurrent callers
//!   observe a single rebuild per rotation.
//! - Every handed-out [`Lease`] holds the read side of its handle's usage lock.
//!   Retirement takes the write side before closing, so a superseded handle
//!   is closed only after its last lease is released.

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vouch_telemetry::Metrics;

use crate::error::{CacheError, CacheResult};
use crate::source::{CertificateSource, ClientBuilder, RetireClient};

struct CachedHandle<C> {
    client: C,
    usage: Arc<RwLock<()>>,
}

impl<C> CachedHandle<C> {
    fn new(client: C) -> Self {
        Self {
            client,
            usage: Arc::new(RwLock::new(())),
        }
    }
}

struct CacheState<C> {
    certificate: Option<Vec<u8>>,
    handle: Option<Arc<CachedHandle<C>>>,
}

/// Caches one client built from the current certificate.
pub struct ClientCache<C> {
    source: Arc<dyn CertificateSource>,
    builder: Arc<dyn ClientBuilder<C>>,
    state: Mutex<CacheState<C>>,
    metrics: Option<Metrics>,
}

impl<C> ClientCache<C>
where
    C: RetireClient + 'static,
{
    /// Create an empty cache; the first [`ClientCache::get`] builds.
    #[must_use]
    pub fn new(source: Arc<dyn CertificateSource>, builder: Arc<dyn ClientBuilder<C>>) -> Self {
        Self {
            source,
            builder,
            state: Mutex::new(CacheState {
                certificate: None,
                handle: None,
            }),
            metrics: None,
        }
    }

    /// Record builds and retirements on `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Acquire a lease on a client built from the current certificate.
    ///
    /// A missing or rotated certificate triggers a rebuild before anything is
    /// returned; the superseded handle is retired in the background.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NoCertificate`] when the source has no certificate.
    /// - [`CacheError::Certificate`] when the source fails.
    /// - [`CacheError::Build`] when a rebuild fails.
    /// - [`CacheError::Canceled`] when `cancel` fires while waiting for the cache.
    pub async fn get(&self, cancel: &CancellationToken) -> CacheResult<Lease<C>> {
        let mut state = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CacheError::Canceled),
            guard = self.state.lock() => guard,
        };

        let current = match self.source.current_certificate() {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(CacheError::NoCertificate),
            Err(source) => return Err(CacheError::Certificate { source }),
        };

        if let Some(handle) = state.handle.as_ref()
            && state.certificate.as_deref() == Some(current.as_slice())
        {
            return Ok(Lease::acquire(Arc::clone(handle)).await);
        }

        let client = self
            .builder
            .build(cancel)
            .await
            .map_err(|source| CacheError::Build { source })?;
        if let Some(metrics) = &self.metrics {
            metrics.inc_cache_build();
        }
        debug!(
            replacing = state.handle.is_some(),
            "built client for current certificate"
        );

        let handle = Arc::new(CachedHandle::new(client));
        let previous = state.handle.replace(Arc::clone(&handle));
        state.certificate = Some(current);
        let lease = Lease::acquire(handle).await;
        drop(state);

        if let Some(previous) = previous {
            self.retire(previous);
        }
        Ok(lease)
    }

    /// Certificate bytes the cached client was built from, if any.
    pub async fn cached_certificate(&self) -> Option<Vec<u8>> {
        self.state.lock().await.certificate.clone()
    }

    /// Drop the cached client so the next [`ClientCache::get`] rebuilds.
    pub async fn invalidate(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            state.certificate = None;
            state.handle.take()
        };
        if let Some(previous) = previous {
            self.retire(previous);
        }
    }

    fn retire(&self, handle: Arc<CachedHandle<C>>) {
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let _drained = Arc::clone(&handle.usage).write_owned().await;
            if let Err(err) = handle.client.close().await {
                warn!(error = %err, "failed to close superseded client");
            } else {
                debug!("retired superseded client");
            }
            if let Some(metrics) = metrics {
                metrics.inc_cache_retirement();
            }
        });
    }
}

/// A client in use. The handle will not be closed while this lease lives.
pub struct Lease<C> {
    handle: Arc<CachedHandle<C>>,
    _usage: OwnedRwLockReadGuard<()>,
}

impl<C> Lease<C> {
    async fn acquire(handle: Arc<CachedHandle<C>>) -> Self {
        let usage = Arc::clone(&handle.usage).read_owned().await;
        Self {
            handle,
            _usage: usage,
        }
    }

    /// Release the usage claim explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl<C> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.handle.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::io;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TestClient {
        generation: usize,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RetireClient for TestClient {
        async fn close(&self) -> Result<(), BoxError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct SwappableCertificate {
        bytes: StdMutex<Option<Vec<u8>>>,
        fail: StdMutex<bool>,
    }

    impl SwappableCertificate {
        fn set(&self, bytes: Option<&[u8]>) {
            *self.bytes.lock().expect("cert lock") = bytes.map(<[u8]>::to_vec);
        }
    }

    impl CertificateSource for SwappableCertificate {
        fn current_certificate(&self) -> Result<Option<Vec<u8>>, BoxError> {
            if *self.fail.lock().expect("fail lock") {
                return Err(io::Error::other("unreadable").into());
            }
            Ok(self.bytes.lock().expect("cert lock").clone())
        }
    }

    #[derive(Default)]
    struct CountingBuilder {
        builds: AtomicUsize,
        closed: Arc<AtomicUsize>,
        fail: StdMutex<bool>,
    }

    #[async_trait]
    impl ClientBuilder<TestClient> for CountingBuilder {
        async fn build(&self, _cancel: &CancellationToken) -> Result<TestClient, BoxError> {
            if *self.fail.lock().expect("fail lock") {
                return Err(io::Error::other("dial failed").into());
            }
            let generation = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TestClient {
                generation,
                closed: Arc::clone(&self.closed),
            })
        }
    }

    struct Harness {
        cert: Arc<SwappableCertificate>,
        builder: Arc<CountingBuilder>,
        metrics: Metrics,
        cache: ClientCache<TestClient>,
    }

    impl Harness {
        fn new() -> Result<Self> {
            let cert = Arc::new(SwappableCertificate::default());
            let builder = Arc::new(CountingBuilder::default());
            let metrics = Metrics::new()?;
            let cache = ClientCache::new(cert.clone(), builder.clone()).with_metrics(metrics.clone());
            Ok(Self {
                cert,
                builder,
                metrics,
                cache,
            })
        }

        fn builds(&self) -> usize {
            self.builder.builds.load(Ordering::SeqCst)
        }

        fn closed(&self) -> usize {
            self.builder.closed.load(Ordering::SeqCst)
        }
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn rotation_scenarios() -> Result<()> {
        struct Case {
            name: &'static str,
            cached: Option<&'static [u8]>,
            current: Option<&'static [u8]>,
            expect_builds: usize,
            expect_retired: bool,
            expect_error: bool,
        }

        let cases = [
            Case {
                name: "no certificate",
                cached: None,
                current: None,
                expect_builds: 0,
                expect_retired: false,
                expect_error: true,
            },
            Case {
                name: "first use",
                cached: None,
                current: Some(b"cert1"),
                expect_builds: 1,
                expect_retired: false,
                expect_error: false,
            },
            Case {
                name: "unchanged certificate",
                cached: Some(b"cert1"),
                current: Some(b"cert1"),
                expect_builds: 0,
                expect_retired: false,
                expect_error: false,
            },
            Case {
                name: "rotated certificate",
                cached: Some(b"cert1"),
                current: Some(b"cert2"),
                expect_builds: 1,
                expect_retired: true,
                expect_error: false,
            },
        ];

        let cancel = CancellationToken::new();
        for case in cases {
            let harness = Harness::new()?;
            if let Some(cached) = case.cached {
                harness.cert.set(Some(cached));
                harness.cache.get(&cancel).await?.release();
            }
            let primed = harness.builds();

            harness.cert.set(case.current);
            let result = harness.cache.get(&cancel).await;
            assert_eq!(result.is_err(), case.expect_error, "{}", case.name);
            if case.expect_error {
                assert!(
                    matches!(result, Err(CacheError::NoCertificate)),
                    "{}",
                    case.name
                );
            }
            drop(result);
            assert_eq!(harness.builds() - primed, case.expect_builds, "{}", case.name);

            if case.expect_retired {
                assert!(eventually(|| harness.closed() == 1).await, "{}", case.name);
                assert_eq!(harness.metrics.snapshot().client_cache_retirements_total, 1);
            } else {
                tokio::task::yield_now().await;
                assert_eq!(harness.closed(), 0, "{}", case.name);
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn repeated_gets_share_one_handle() -> Result<()> {
        let harness = Harness::new()?;
        harness.cert.set(Some(b"cert1"));
        let cancel = CancellationToken::new();

        let first = harness.cache.get(&cancel).await?;
        let second = harness.cache.get(&cancel).await?;
        assert_eq!(first.generation, second.generation);
        assert_eq!(harness.builds(), 1);
        assert_eq!(harness.metrics.snapshot().client_cache_builds_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_certificate_is_treated_as_missing() -> Result<()> {
        let harness = Harness::new()?;
        harness.cert.set(Some(b""));
        let result = harness.cache.get(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CacheError::NoCertificate)));
        assert_eq!(harness.builds(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn source_failure_is_reported() -> Result<()> {
        let harness = Harness::new()?;
        *harness.cert.fail.lock().expect("fail lock") = true;
        let result = harness.cache.get(&CancellationToken::new()).await;
        assert!(matches!(result, Err(CacheError::Certificate { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn build_failure_keeps_previous_handle() -> Result<()> {
        let harness = Harness::new()?;
        let cancel = CancellationToken::new();
        harness.cert.set(Some(b"cert1"));
        harness.cache.get(&cancel).await?.release();

        harness.cert.set(Some(b"cert2"));
        *harness.builder.fail.lock().expect("fail lock") = true;
        let result = harness.cache.get(&cancel).await;
        assert!(matches!(result, Err(CacheError::Build { .. })));
        assert_eq!(
            harness.cache.cached_certificate().await.as_deref(),
            Some(&b"cert1"[..])
        );
        tokio::task::yield_now().await;
        assert_eq!(harness.closed(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn retirement_waits_for_outstanding_leases() -> Result<()> {
        let harness = Harness::new()?;
        let cancel = CancellationToken::new();
        harness.cert.set(Some(b"cert1"));
        let old = harness.cache.get(&cancel).await?;

        harness.cert.set(Some(b"cert2"));
        let fresh = harness.cache.get(&cancel).await?;
        assert_eq!(old.generation, 1);
        assert_eq!(fresh.generation, 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(harness.closed(), 0);

        old.release();
        assert!(eventually(|| harness.closed() == 1).await);
        drop(fresh);
        Ok(())
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild() -> Result<()> {
        let harness = Harness::new()?;
        let cancel = CancellationToken::new();
        harness.cert.set(Some(b"cert1"));
        harness.cache.get(&cancel).await?.release();

        harness.cache.invalidate().await;
        assert!(harness.cache.cached_certificate().await.is_none());
        assert!(eventually(|| harness.closed() == 1).await);

        let lease = harness.cache.get(&cancel).await?;
        assert_eq!(lease.generation, 2);
        Ok(())
    }

    #[tokio::test]
    async fn canceled_caller_is_rejected() -> Result<()> {
        let harness = Harness::new()?;
        harness.cert.set(Some(b"cert1"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = harness.cache.get(&cancel).await;
        assert!(matches!(result, Err(CacheError::Canceled)));
        assert_eq!(harness.builds(), 0);
        Ok(())
    }
}
