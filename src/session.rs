//! One page-load pipeline session.
//!
//! A [`Session`] binds the host capabilities to the state that lives for one page
//! load: the memoized detection verdict, the per-site selector cache, the
//! session clock and the cancellation token. Every pipeline operation is exposed
//! from here.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::batch::{self, BatchItem};
use crate::detect::{self, DetectionReport, DetectionVerdict};
use crate::gather::{self, GatherContext};
use crate::host::{Host, PageIdentity};
use crate::options::{BatchOptions, GatherConfig, PaginationConfig, ScoreCriteria, SessionConfig, WaitOptions};
use crate::pagination;
use crate::result::{AssetRecord, CandidateScore, Gathered, Traversal};
use crate::scorer;
use crate::selector_cache::SelectorCache;
use crate::url_utils;
use crate::wait::{self, SelectorQuery, WaitResult};
use crate::Result;

/// Pipeline state for one page load.
pub struct Session<'h> {
    host: Host<'h>,
    config: SessionConfig,
    detection: Option<DetectionVerdict>,
    selectors: SelectorCache,
    origin: Instant,
    cancel: CancellationToken,
}

impl<'h> Session<'h> {
    #[must_use]
    pub fn new(host: Host<'h>, config: SessionConfig) -> Self {
        let selectors = SelectorCache::new(
            config.selector_cache_capacity,
            Duration::from_secs(config.selector_cache_ttl_secs),
        );
        Self {
            host,
            config,
            detection: None,
            selectors,
            origin: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &Host<'h> {
        &self.host
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A clone of the token every wait in this session observes.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every in-flight and future wait of this page load.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Start a new page load: forget the detection verdict, restart the clock and
    /// replace a cancelled token. The selector cache outlives page loads.
    pub fn begin_page_load(&mut self) {
        self.detection = None;
        self.origin = Instant::now();
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    #[must_use]
    pub fn identity(&self) -> PageIdentity {
        self.host.page.identity()
    }

    #[must_use]
    pub fn selector_cache(&self) -> &SelectorCache {
        &self.selectors
    }

    /// The memoized verdict, if detection ran for this page load.
    #[must_use]
    pub fn detection_verdict(&self) -> Option<&DetectionVerdict> {
        self.detection.as_ref()
    }

    /// Whether the current page looks like a gallery. Memoized per page.
    pub fn detect_page_relevance(&mut self) -> bool {
        let page = self.identity();
        let key = url_utils::page_key(&page.url);

        if let Some(verdict) = &self.detection {
            if verdict.page_key == key {
                return verdict.is_gallery;
            }
            tracing::debug!(previous = %verdict.page_key, current = %key, "page changed, dropping verdict");
        }

        let is_gallery = detect::is_gallery_page(self.host.tree, &page);
        tracing::debug!(page = %key, is_gallery, "page relevance detected");
        self.detection = Some(DetectionVerdict {
            page_key: key,
            is_gallery,
            detected_at: Utc::now(),
        });
        is_gallery
    }

    /// Every signal's outcome for the current page. Not memoized.
    #[must_use]
    pub fn detect_with_report(&self) -> DetectionReport {
        detect::detect_with_report(self.host.tree, &self.identity())
    }

    /// Resolve with the session's default wait timing.
    ///
    /// # Errors
    ///
    /// See [`wait::resolve_selector`].
    pub async fn resolve_selector(&self, query: &SelectorQuery) -> Result<WaitResult> {
        self.resolve_selector_with(query, &self.config.wait).await
    }

    /// # Errors
    ///
    /// See [`wait::resolve_selector`].
    pub async fn resolve_selector_with(&self, query: &SelectorQuery, options: &WaitOptions) -> Result<WaitResult> {
        wait::resolve_selector(self.host.tree, query, options, &self.cancel).await
    }

    /// # Errors
    ///
    /// See [`Session::gather_assets_with_stats`].
    pub async fn gather_assets(&mut self, config: &GatherConfig) -> Result<Vec<AssetRecord>> {
        Ok(self.gather_assets_with_stats(config).await?.records)
    }

    /// Gather with counters. Fills in the page base URL and, when asked to, the
    /// inferred container selector.
    ///
    /// # Errors
    ///
    /// [`crate::Error::BatchItemFailed`] from probing with `continue_on_error = false`.
    pub async fn gather_assets_with_stats(&mut self, config: &GatherConfig) -> Result<Gathered> {
        let config = self.prepare_gather(config);
        gather::gather(&self.gather_context(), &config).await
    }

    /// # Errors
    ///
    /// [`crate::Error::SelectorInvalid`] for an invalid `criteria.scope`.
    pub fn score_candidates(&self, criteria: &ScoreCriteria) -> Result<Vec<CandidateScore>> {
        scorer::score_candidates(self.host.tree, criteria)
    }

    /// The container selector for the current site: cached, or derived from the
    /// best scoring candidate and cached.
    pub fn infer_container_selector(&mut self) -> Option<String> {
        let site = url_utils::site_key(&self.identity().url);
        if let Some(cached) = self.selectors.get(&site) {
            tracing::debug!(%site, "container selector cache hit");
            return Some(cached.join(", "));
        }

        let candidates = match scorer::score_candidates(self.host.tree, &ScoreCriteria::default()) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(error = %err, "candidate scoring failed");
                return None;
            }
        };
        let selector = candidates
            .iter()
            .find_map(|c| scorer::derive_selector(self.host.tree, c.node))?;

        tracing::debug!(%site, %selector, "inferred container selector");
        self.selectors.insert(&site, vec![selector.clone()]);
        Some(selector)
    }

    /// # Errors
    ///
    /// See [`pagination::traverse`].
    pub async fn traverse_pagination(&mut self, config: &PaginationConfig) -> Result<Traversal> {
        let mut config = config.clone();
        config.gather = self.prepare_gather(&config.gather);
        pagination::traverse(&self.gather_context(), self.host.actuator, &config).await
    }

    /// Run `worker` over `items` under this session's cancellation token.
    ///
    /// # Errors
    ///
    /// See [`batch::run_batch`].
    pub async fn run_batch<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        worker: F,
        options: &BatchOptions,
    ) -> Result<Vec<BatchItem<R>>>
    where
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: std::fmt::Display,
    {
        batch::run_batch(items, worker, options, &self.cancel).await
    }

    fn gather_context(&self) -> GatherContext<'_> {
        GatherContext {
            tree: self.host.tree,
            prober: self.host.prober,
            origin: self.origin,
            cancel: &self.cancel,
        }
    }

    fn prepare_gather(&mut self, config: &GatherConfig) -> GatherConfig {
        let mut config = config.clone();
        if config.canonicalize.base_url.is_none() {
            config.canonicalize.base_url = Some(self.identity().base_url);
        }
        if config.container_selector.is_none() && config.infer_container {
            config.container_selector = self.infer_container_selector();
        }
        config
    }
}
