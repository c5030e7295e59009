//! # rs-mediasweep
//!
//! Media asset discovery for arbitrary web pages.
//!
//! The pipeline decides whether a page is gallery-like, resolves selectors
//! robustly against pages that load content late, gathers and canonicalizes
//! image URLs from every place markup hides them (lazy attributes, `srcset`,
//! CSS backgrounds), and walks paginated or infinite-scroll listings.
//!
//! ## Quick Start
//!
//! ```rust
//! use rs_mediasweep::sweep_html;
//!
//! let html = r#"<html><head><title>Summer</title></head><body>
//! <img src="/photos/a.jpg" alt="Beach">
//! <div style="background-image: url('b.png')"></div>
//! </body></html>"#;
//!
//! let gathered = sweep_html("https://example.com/albums/summer", html)?;
//! assert_eq!(gathered.records.len(), 2);
//! # Ok::<(), rs_mediasweep::Error>(())
//! ```
//!
//! ## Sessions
//!
//! Live pages are driven through a [`Session`], which owns the per-page-load
//! caches and exposes the asynchronous operations (selector waits, dimension
//! probing, pagination):
//!
//! ```rust
//! use rs_mediasweep::{GatherConfig, Host, HtmlPage, Session, SessionConfig, UnavailableProber};
//!
//! # async fn run() -> rs_mediasweep::Result<()> {
//! let page = HtmlPage::from_html("https://example.com/albums/summer", "<img src=\"a.jpg\">")?;
//! let prober = UnavailableProber;
//! let mut session = Session::new(Host::new(&page, &prober), SessionConfig::default());
//!
//! if session.detect_page_relevance() {
//!     let records = session.gather_assets(&GatherConfig::default()).await?;
//!     println!("{} assets", records.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Gallery detection**: twelve independent page signals, memoized per page load
//! - **Selector resolution**: ordered fallbacks, visibility/enabled constraints, retries with backoff
//! - **Asset gathering**: prioritized sources, URL canonicalization, deduplication, size/format gate
//! - **Container inference**: heuristic scoring with a per-site selector cache
//! - **Pagination**: next-control activation or infinite scroll until content runs out

mod error;
mod options;
mod patterns;
mod result;
mod session;

/// Host capability traits and geometry types.
pub mod host;

/// Static HTML host backed by `dom_query`.
pub mod dom;

/// URL canonicalization and asset URL heuristics.
pub mod url_utils;

/// Element predicates (visibility, enabled state, interactivity).
pub mod predicates;

/// Selector wait/retry engine.
pub mod wait;

/// Asset gathering.
pub mod gather;

/// Gallery/content page detection.
pub mod detect;

/// Container candidate scoring.
pub mod scorer;

/// Pagination and infinite-scroll traversal.
pub mod pagination;

/// Bounded, paced batch processing.
pub mod batch;

/// Per-site container selector cache.
pub mod selector_cache;

// Public API - re-exports
pub use batch::BatchItem;
pub use detect::{DetectionReport, DetectionVerdict};
pub use dom::{DomSnapshot, HtmlPage};
pub use error::{Error, Result};
pub use host::{
    Actuator, BoundingBox, ContentTree, Dimensions, Host, NodeHandle, PageIdentity, PageSource,
    ResourceProber, UnavailableProber,
};
pub use options::{
    BatchOptions, CanonicalizeOptions, GatherConfig, PaginationConfig, ScoreCriteria,
    SessionConfig, WaitOptions, DEFAULT_ASSET_SELECTORS, DEFAULT_IMAGE_FORMATS,
    DEFAULT_NEXT_SELECTORS,
};
pub use result::{
    AssetRecord, CandidateScore, FeatureFlags, GatherStats, Gathered, PaginationState,
    SourceKind, TerminationReason, Traversal,
};
pub use session::Session;
pub use url_utils::CanonicalUrl;
pub use wait::{Constraints, SelectorQuery, WaitResult};

/// Gathers assets from an HTML document using the default configuration.
///
/// Relative URLs resolve against `url` (or the document's `<base href>`).
/// Dimensions are not probed.
///
/// # Example
///
/// ```rust
/// use rs_mediasweep::{sweep_html, SourceKind};
///
/// let html = r#"<img data-src="/img/lazy.webp" src="data:image/gif;base64,R0lGOD">"#;
/// let gathered = sweep_html("https://example.com/", html)?;
/// assert_eq!(gathered.records[0].canonical_url.as_str(), "https://example.com/img/lazy.webp");
/// assert_eq!(gathered.records[0].source_kind, SourceKind::LazyAttribute);
/// # Ok::<(), rs_mediasweep::Error>(())
/// ```
#[allow(clippy::missing_errors_doc)]
pub fn sweep_html(url: &str, html: &str) -> Result<Gathered> {
    sweep_html_with_config(url, html, &GatherConfig::default())
}

/// Gathers assets from an HTML document with a custom configuration.
///
/// A `base_url` already set in `config.canonicalize` wins over the page's.
///
/// # Errors
///
/// [`Error::InvalidUrl`] when `url` is not absolute.
pub fn sweep_html_with_config(url: &str, html: &str, config: &GatherConfig) -> Result<Gathered> {
    let page = HtmlPage::from_html(url, html)?;
    let mut config = config.clone();
    if config.canonicalize.base_url.is_none() {
        config.canonicalize.base_url = Some(page.identity().base_url);
    }
    Ok(gather::sweep(&page, &config, tokio::time::Instant::now()))
}

/// Runs every detection signal over an HTML document.
///
/// # Example
///
/// ```rust
/// use rs_mediasweep::detect_html;
///
/// let report = detect_html("https://example.com/portfolio/", "<p>hello</p>")?;
/// assert!(report.is_gallery);
/// assert_eq!(report.fired, vec!["gallery-keywords"]);
/// # Ok::<(), rs_mediasweep::Error>(())
/// ```
///
/// # Errors
///
/// [`Error::InvalidUrl`] when `url` is not absolute.
pub fn detect_html(url: &str, html: &str) -> Result<DetectionReport> {
    let page = HtmlPage::from_html(url, html)?;
    Ok(detect::detect_with_report(&page, &page.identity()))
}
