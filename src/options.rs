//! Configuration for the pipeline stages.
//!
//! Every struct has public fields and a `Default` with the documented values, so
//! callers customize with `..Default::default()`. All of them (de)serialize with
//! `serde`, missing fields taking their defaults, which lets a host pass settings as
//! JSON. Durations are stored as milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Image formats accepted when no explicit format list is configured.
pub const DEFAULT_IMAGE_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "bmp", "tiff", "tif", "ico", "heic",
    "jfif",
];

/// Selectors the gatherer walks when none are given.
pub const DEFAULT_ASSET_SELECTORS: &[&str] = &[
    "img",
    "video[poster]",
    "picture",
    "figure",
    "[data-src]",
    "[data-lazy-src]",
    "[data-original]",
    "[data-srcset]",
    "[data-bg]",
    "[data-background]",
    "[data-background-image]",
    "[style*=\"background\"]",
];

/// Selectors that identify a "next page" or "load more" control, tried in order.
pub const DEFAULT_NEXT_SELECTORS: &[&str] = &[
    "a[rel=\"next\"]",
    ".pagination .next a",
    ".pagination a.next",
    ".pagination-next",
    ".pager-next a",
    ".nav-next a",
    "a.next",
    "button.next",
    "[aria-label=\"Next\"]",
    "[aria-label=\"Next page\"]",
    ".load-more",
    "button.load-more",
    "[data-action=\"load-more\"]",
];

/// URL canonicalization switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CanonicalizeOptions {
    /// Base URL for relative resolution and the scheme of protocol-relative URLs.
    ///
    /// The session fills this from the page identity when unset.
    ///
    /// Default: `None`
    #[serde(skip)]
    pub base_url: Option<Url>,

    /// Pass `data:` URIs through unchanged. When `false` they are invalid.
    ///
    /// Default: `true`
    pub allow_data_urls: bool,

    /// Upgrade `http` to `https`.
    ///
    /// Default: `false`
    pub force_https: bool,

    /// Drop the query string entirely.
    ///
    /// Default: `false`
    pub strip_query: bool,

    /// Sort query parameters by key when the query is kept.
    ///
    /// Default: `true`
    pub sort_query: bool,

    /// Drop the `#fragment`.
    ///
    /// Default: `true`
    pub strip_fragment: bool,

    /// Remove trailing `/` characters from non-root paths.
    ///
    /// Default: `true`
    pub strip_trailing_slash: bool,
}

impl Default for CanonicalizeOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            allow_data_urls: true,
            force_https: false,
            strip_query: false,
            sort_query: true,
            strip_fragment: true,
            strip_trailing_slash: true,
        }
    }
}

/// Timing of the wait/retry engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Length of one search attempt.
    ///
    /// Default: `10000`
    pub timeout_ms: u64,

    /// Poll interval within an attempt, also the backoff unit between attempts.
    ///
    /// Default: `100`
    pub interval_ms: u64,

    /// Number of independent search attempts. Zero is treated as one.
    ///
    /// Default: `3`
    pub retries: u32,

    /// Return [`crate::Error::ResolutionTimeout`] instead of a not-found result.
    ///
    /// Default: `true`
    pub throw_on_timeout: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            interval_ms: 100,
            retries: 3,
            throw_on_timeout: true,
        }
    }
}

impl WaitOptions {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// A single attempt that returns not-found instead of failing.
    #[must_use]
    pub fn single_attempt(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            retries: 1,
            throw_on_timeout: false,
            ..Self::default()
        }
    }
}

/// Pacing of the batch processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Items processed concurrently per chunk. Zero is treated as one.
    ///
    /// Default: `5`
    pub batch_size: usize,

    /// Pause between chunks.
    ///
    /// Default: `100`
    pub delay_between_batches_ms: u64,

    /// Record failures per item instead of aborting.
    ///
    /// Default: `true`
    pub continue_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            delay_between_batches_ms: 100,
            continue_on_error: true,
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_batches_ms)
    }
}

/// What the asset gatherer collects and how it filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GatherConfig {
    /// Candidate selectors for asset-bearing nodes.
    ///
    /// Default: [`DEFAULT_ASSET_SELECTORS`]
    pub selectors: Vec<String>,

    /// Restrict gathering to descendants of the matching container(s).
    ///
    /// Default: `None`
    pub container_selector: Option<String>,

    /// Infer a container with the candidate scorer when none is given.
    ///
    /// Default: `false`
    pub infer_container: bool,

    /// Use an enclosing link's target as the asset URL when it is itself an asset,
    /// keeping the node's own URL as the thumbnail.
    ///
    /// Default: `false`
    pub follow_links: bool,

    /// Drop records whose canonical URL was already seen.
    ///
    /// Default: `true`
    pub deduplicate: bool,

    /// Capture alt, title, class, id and `data-*` attributes.
    ///
    /// Default: `true`
    pub include_metadata: bool,

    /// Sweep every element for a computed background image.
    ///
    /// Default: `true`
    pub sweep_backgrounds: bool,

    /// Probe natural dimensions through the host prober.
    ///
    /// Default: `false`
    pub probe_dimensions: bool,

    /// Pacing of dimension probes.
    pub probe_batch: BatchOptions,

    /// Minimum width in pixels for a record to be kept.
    ///
    /// Default: `None`
    pub min_width: Option<u32>,

    /// Minimum height in pixels for a record to be kept.
    ///
    /// Default: `None`
    pub min_height: Option<u32>,

    /// Accepted formats (lowercase extensions). Empty means
    /// [`DEFAULT_IMAGE_FORMATS`] for asset detection and no format gate.
    ///
    /// Default: empty
    pub allowed_formats: Vec<String>,

    /// URL canonicalization applied to every extracted URL.
    pub canonicalize: CanonicalizeOptions,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            selectors: DEFAULT_ASSET_SELECTORS.iter().map(ToString::to_string).collect(),
            container_selector: None,
            infer_container: false,
            follow_links: false,
            deduplicate: true,
            include_metadata: true,
            sweep_backgrounds: true,
            probe_dimensions: false,
            probe_batch: BatchOptions {
                delay_between_batches_ms: 0,
                ..BatchOptions::default()
            },
            min_width: None,
            min_height: None,
            allowed_formats: Vec::new(),
            canonicalize: CanonicalizeOptions::default(),
        }
    }
}

/// Parameters of the candidate container scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreCriteria {
    /// Minimum score for a candidate to be returned.
    ///
    /// Default: `0.7`
    pub min_score: f64,

    /// Score hidden nodes too.
    ///
    /// Default: `false`
    pub include_invisible: bool,

    /// Add the gallery vocabulary feature.
    ///
    /// Default: `true`
    pub analyze_content: bool,

    /// Only score nodes matching this selector.
    ///
    /// Default: `None` (every element)
    pub scope: Option<String>,

    /// Truncate the ranked list.
    ///
    /// Default: `None`
    pub max_results: Option<usize>,
}

impl Default for ScoreCriteria {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            include_invisible: false,
            analyze_content: true,
            scope: None,
            max_results: None,
        }
    }
}

/// Paginated / infinite-scroll traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Gathering performed each round.
    pub gather: GatherConfig,

    /// Upper bound on extraction rounds.
    ///
    /// Default: `10`
    pub max_rounds: u32,

    /// Selectors for the "next" control, tried in order.
    ///
    /// Default: [`DEFAULT_NEXT_SELECTORS`]
    pub next_selectors: Vec<String>,

    /// Fall back to matching "next"/"load more" text on interactive elements.
    ///
    /// Default: `true`
    pub use_text_fallback: bool,

    /// Scroll to the end when no control is found.
    ///
    /// Default: `false`
    pub allow_infinite_scroll: bool,

    /// Wait budget for locating the control each round.
    ///
    /// Default: one attempt of 1000 ms that returns not-found.
    pub control_wait: WaitOptions,

    /// Poll interval while waiting for new content to settle.
    ///
    /// Default: `250`
    pub settle_interval_ms: u64,

    /// Upper bound on the settle wait.
    ///
    /// Default: `5000`
    pub settle_timeout_ms: u64,

    /// Consecutive unchanged polls that count as settled.
    ///
    /// Default: `2`
    pub stable_polls: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            gather: GatherConfig::default(),
            max_rounds: 10,
            next_selectors: DEFAULT_NEXT_SELECTORS.iter().map(ToString::to_string).collect(),
            use_text_fallback: true,
            allow_infinite_scroll: false,
            control_wait: WaitOptions::single_attempt(1000),
            settle_interval_ms: 250,
            settle_timeout_ms: 5000,
            stable_polls: 2,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms.max(1))
    }

    #[must_use]
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }
}

/// Session-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum number of sites in the selector cache.
    ///
    /// Default: `100`
    pub selector_cache_capacity: usize,

    /// Lifetime of a selector cache entry.
    ///
    /// Default: `300`
    pub selector_cache_ttl_secs: u64,

    /// Default wait timing for [`crate::Session::resolve_selector`].
    pub wait: WaitOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            selector_cache_capacity: 100,
            selector_cache_ttl_secs: 300,
            wait: WaitOptions::default(),
        }
    }
}
