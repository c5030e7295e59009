//! Compiled regex patterns for detection, scoring and extraction.
//!
//! All patterns are compiled once on first use via `LazyLock`.
//! Patterns are organized by the pipeline stage that consumes them.

#![allow(clippy::expect_used)]

use std::sync::LazyLock;

use regex::Regex;

// =============================================================================
// Page-level Detection Patterns
// =============================================================================

/// Gallery-ish words in a page title or path.
pub static GALLERY_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(galler(?:y|ies)|portfolio|photo(?:s|graphy|graph|graphs)?|album|pictures?|\bpics\b|images?|wallpapers?|artwork|showcase|lookbook|slideshow|lightbox|exhibition|snapshots?)",
    )
    .expect("GALLERY_KEYWORDS regex")
});

/// Class names or data-attribute names of grid/gallery/lightbox layouts.
pub static LAYOUT_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(galler(?:y|ies)|masonry|lightbox|fancybox|photoswipe|justified|isotope|\bgrid\b|[-_]grid\b|\bgrid[-_]|image[-_]?grid|photo[-_]?grid|mosaic|carousel|slick|swiper)",
    )
    .expect("LAYOUT_CLASS regex")
});

/// E-commerce, listing and search-result containers.
pub static LISTING_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(product[-_]?(?:list|grid|item|card|tile)s?|search[-_]?results?|listing[-_]?(?:grid|items?|cards?)?|catalog(?:ue)?|shop[-_]?items?|s-result-item|result[-_]?tiles?)",
    )
    .expect("LISTING_CLASS regex")
});

/// Social feed / timeline containers.
pub static FEED_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bfeed\b|[-_]feed\b|\bfeed[-_]|timeline|activity[-_]?stream|\bstream[-_]?items?|post[-_]?list|\bstories\b|pin[-_]?grid)")
        .expect("FEED_CLASS regex")
});

/// Stock-photo / licensing vocabulary in body text.
pub static STOCK_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(royalty[- ]free|stock (?:photos?|images?|photography)|high[- ]resolution (?:photos?|images?)|hi[- ]res (?:photos?|images?)|editorial use only|rights[- ]managed|license this (?:photo|image)|free (?:photos?|images?) download|download (?:this )?(?:photo|image))",
    )
    .expect("STOCK_VOCABULARY regex")
});

/// Pagination / load-more controls by class or id.
pub static PAGINATION_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(paginat(?:ion|e|or)|\bpager\b|page[-_]?numbers|load[-_]?more|show[-_]?more|infinite[-_]?scroll|next[-_]?page)")
        .expect("PAGINATION_CLASS regex")
});

/// Utility classes of grid/flex layout frameworks.
pub static LAYOUT_UTILITY_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(d-flex|d-grid|flex-wrap|grid-cols-\d+|row-cols-\d+|columns-\d+|col-(?:xs|sm|md|lg|xl)-\d+|flex|grid)(?:\s|$)")
        .expect("LAYOUT_UTILITY_CLASS regex")
});

/// Known media and image-sharing platforms.
pub static MEDIA_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(flickr|500px|unsplash|pexels|pixabay|shutterstock|getty\s?images|istock(?:photo)?|deviantart|behance|dribbble|instagram|pinterest|imgur|smugmug|artstation|tumblr|vsco|adobe\s?stock)",
    )
    .expect("MEDIA_PLATFORM regex")
});

// =============================================================================
// Element-level Scoring Patterns
// =============================================================================

/// Gallery/photo/media vocabulary in element text or class names.
pub static MEDIA_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(galler(?:y|ies)|photo|image|picture|media|album|portfolio|thumbnail|\bthumbs?\b|slide)")
        .expect("MEDIA_VOCABULARY regex")
});

/// Visible text of "next page" / "load more" controls.
pub static NEXT_CONTROL_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(next(?:\s+page)?|older(?:\s+posts)?|load\s+more|show\s+more|see\s+more|more\s+results|›|»|→|>>?)\s*[›»→]?\s*$")
        .expect("NEXT_CONTROL_TEXT regex")
});

// =============================================================================
// Extraction Patterns
// =============================================================================

/// A single `url(...)` reference in a CSS value. Group 1 is the raw URL,
/// possibly quoted.
pub static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#).expect("CSS_URL regex")
});

/// Path fragments typical of asset storage.
pub static ASSET_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:images?|img|media|gallery|galleries|photos?|uploads|thumbs?|thumbnails)/")
        .expect("ASSET_PATH regex")
});

/// Extension of the last path segment.
pub static FILE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.([A-Za-z0-9]{1,5})$").expect("FILE_EXTENSION regex")
});

/// One `url descriptor` candidate of a srcset list.
pub static SRCSET_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)([wx])$").expect("SRCSET_DESCRIPTOR regex")
});

/// Lazy-load attribute names, in priority order.
pub const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-url",
    "data-hi-res-src",
    "data-full",
    "data-large",
    "data-bg",
    "data-background",
    "data-background-image",
];

/// srcset attribute names, in priority order.
pub const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset", "data-lazy-srcset"];
