//! Gallery/content page detection.
//!
//! A page counts as gallery-like when any of an ordered list of independent
//! signals fires. Each signal is a plain function over the content tree and page
//! identity; a signal that errors is logged and treated as not firing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::host::{ContentTree, NodeHandle, PageIdentity};
use crate::patterns::{
    FEED_CLASS, GALLERY_KEYWORDS, LAYOUT_CLASS, LAYOUT_UTILITY_CLASS, LAZY_ATTRIBUTES,
    LISTING_CLASS, MEDIA_PLATFORM, NEXT_CONTROL_TEXT, PAGINATION_CLASS, SRCSET_ATTRIBUTES,
    STOCK_VOCABULARY,
};
use crate::predicates;
use crate::Result;

/// Significant images needed by the image-count signal.
pub const MIN_SIGNIFICANT_IMAGES: usize = 8;
/// Lazy-loading attribute occurrences needed.
pub const MIN_LAZY_ATTRIBUTES: usize = 5;
/// Figure/image-container elements needed.
pub const MIN_IMAGE_CONTAINERS: usize = 6;
/// Grid/flex layout indicators needed.
pub const MIN_LAYOUT_INDICATORS: usize = 3;
/// webp/avif/srcset references needed.
pub const MIN_MODERN_FORMAT_REFS: usize = 3;

const IMAGE_CONTAINER_SELECTOR: &str = "figure, picture, [class*=\"image-container\"], \
    [class*=\"img-container\"], [class*=\"photo-item\"], [class*=\"gallery-item\"], \
    [class*=\"image-item\"]";

/// A named, independent detection predicate.
#[derive(Clone, Copy)]
pub struct Signal {
    pub name: &'static str,
    pub check: fn(&dyn ContentTree, &PageIdentity) -> Result<bool>,
}

impl Signal {
    /// Evaluate the signal, turning an error into `false`.
    #[must_use]
    pub fn fires(&self, tree: &dyn ContentTree, page: &PageIdentity) -> bool {
        match (self.check)(tree, page) {
            Ok(fired) => fired,
            Err(err) => {
                tracing::warn!(signal = self.name, error = %err, "detection signal failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The detection signals in evaluation order.
pub static SIGNALS: [Signal; 12] = [
    Signal { name: "significant-images", check: significant_images },
    Signal { name: "gallery-keywords", check: gallery_keywords },
    Signal { name: "layout-classes", check: layout_classes },
    Signal { name: "listing-containers", check: listing_containers },
    Signal { name: "feed-containers", check: feed_containers },
    Signal { name: "lazy-loading", check: lazy_loading },
    Signal { name: "stock-vocabulary", check: stock_vocabulary },
    Signal { name: "pagination-controls", check: pagination_controls },
    Signal { name: "image-containers", check: image_containers },
    Signal { name: "layout-indicators", check: layout_indicators },
    Signal { name: "modern-formats", check: modern_formats },
    Signal { name: "media-platform", check: media_platform },
];

/// True when at least one signal fires. Stops at the first one.
#[must_use]
pub fn any_of(signals: &[Signal], tree: &dyn ContentTree, page: &PageIdentity) -> bool {
    signals.iter().any(|signal| {
        let fired = signal.fires(tree, page);
        if fired {
            tracing::debug!(signal = signal.name, "detection signal fired");
        }
        fired
    })
}

/// Whether the page looks like a gallery.
#[must_use]
pub fn is_gallery_page(tree: &dyn ContentTree, page: &PageIdentity) -> bool {
    any_of(&SIGNALS, tree, page)
}

/// Every signal's outcome, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    pub is_gallery: bool,
    /// Names of the signals that fired, in evaluation order.
    pub fired: Vec<&'static str>,
}

/// Evaluate all signals without short-circuiting.
#[must_use]
pub fn detect_with_report(tree: &dyn ContentTree, page: &PageIdentity) -> DetectionReport {
    let fired: Vec<&'static str> = SIGNALS
        .iter()
        .filter(|signal| signal.fires(tree, page))
        .map(|signal| signal.name)
        .collect();
    DetectionReport {
        is_gallery: !fired.is_empty(),
        fired,
    }
}

/// A memoized verdict for one page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionVerdict {
    /// Host plus path of the page the verdict belongs to.
    pub page_key: String,
    pub is_gallery: bool,
    pub detected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

fn significant_images(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    let count = tree
        .query_all("img, svg")?
        .into_iter()
        .filter(|&n| predicates::is_significant_image(tree, n))
        .count();
    Ok(count >= MIN_SIGNIFICANT_IMAGES)
}

fn gallery_keywords(_tree: &dyn ContentTree, page: &PageIdentity) -> Result<bool> {
    Ok(GALLERY_KEYWORDS.is_match(&page.title) || GALLERY_KEYWORDS.is_match(page.path()))
}

fn layout_classes(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    Ok(tree.elements().into_iter().any(|n| {
        LAYOUT_CLASS.is_match(&class_and_id(tree, n))
            || tree
                .attributes(n)
                .iter()
                .any(|(name, _)| name.starts_with("data-") && LAYOUT_CLASS.is_match(name))
    }))
}

fn listing_containers(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    if !tree.query_all("[itemtype*=\"Product\"]")?.is_empty() {
        return Ok(true);
    }
    Ok(tree
        .elements()
        .into_iter()
        .any(|n| LISTING_CLASS.is_match(&class_and_id(tree, n))))
}

fn feed_containers(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    for node in tree.elements() {
        if FEED_CLASS.is_match(&class_and_id(tree, node)) && !tree.query_within(node, "img")?.is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn lazy_loading(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    let count: usize = tree
        .elements()
        .into_iter()
        .map(|n| {
            let lazy_attrs = LAZY_ATTRIBUTES
                .iter()
                .filter(|name| tree.has_attribute(n, name))
                .count();
            let native = tree
                .attribute(n, "loading")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("lazy"));
            lazy_attrs + usize::from(native)
        })
        .sum();
    Ok(count >= MIN_LAZY_ATTRIBUTES)
}

fn stock_vocabulary(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    let text = match tree.query_all("body")?.first() {
        Some(&body) => tree.text_content(body),
        None => String::new(),
    };
    Ok(STOCK_VOCABULARY.is_match(&text))
}

fn pagination_controls(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    if !tree.query_all("a[rel=\"next\"], link[rel=\"next\"]")?.is_empty() {
        return Ok(true);
    }
    if tree
        .elements()
        .into_iter()
        .any(|n| PAGINATION_CLASS.is_match(&class_and_id(tree, n)))
    {
        return Ok(true);
    }
    Ok(tree
        .query_all("a, button")?
        .into_iter()
        .any(|n| NEXT_CONTROL_TEXT.is_match(&tree.text_content(n)) && predicates::is_interactive(tree, n)))
}

fn image_containers(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    Ok(tree.query_all(IMAGE_CONTAINER_SELECTOR)?.len() >= MIN_IMAGE_CONTAINERS)
}

fn layout_indicators(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    let count = tree
        .elements()
        .into_iter()
        .filter(|&n| {
            let display = tree
                .computed_style(n, "display")
                .map(|d| d.trim().to_ascii_lowercase())
                .unwrap_or_default();
            matches!(display.as_str(), "grid" | "inline-grid" | "flex" | "inline-flex")
                || tree
                    .attribute(n, "class")
                    .is_some_and(|c| LAYOUT_UTILITY_CLASS.is_match(&c))
        })
        .count();
    Ok(count >= MIN_LAYOUT_INDICATORS)
}

fn modern_formats(tree: &dyn ContentTree, _page: &PageIdentity) -> Result<bool> {
    let count = tree
        .elements()
        .into_iter()
        .filter(|&n| {
            SRCSET_ATTRIBUTES.iter().any(|name| tree.has_attribute(n, name))
                || tree.attributes(n).iter().any(|(name, value)| {
                    (name == "src" || name == "type" || LAZY_ATTRIBUTES.contains(&name.as_str()))
                        && mentions_modern_format(value)
                })
        })
        .count();
    Ok(count >= MIN_MODERN_FORMAT_REFS)
}

fn media_platform(_tree: &dyn ContentTree, page: &PageIdentity) -> Result<bool> {
    Ok(MEDIA_PLATFORM.is_match(page.url.as_str()) || MEDIA_PLATFORM.is_match(&page.title))
}

fn mentions_modern_format(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.contains(".webp") || lower.contains(".avif") || lower.contains("image/webp") || lower.contains("image/avif")
}

fn class_and_id(tree: &dyn ContentTree, node: NodeHandle) -> String {
    let mut out = tree.attribute(node, "class").unwrap_or_default();
    if let Some(id) = tree.attribute(node, "id") {
        out.push(' ');
        out.push_str(&id);
    }
    out
}
