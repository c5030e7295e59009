//! Host capability interfaces.
//!
//! The pipeline never owns the page. Everything it reads or triggers goes through
//! these traits, which the embedding environment implements. [`crate::dom::HtmlPage`]
//! is the in-crate implementation over static HTML.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Opaque handle to an element of a [`ContentTree`].
///
/// Handles are only meaningful for the tree that produced them and only until that
/// tree mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub usize);

/// Rendered geometry of an element in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// A box of the given size at the origin.
    #[must_use]
    pub fn sized(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::from_box(self)
    }
}

/// Pixel dimensions of an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_box(bbox: &BoundingBox) -> Self {
        Self {
            width: bbox.width.max(0.0).round() as u32,
            height: bbox.height.max(0.0).round() as u32,
        }
    }
}

/// Identity of the currently loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIdentity {
    /// Full page URL as loaded.
    pub url: Url,
    /// Document title (may be empty).
    pub title: String,
    /// Base URL for relative resolution (`<base href>` or the page URL).
    pub base_url: Url,
}

impl PageIdentity {
    /// Build an identity whose base URL is the page URL itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] when `url` is not an absolute URL.
    pub fn new(url: &str, title: impl Into<String>) -> Result<Self> {
        let parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self {
            base_url: parsed.clone(),
            url: parsed,
            title: title.into(),
        })
    }

    /// Replace the base URL, e.g. from a `<base href>` element.
    #[must_use]
    pub fn with_base(mut self, base: Url) -> Self {
        self.base_url = base;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

/// Read access to the page's element tree.
///
/// Selector parsing belongs to the host. Implementations return
/// [`Error::SelectorInvalid`] for strings they cannot parse.
pub trait ContentTree {
    /// All elements matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// [`Error::SelectorInvalid`] for a malformed selector.
    fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>>;

    /// Descendants of `scope` matching `selector`, in document order.
    ///
    /// # Errors
    ///
    /// [`Error::SelectorInvalid`] for a malformed selector.
    fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>>;

    /// Every element in document order.
    fn elements(&self) -> Vec<NodeHandle>;

    /// Lowercase tag name.
    fn tag_name(&self, node: NodeHandle) -> Option<String>;

    fn attribute(&self, node: NodeHandle, name: &str) -> Option<String>;

    /// All attributes as `(name, value)` pairs in source order.
    fn attributes(&self, node: NodeHandle) -> Vec<(String, String)>;

    /// Text content of the node and its descendants.
    fn text_content(&self, node: NodeHandle) -> String;

    /// Computed value of a CSS property, if the host can tell.
    fn computed_style(&self, node: NodeHandle, property: &str) -> Option<String>;

    /// Rendered geometry, `None` when the node has no layout box.
    fn bounding_box(&self, node: NodeHandle) -> Option<BoundingBox>;

    /// Whether the node is still attached to the document.
    fn is_connected(&self, node: NodeHandle) -> bool;

    /// Ancestors from nearest to furthest.
    fn ancestors(&self, node: NodeHandle) -> Vec<NodeHandle>;

    fn has_attribute(&self, node: NodeHandle, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }

    /// Nearest ancestor with the given tag name.
    fn closest(&self, node: NodeHandle, tag: &str) -> Option<NodeHandle> {
        self.ancestors(node)
            .into_iter()
            .find(|&a| self.tag_name(a).is_some_and(|t| t == tag))
    }
}

/// Simulates user interaction with the page.
#[async_trait(?Send)]
pub trait Actuator {
    /// Scroll the node into view and activate it. `Ok(false)` means the host
    /// declined (e.g. the node went away).
    async fn activate(&self, node: NodeHandle) -> Result<bool>;

    /// Scroll to the end of the document to trigger lazy loading.
    async fn scroll_to_end(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Resolves natural pixel dimensions of a resource out of band.
#[async_trait(?Send)]
pub trait ResourceProber {
    /// # Errors
    ///
    /// [`Error::ResourceProbeFailed`] when the resource cannot be measured.
    async fn probe(&self, url: &str) -> Result<Dimensions>;
}

/// Prober for hosts that cannot load resources. Every probe fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProber;

#[async_trait(?Send)]
impl ResourceProber for UnavailableProber {
    async fn probe(&self, url: &str) -> Result<Dimensions> {
        Err(Error::ResourceProbeFailed {
            url: url.to_string(),
            reason: "resource probing unavailable".to_string(),
        })
    }
}

/// Source of the current page identity.
pub trait PageSource {
    fn identity(&self) -> PageIdentity;
}

/// The set of capabilities one pipeline session runs against.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub tree: &'a dyn ContentTree,
    pub actuator: &'a dyn Actuator,
    pub prober: &'a dyn ResourceProber,
    pub page: &'a dyn PageSource,
}

impl<'a> Host<'a> {
    /// Bundle a page object implementing tree, actuator and identity with a prober.
    pub fn new<P>(page: &'a P, prober: &'a dyn ResourceProber) -> Self
    where
        P: ContentTree + Actuator + PageSource,
    {
        Self {
            tree: page,
            actuator: page,
            prober,
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_identity_parts() {
        let page = PageIdentity::new("https://photos.example.com/albums/summer?x=1", "Summer")
            .unwrap_or_else(|e| panic!("identity: {e}"));
        assert_eq!(page.host(), "photos.example.com");
        assert_eq!(page.path(), "/albums/summer");
        assert_eq!(page.scheme(), "https");
        assert_eq!(page.base_url, page.url);
    }

    #[test]
    fn test_page_identity_rejects_relative() {
        assert!(matches!(
            PageIdentity::new("/relative/path", ""),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_dimensions_from_box() {
        let dims = BoundingBox::sized(120.4, 79.6).dimensions();
        assert_eq!(dims, Dimensions::new(120, 80));
        assert_eq!(BoundingBox::sized(-3.0, 0.4).dimensions(), Dimensions::ZERO);
    }
}
