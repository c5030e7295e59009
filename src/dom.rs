//! Static HTML host built on `dom_query`.
//!
//! [`DomSnapshot`] implements [`ContentTree`] over a parsed document. There is no
//! layout engine, so style and geometry are approximated from markup:
//!
//! - computed style comes from the inline `style` attribute; `visibility` and
//!   `pointer-events` inherit, and `display: none` or `hidden` hides descendants;
//! - the bounding box uses `width`/`height` attributes or pixel style values, a
//!   nominal 1×1 box when neither is present, and zero size when hidden;
//! - every node of a snapshot stays connected.
//!
//! [`HtmlPage`] strings several snapshots together: activating a control or
//! scrolling moves to the next state, which is how paginated and infinite-scroll
//! pages are replayed.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use dom_query::{Document, Matcher, NodeId, Selection};

use crate::host::{Actuator, BoundingBox, ContentTree, NodeHandle, PageIdentity, PageSource};
use crate::patterns::CSS_URL;
use crate::{Error, Result};

/// Tags that never produce a layout box.
const NON_RENDERED_TAGS: &[&str] = &[
    "head", "script", "style", "template", "noscript", "title", "meta", "link", "base",
];

/// Size given to elements without explicit dimensions.
const NOMINAL_SIZE: f64 = 1.0;

#[derive(Debug, Clone)]
struct ElementInfo {
    tag: String,
    attrs: Vec<(String, String)>,
    style: Vec<(String, String)>,
    parent: Option<usize>,
    text: String,
    hidden: bool,
    visibility: Option<String>,
    pointer_events: Option<String>,
    bbox: BoundingBox,
}

/// A parsed, immutable view of one HTML document.
pub struct DomSnapshot {
    doc: Document,
    index: HashMap<NodeId, usize>,
    elements: Vec<ElementInfo>,
}

impl DomSnapshot {
    /// Parse an HTML string.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let doc = Document::from(html);
        let (index, elements) = index_elements(&doc);
        Self {
            doc,
            index,
            elements,
        }
    }

    /// Number of elements in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Text of the first `<title>` element.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.elements
            .iter()
            .find(|e| e.tag == "title")
            .map(|e| e.text.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// `href` of the first `<base>` element.
    #[must_use]
    pub fn base_href(&self) -> Option<String> {
        self.elements
            .iter()
            .filter(|e| e.tag == "base")
            .find_map(|e| attr_value(&e.attrs, "href"))
    }

    fn info(&self, node: NodeHandle) -> Option<&ElementInfo> {
        self.elements.get(node.0)
    }

    fn handles(&self, selection: &Selection) -> Vec<NodeHandle> {
        selection
            .nodes()
            .iter()
            .filter_map(|n| self.index.get(&n.id).copied())
            .map(NodeHandle)
            .collect()
    }

    fn is_descendant(&self, node: usize, scope: usize) -> bool {
        let mut current = self.elements.get(node).and_then(|e| e.parent);
        while let Some(p) = current {
            if p == scope {
                return true;
            }
            current = self.elements.get(p).and_then(|e| e.parent);
        }
        false
    }
}

fn matcher(selector: &str) -> Result<Matcher> {
    Matcher::new(selector).map_err(|_| Error::SelectorInvalid(selector.to_string()))
}

fn index_elements(doc: &Document) -> (HashMap<NodeId, usize>, Vec<ElementInfo>) {
    let all = doc.select("*");
    let mut index = HashMap::new();
    let mut elements: Vec<ElementInfo> = Vec::with_capacity(all.length());

    for (position, node) in all.nodes().iter().enumerate() {
        index.insert(node.id, position);

        let parent = node.parent().and_then(|p| index.get(&p.id).copied());
        let tag = node
            .node_name()
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_default();
        let attrs: Vec<(String, String)> = node
            .attrs()
            .iter()
            .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
            .collect();
        let style = attr_value(&attrs, "style")
            .map(|s| parse_inline_style(&s))
            .unwrap_or_default();

        let parent_info = parent.and_then(|p| elements.get(p));
        let hidden = parent_info.is_some_and(|p| p.hidden)
            || NON_RENDERED_TAGS.contains(&tag.as_str())
            || attrs.iter().any(|(n, _)| n == "hidden")
            || declared(&style, "display").is_some_and(|d| d.eq_ignore_ascii_case("none"));
        let visibility = declared(&style, "visibility")
            .map(str::to_string)
            .or_else(|| parent_info.and_then(|p| p.visibility.clone()));
        let pointer_events = declared(&style, "pointer-events")
            .map(str::to_string)
            .or_else(|| parent_info.and_then(|p| p.pointer_events.clone()));

        let bbox = if hidden {
            BoundingBox {
                y: position as f64,
                ..BoundingBox::default()
            }
        } else {
            BoundingBox {
                x: 0.0,
                y: position as f64,
                width: length(&attrs, &style, "width").unwrap_or(NOMINAL_SIZE),
                height: length(&attrs, &style, "height").unwrap_or(NOMINAL_SIZE),
            }
        };

        let text = Selection::from(*node).text().to_string();

        elements.push(ElementInfo {
            tag,
            attrs,
            style,
            parent,
            text,
            hidden,
            visibility,
            pointer_events,
            bbox,
        });
    }

    (index, elements)
}

fn attr_value(attrs: &[(String, String)], name: &str) -> Option<String> {
    attrs
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

fn declared<'a>(style: &'a [(String, String)], property: &str) -> Option<&'a str> {
    // later declarations win
    style
        .iter()
        .rev()
        .find(|(n, _)| n == property)
        .map(|(_, v)| v.as_str())
}

/// Pixel length from an attribute (`width="120"`) or inline style (`width: 120px`).
fn length(attrs: &[(String, String)], style: &[(String, String)], property: &str) -> Option<f64> {
    let parse = |raw: &str| -> Option<f64> {
        let raw = raw.trim();
        let number = raw.strip_suffix("px").unwrap_or(raw).trim();
        number.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
    };

    declared(style, property)
        .and_then(parse)
        .or_else(|| attr_value(attrs, property).as_deref().and_then(parse))
}

/// Split an inline style into `(property, value)` declarations.
///
/// Semicolons inside parentheses or quotes (`url(data:image/png;base64,...)`) do
/// not end a declaration.
fn parse_inline_style(style: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    let mut push = |chunk: &str| {
        if let Some((name, value)) = chunk.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            let value = value
                .strip_suffix("!important")
                .unwrap_or(value)
                .trim()
                .to_string();
            if !name.is_empty() {
                declarations.push((name, value));
            }
        }
    };

    for (i, c) in style.char_indices() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (q, Some(open)) if q == open => quote = None,
            ('(', None) => depth += 1,
            (')', None) => depth = depth.saturating_sub(1),
            (';', None) if depth == 0 => {
                push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&style[start..]);

    declarations
}

/// The `url(...)` layers of a background declaration, or `none`.
fn background_image(style: &[(String, String)]) -> String {
    let value = declared(style, "background-image")
        .or_else(|| declared(style, "background"))
        .unwrap_or("none");

    let layers: Vec<&str> = CSS_URL.find_iter(value).map(|m| m.as_str()).collect();
    if layers.is_empty() {
        "none".to_string()
    } else {
        layers.join(", ")
    }
}

impl ContentTree for DomSnapshot {
    fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        let matcher = matcher(selector)?;
        Ok(self.handles(&self.doc.select_matcher(&matcher)))
    }

    fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        let matched = self.query_all(selector)?;
        Ok(matched
            .into_iter()
            .filter(|n| self.is_descendant(n.0, scope.0))
            .collect())
    }

    fn elements(&self) -> Vec<NodeHandle> {
        (0..self.elements.len()).map(NodeHandle).collect()
    }

    fn tag_name(&self, node: NodeHandle) -> Option<String> {
        self.info(node).map(|e| e.tag.clone())
    }

    fn attribute(&self, node: NodeHandle, name: &str) -> Option<String> {
        self.info(node).and_then(|e| attr_value(&e.attrs, name))
    }

    fn attributes(&self, node: NodeHandle) -> Vec<(String, String)> {
        self.info(node).map(|e| e.attrs.clone()).unwrap_or_default()
    }

    fn text_content(&self, node: NodeHandle) -> String {
        self.info(node).map(|e| e.text.clone()).unwrap_or_default()
    }

    fn computed_style(&self, node: NodeHandle, property: &str) -> Option<String> {
        let info = self.info(node)?;
        let property = property.to_ascii_lowercase();

        match property.as_str() {
            "display" => declared(&info.style, "display")
                .map(str::to_string)
                .or_else(|| info.hidden.then(|| "none".to_string())),
            "visibility" => info.visibility.clone(),
            "pointer-events" => info.pointer_events.clone(),
            "background-image" => Some(background_image(&info.style)),
            _ => declared(&info.style, &property).map(str::to_string),
        }
    }

    fn bounding_box(&self, node: NodeHandle) -> Option<BoundingBox> {
        self.info(node).map(|e| e.bbox)
    }

    fn is_connected(&self, node: NodeHandle) -> bool {
        node.0 < self.elements.len()
    }

    fn ancestors(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut current = self.info(node).and_then(|e| e.parent);
        while let Some(p) = current {
            out.push(NodeHandle(p));
            current = self.elements.get(p).and_then(|e| e.parent);
        }
        out
    }
}

/// A page replayed from a sequence of HTML states.
///
/// The first state is shown initially. Each successful activation or scroll moves
/// to the next state; on the last state both report `false`.
pub struct HtmlPage {
    states: Vec<(PageIdentity, String)>,
    current: Cell<usize>,
    snapshot: RefCell<DomSnapshot>,
    activations: Cell<usize>,
}

impl HtmlPage {
    #[must_use]
    pub fn new(identity: PageIdentity, html: &str) -> Self {
        Self {
            snapshot: RefCell::new(DomSnapshot::parse(html)),
            states: vec![(identity, html.to_string())],
            current: Cell::new(0),
            activations: Cell::new(0),
        }
    }

    /// Build a single-state page from a URL and its markup.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] when `url` is not absolute.
    pub fn from_html(url: &str, html: &str) -> Result<Self> {
        Ok(Self::new(PageIdentity::new(url, "")?, html))
    }

    /// Append a state reached by the next activation.
    #[must_use]
    pub fn then(mut self, identity: PageIdentity, html: &str) -> Self {
        self.states.push((identity, html.to_string()));
        self
    }

    /// Append a state that keeps the identity of the last one.
    #[must_use]
    pub fn then_html(self, html: &str) -> Self {
        let identity = self.states[self.states.len() - 1].0.clone();
        self.then(identity, html)
    }

    /// Index of the state currently shown.
    #[must_use]
    pub fn state_index(&self) -> usize {
        self.current.get()
    }

    /// Number of activations and scrolls that moved the page.
    #[must_use]
    pub fn activation_count(&self) -> usize {
        self.activations.get()
    }

    fn advance(&self) -> bool {
        let next = self.current.get() + 1;
        let Some((_, html)) = self.states.get(next) else {
            return false;
        };
        *self.snapshot.borrow_mut() = DomSnapshot::parse(html);
        self.current.set(next);
        self.activations.set(self.activations.get() + 1);
        true
    }
}

impl ContentTree for HtmlPage {
    fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>> {
        self.snapshot.borrow().query_all(selector)
    }

    fn query_within(&self, scope: NodeHandle, selector: &str) -> Result<Vec<NodeHandle>> {
        self.snapshot.borrow().query_within(scope, selector)
    }

    fn elements(&self) -> Vec<NodeHandle> {
        self.snapshot.borrow().elements()
    }

    fn tag_name(&self, node: NodeHandle) -> Option<String> {
        self.snapshot.borrow().tag_name(node)
    }

    fn attribute(&self, node: NodeHandle, name: &str) -> Option<String> {
        self.snapshot.borrow().attribute(node, name)
    }

    fn attributes(&self, node: NodeHandle) -> Vec<(String, String)> {
        self.snapshot.borrow().attributes(node)
    }

    fn text_content(&self, node: NodeHandle) -> String {
        self.snapshot.borrow().text_content(node)
    }

    fn computed_style(&self, node: NodeHandle, property: &str) -> Option<String> {
        self.snapshot.borrow().computed_style(node, property)
    }

    fn bounding_box(&self, node: NodeHandle) -> Option<BoundingBox> {
        self.snapshot.borrow().bounding_box(node)
    }

    fn is_connected(&self, node: NodeHandle) -> bool {
        self.snapshot.borrow().is_connected(node)
    }

    fn ancestors(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.snapshot.borrow().ancestors(node)
    }
}

#[async_trait(?Send)]
impl Actuator for HtmlPage {
    async fn activate(&self, node: NodeHandle) -> Result<bool> {
        if !self.is_connected(node) {
            return Ok(false);
        }
        Ok(self.advance())
    }

    async fn scroll_to_end(&self) -> Result<bool> {
        Ok(self.advance())
    }
}

impl PageSource for HtmlPage {
    fn identity(&self) -> PageIdentity {
        let snapshot = self.snapshot.borrow();
        // `current` only ever points at an existing state
        let mut identity = self.states[self.current.get()].0.clone();

        if identity.title.is_empty() {
            if let Some(title) = snapshot.title() {
                identity.title = title;
            }
        }
        if let Some(base) = snapshot
            .base_href()
            .and_then(|href| identity.url.join(&href).ok())
        {
            identity = identity.with_base(base);
        }
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_attributes() {
        let doc = DomSnapshot::parse(
            r#"<div id="g" class="gallery"><img src="a.jpg" alt="A"><img src="b.jpg"></div>"#,
        );
        let imgs = doc.query_all("img").unwrap_or_default();
        assert_eq!(imgs.len(), 2);
        assert_eq!(doc.attribute(imgs[0], "alt"), Some("A".to_string()));
        assert_eq!(doc.tag_name(imgs[1]), Some("img".to_string()));

        let gallery = doc.query_all("#g").unwrap_or_default();
        assert_eq!(doc.query_within(gallery[0], "img").unwrap_or_default(), imgs);
        assert_eq!(doc.closest(imgs[0], "div"), Some(gallery[0]));
    }

    #[test]
    fn test_invalid_selector() {
        let doc = DomSnapshot::parse("<div></div>");
        assert!(matches!(doc.query_all("div[[["), Err(Error::SelectorInvalid(_))));
    }

    #[test]
    fn test_inline_style_with_data_uri() {
        let style = parse_inline_style(
            "color: red; background-image: url(data:image/png;base64,AAA) !important; width:10px",
        );
        assert_eq!(style.len(), 3);
        assert_eq!(style[1].1, "url(data:image/png;base64,AAA)");
        assert_eq!(style[2], ("width".to_string(), "10px".to_string()));
    }

    #[test]
    fn test_background_image_shorthand() {
        let doc = DomSnapshot::parse(
            r#"<div id="a" style="background: #000 url('x.png') no-repeat"></div><div id="b"></div>"#,
        );
        let a = doc.query_all("#a").unwrap_or_default()[0];
        let b = doc.query_all("#b").unwrap_or_default()[0];
        assert_eq!(doc.computed_style(a, "background-image"), Some("url('x.png')".to_string()));
        assert_eq!(doc.computed_style(b, "background-image"), Some("none".to_string()));
    }

    #[test]
    fn test_geometry() {
        let doc = DomSnapshot::parse(
            r#"<img id="a" width="300" height="200"><img id="b" style="width: 40px; height: 30px"><img id="c">"#,
        );
        let boxes: Vec<BoundingBox> = doc
            .query_all("img")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|n| doc.bounding_box(n))
            .collect();
        assert_eq!((boxes[0].width, boxes[0].height), (300.0, 200.0));
        assert_eq!((boxes[1].width, boxes[1].height), (40.0, 30.0));
        assert_eq!((boxes[2].width, boxes[2].height), (NOMINAL_SIZE, NOMINAL_SIZE));
    }

    #[test]
    fn test_page_identity_from_markup() {
        let page = HtmlPage::from_html(
            "https://example.com/a/b",
            r#"<html><head><title> Trips </title><base href="/static/"></head><body></body></html>"#,
        )
        .unwrap_or_else(|e| panic!("page: {e}"));
        let identity = page.identity();
        assert_eq!(identity.title, "Trips");
        assert_eq!(identity.base_url.as_str(), "https://example.com/static/");
    }

    #[tokio::test]
    async fn test_activation_advances_states() {
        let page = HtmlPage::from_html("https://example.com/", "<p>one</p><a href='/2'>next</a>")
            .unwrap_or_else(|e| panic!("page: {e}"))
            .then_html("<p>two</p>");
        let link = page.query_all("a").unwrap_or_default()[0];

        assert!(page.activate(link).await.unwrap_or(false));
        assert_eq!(page.state_index(), 1);
        assert_eq!(page.query_all("a").unwrap_or_default().len(), 0);
        assert!(!page.scroll_to_end().await.unwrap_or(true));
        assert_eq!(page.activation_count(), 1);
    }
}
