//! Element predicates shared by every stage.
//!
//! Each predicate is a pure function of the host's view of one node, so they can be
//! used as filters in the wait engine, detection signals and the scorer alike.

use crate::host::{ContentTree, NodeHandle};

/// Minimum rendered side length of a "significant" image.
pub const SIGNIFICANT_IMAGE_MIN_SIDE: f64 = 50.0;

/// Rendered and not hidden by style.
///
/// Requires the node to be attached, to have a non-zero layout box, and to not be
/// hidden through `display`, `visibility` or `opacity`.
#[must_use]
pub fn is_visible(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    if !tree.is_connected(node) {
        return false;
    }

    match tree.bounding_box(node) {
        Some(bbox) if bbox.area() > 0.0 => {}
        _ => return false,
    }

    if style_is(tree, node, "display", "none") {
        return false;
    }
    if let Some(visibility) = tree.computed_style(node, "visibility") {
        let visibility = visibility.trim().to_ascii_lowercase();
        if visibility == "hidden" || visibility == "collapse" {
            return false;
        }
    }
    if let Some(opacity) = tree.computed_style(node, "opacity") {
        if opacity.trim().parse::<f64>().is_ok_and(|o| o <= 0.0) {
            return false;
        }
    }

    true
}

/// Not disabled and able to receive pointer events.
#[must_use]
pub fn is_enabled(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    if tree.has_attribute(node, "disabled") {
        return false;
    }
    if style_is(tree, node, "pointer-events", "none") {
        return false;
    }
    if tree
        .attribute(node, "aria-disabled")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    {
        return false;
    }
    // pagination widgets mark the inactive "next" on the last page this way
    !has_class_token(tree, node, "disabled")
}

/// Something a user could click or focus.
#[must_use]
pub fn is_interactive(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    let tag = tree.tag_name(node).unwrap_or_default();
    match tag.as_str() {
        "a" => return tree.has_attribute(node, "href"),
        "button" | "select" | "textarea" | "summary" => return true,
        "input" => {
            return !tree
                .attribute(node, "type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"));
        }
        _ => {}
    }

    if tree
        .attribute(node, "role")
        .is_some_and(|r| matches!(r.trim().to_ascii_lowercase().as_str(), "button" | "link"))
    {
        return true;
    }
    if tree.has_attribute(node, "onclick") {
        return true;
    }
    tree.attribute(node, "tabindex")
        .and_then(|t| t.trim().parse::<i32>().ok())
        .is_some_and(|t| t >= 0)
}

/// Visible, enabled and interactive: a control the pipeline may activate.
#[must_use]
pub fn is_actionable(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    is_visible(tree, node) && is_enabled(tree, node) && is_interactive(tree, node)
}

/// A visible image element rendered at least 50×50 pixels.
#[must_use]
pub fn is_significant_image(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    let is_image = tree
        .tag_name(node)
        .is_some_and(|t| matches!(t.as_str(), "img" | "svg" | "picture"));
    if !is_image || !is_visible(tree, node) {
        return false;
    }
    tree.bounding_box(node).is_some_and(|b| {
        b.width >= SIGNIFICANT_IMAGE_MIN_SIDE && b.height >= SIGNIFICANT_IMAGE_MIN_SIDE
    })
}

/// Whether the node has any `data-*` attribute.
#[must_use]
pub fn has_data_attribute(tree: &dyn ContentTree, node: NodeHandle) -> bool {
    tree.attributes(node)
        .iter()
        .any(|(name, _)| name.starts_with("data-"))
}

/// Whether the whitespace-separated class list contains `token`.
#[must_use]
pub fn has_class_token(tree: &dyn ContentTree, node: NodeHandle, token: &str) -> bool {
    tree.attribute(node, "class")
        .is_some_and(|c| c.split_whitespace().any(|t| t.eq_ignore_ascii_case(token)))
}

fn style_is(tree: &dyn ContentTree, node: NodeHandle, property: &str, value: &str) -> bool {
    tree.computed_style(node, property)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomSnapshot;

    fn first(doc: &DomSnapshot, selector: &str) -> NodeHandle {
        doc.query_all(selector)
            .ok()
            .and_then(|v| v.first().copied())
            .unwrap_or_else(|| panic!("no match for {selector}"))
    }

    #[test]
    fn test_visibility_rules() {
        let doc = DomSnapshot::parse(
            r#"<div>
                <img id="ok" src="a.jpg" width="10" height="10">
                <img id="none" src="a.jpg" style="display:none">
                <div style="display: none"><img id="nested" src="a.jpg"></div>
                <img id="vis" src="a.jpg" style="visibility:hidden">
                <img id="opacity" src="a.jpg" style="opacity: 0">
                <img id="zero" src="a.jpg" width="0" height="40">
                <img id="hidden" src="a.jpg" hidden>
            </div>"#,
        );
        assert!(is_visible(&doc, first(&doc, "#ok")));
        for id in ["#none", "#nested", "#vis", "#opacity", "#zero", "#hidden"] {
            assert!(!is_visible(&doc, first(&doc, id)), "{id} should be hidden");
        }
    }

    #[test]
    fn test_enabled_rules() {
        let doc = DomSnapshot::parse(
            r#"<div>
                <button id="ok">Go</button>
                <button id="dis" disabled>Go</button>
                <a id="aria" href="/n" aria-disabled="true">Next</a>
                <a id="pe" href="/n" style="pointer-events: none">Next</a>
                <a id="cls" href="/n" class="next disabled">Next</a>
            </div>"#,
        );
        assert!(is_enabled(&doc, first(&doc, "#ok")));
        for id in ["#dis", "#aria", "#pe", "#cls"] {
            assert!(!is_enabled(&doc, first(&doc, id)), "{id} should be disabled");
        }
    }

    #[test]
    fn test_interactive_rules() {
        let doc = DomSnapshot::parse(
            r#"<div>
                <a id="link" href="/x">x</a>
                <a id="anchor" name="top">x</a>
                <span id="role" role="button">x</span>
                <input id="hidden-input" type="hidden">
                <div id="tab" tabindex="0">x</div>
                <div id="plain">x</div>
            </div>"#,
        );
        assert!(is_interactive(&doc, first(&doc, "#link")));
        assert!(is_interactive(&doc, first(&doc, "#role")));
        assert!(is_interactive(&doc, first(&doc, "#tab")));
        assert!(!is_interactive(&doc, first(&doc, "#anchor")));
        assert!(!is_interactive(&doc, first(&doc, "#hidden-input")));
        assert!(!is_interactive(&doc, first(&doc, "#plain")));
    }

    #[test]
    fn test_significant_image() {
        let doc = DomSnapshot::parse(
            r#"<div>
                <img id="big" src="a.jpg" width="50" height="50">
                <img id="icon" src="i.png" width="16" height="16">
                <img id="unsized" src="u.png">
            </div>"#,
        );
        assert!(is_significant_image(&doc, first(&doc, "#big")));
        assert!(!is_significant_image(&doc, first(&doc, "#icon")));
        assert!(!is_significant_image(&doc, first(&doc, "#unsized")));
    }
}
