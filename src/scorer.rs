//! Smart candidate scorer.
//!
//! Ranks nodes by how likely they are to enclose repeated media content, using a
//! fixed linear weighting of boolean features. Weights are kept in tenths so the
//! `min_score` threshold compares exactly.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::host::{ContentTree, NodeHandle};
use crate::options::ScoreCriteria;
use crate::patterns::MEDIA_VOCABULARY;
use crate::predicates;
use crate::result::{CandidateScore, FeatureFlags};
use crate::Result;

const WEIGHT_IMAGE: u32 = 3;
const WEIGHT_VIDEO: u32 = 2;
const WEIGHT_LINK: u32 = 2;
const WEIGHT_TEXT: u32 = 1;
const WEIGHT_CLASS: u32 = 1;
const WEIGHT_ID: u32 = 1;
const WEIGHT_DATA_ATTRIBUTE: u32 = 1;
const WEIGHT_MEDIA_VOCABULARY: u32 = 2;
const MAX_TENTHS: u32 = 10;

/// Weighted sum of the flags, in tenths, capped at 10.
#[must_use]
pub fn score_tenths(flags: &FeatureFlags) -> u32 {
    let weighted = [
        (flags.has_image, WEIGHT_IMAGE),
        (flags.has_video, WEIGHT_VIDEO),
        (flags.has_link, WEIGHT_LINK),
        (flags.has_text, WEIGHT_TEXT),
        (flags.has_class, WEIGHT_CLASS),
        (flags.has_id, WEIGHT_ID),
        (flags.has_data_attribute, WEIGHT_DATA_ATTRIBUTE),
        (flags.media_vocabulary, WEIGHT_MEDIA_VOCABULARY),
    ];
    weighted
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, w)| w)
        .sum::<u32>()
        .min(MAX_TENTHS)
}

/// Nodes that are or contain a match of `selector`.
fn with_ancestors(tree: &dyn ContentTree, selector: &str) -> Result<HashSet<NodeHandle>> {
    let mut marked = HashSet::new();
    for node in tree.query_all(selector)? {
        if marked.insert(node) {
            marked.extend(tree.ancestors(node));
        }
    }
    Ok(marked)
}

/// Score candidates, best first.
///
/// Only candidates reaching `criteria.min_score` are returned. Equal scores keep
/// document order.
///
/// # Errors
///
/// [`crate::Error::SelectorInvalid`] when `criteria.scope` is not a valid selector.
pub fn score_candidates(tree: &dyn ContentTree, criteria: &ScoreCriteria) -> Result<Vec<CandidateScore>> {
    let candidates = match criteria.scope.as_deref() {
        Some(scope) => tree.query_all(scope)?,
        None => tree.elements(),
    };

    let images = with_ancestors(tree, "img, svg, picture")?;
    let videos = with_ancestors(tree, "video")?;
    let links = with_ancestors(tree, "a[href]")?;

    let mut ranked: Vec<(u32, CandidateScore)> = candidates
        .into_iter()
        .filter(|&node| criteria.include_invisible || predicates::is_visible(tree, node))
        .filter_map(|node| {
            let text = tree.text_content(node);
            let class = tree.attribute(node, "class").unwrap_or_default();
            let flags = FeatureFlags {
                has_image: images.contains(&node),
                has_video: videos.contains(&node),
                has_link: links.contains(&node),
                has_text: !text.trim().is_empty(),
                has_class: !class.trim().is_empty(),
                has_id: tree.attribute(node, "id").is_some_and(|id| !id.trim().is_empty()),
                has_data_attribute: predicates::has_data_attribute(tree, node),
                media_vocabulary: criteria.analyze_content
                    && (MEDIA_VOCABULARY.is_match(&text) || MEDIA_VOCABULARY.is_match(&class)),
            };

            let tenths = score_tenths(&flags);
            let score = f64::from(tenths) / 10.0;
            (score >= criteria.min_score).then(|| {
                (
                    tenths,
                    CandidateScore {
                        node,
                        score,
                        feature_flags: flags,
                        bounding_box: tree.bounding_box(node).unwrap_or_default(),
                    },
                )
            })
        })
        .collect();

    ranked.sort_by_key(|(tenths, _)| Reverse(*tenths));

    let mut scored: Vec<CandidateScore> = ranked.into_iter().map(|(_, c)| c).collect();
    if let Some(limit) = criteria.max_results {
        scored.truncate(limit);
    }

    tracing::debug!(candidates = scored.len(), "scored candidate containers");
    Ok(scored)
}

/// A selector that re-finds `node`: `#id` when it has a usable id, otherwise
/// `tag.class1.class2`. `None` when neither is available.
#[must_use]
pub fn derive_selector(tree: &dyn ContentTree, node: NodeHandle) -> Option<String> {
    if let Some(id) = tree.attribute(node, "id").map(|id| id.trim().to_string()) {
        if is_identifier(&id) {
            return Some(format!("#{id}"));
        }
    }

    let tag = tree.tag_name(node)?;
    let classes: Vec<String> = tree
        .attribute(node, "class")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|c| is_identifier(c))
        .map(str::to_string)
        .collect();

    if classes.is_empty() {
        None
    } else {
        Some(format!("{tag}.{}", classes.join(".")))
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
