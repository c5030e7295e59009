//! Asset Gatherer
//!
//! Walks the candidate selectors, pulls one or more URLs out of every matched node
//! using a fixed source priority, canonicalizes and deduplicates them, then
//! optionally probes natural dimensions and applies the size/format gate.
//!
//! Source priority per node:
//! 1. direct attribute (`src`, or `poster` alone on `video`), unless it is a
//!    placeholder and a lazy source exists
//! 2. lazy-load attributes (`data-src`, `data-original`, ...)
//! 3. `srcset` variants, largest candidate
//! 4. computed `background-image`, every `url(...)` layer
//! 5. any other `data-*` attribute holding a URL
//!
//! A secondary sweep then reads the background layers of every node in scope,
//! asset-bearing ones included, into the same deduplicated set.

use std::collections::{BTreeMap, HashSet};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::batch::{run_batch, BatchItem};
use crate::host::{ContentTree, Dimensions, NodeHandle, ResourceProber};
use crate::options::GatherConfig;
use crate::patterns::{CSS_URL, LAZY_ATTRIBUTES, SRCSET_ATTRIBUTES, SRCSET_DESCRIPTOR};
use crate::result::{AssetRecord, Gathered, SourceKind};
use crate::url_utils::{self, CanonicalUrl};
use crate::Result;

/// Host capabilities and session state a gathering pass needs.
#[derive(Clone, Copy)]
pub struct GatherContext<'a> {
    pub tree: &'a dyn ContentTree,
    pub prober: &'a dyn ResourceProber,
    /// Reference point for [`AssetRecord::discovered_at`].
    pub origin: Instant,
    pub cancel: &'a CancellationToken,
}

/// Container tags whose assets live on inner `img`/`source` elements.
const WRAPPER_TAGS: &[&str] = &["picture", "figure"];

/// Filename fragments of lazy-load placeholder images.
const PLACEHOLDER_HINTS: &[&str] = &["placeholder", "blank.", "spacer.", "transparent.", "lazy.", "loading."];

/// Run one gathering pass.
///
/// # Errors
///
/// Element-level problems never fail the pass. The only error is
/// [`crate::Error::BatchItemFailed`] from dimension probing when the probe batch
/// is configured with `continue_on_error = false`.
pub async fn gather(ctx: &GatherContext<'_>, config: &GatherConfig) -> Result<Gathered> {
    let mut gathered = collect(ctx.tree, config, ctx.origin);

    if config.probe_dimensions && !gathered.records.is_empty() {
        probe_dimensions(ctx, config, &mut gathered).await?;
    }

    apply_gate(config, &mut gathered);

    tracing::debug!(
        records = gathered.records.len(),
        visited = gathered.stats.nodes_visited,
        skipped = gathered.stats.skipped,
        duplicates = gathered.stats.duplicates,
        rejected = gathered.stats.rejected,
        "gathering pass complete"
    );
    Ok(gathered)
}

/// Gathering without dimension probing: [`collect`] followed by the validation
/// gate, which then only sees displayed dimensions.
#[must_use]
pub fn sweep(tree: &dyn ContentTree, config: &GatherConfig, origin: Instant) -> Gathered {
    let mut gathered = collect(tree, config, origin);
    apply_gate(config, &mut gathered);
    gathered
}

/// The synchronous sweep: extraction, canonicalization and deduplication.
///
/// Neither probing nor the validation gate is applied.
#[must_use]
pub fn collect(tree: &dyn ContentTree, config: &GatherConfig, origin: Instant) -> Gathered {
    let scopes = resolve_scopes(tree, config);
    let mut collector = Collector {
        tree,
        config,
        origin,
        seen: HashSet::new(),
        gathered: Gathered::default(),
    };

    let mut visited: HashSet<NodeHandle> = HashSet::new();
    // nodes whose background layers were already taken as their primary source
    let mut backgrounds_taken: HashSet<NodeHandle> = HashSet::new();

    for selector in &config.selectors {
        for node in query_scoped(tree, scopes.as_deref(), selector) {
            for target in expand_wrapper(tree, node) {
                if visited.insert(target) {
                    collector.gathered.stats.nodes_visited += 1;
                    for (raw, kind) in extract_urls(tree, target) {
                        if kind == SourceKind::CssBackground {
                            backgrounds_taken.insert(target);
                        }
                        collector.push(target, &raw, kind);
                    }
                }
            }
        }
    }

    if config.sweep_backgrounds {
        for node in query_scoped(tree, scopes.as_deref(), "*") {
            if backgrounds_taken.contains(&node) {
                continue;
            }
            let layers = background_urls(tree, node);
            if layers.is_empty() {
                continue;
            }
            if visited.insert(node) {
                collector.gathered.stats.nodes_visited += 1;
            }
            for raw in layers {
                collector.push(node, &raw, SourceKind::CssBackground);
            }
        }
    }

    collector.gathered
}

struct Collector<'a> {
    tree: &'a dyn ContentTree,
    config: &'a GatherConfig,
    origin: Instant,
    seen: HashSet<CanonicalUrl>,
    gathered: Gathered,
}

impl Collector<'_> {
    fn push(&mut self, node: NodeHandle, raw: &str, kind: SourceKind) {
        let Some(own) = self.canonical_asset(raw) else {
            self.gathered.stats.skipped += 1;
            return;
        };

        let (canonical_url, thumbnail_url) = match self.linked_asset(node) {
            Some(full) if full != own => (full, Some(own)),
            _ => (own, None),
        };

        if self.config.deduplicate && !self.seen.insert(canonical_url.clone()) {
            self.gathered.stats.duplicates += 1;
            return;
        }

        let displayed_dimensions = self
            .tree
            .bounding_box(node)
            .map(|b| b.dimensions())
            .unwrap_or_default();

        let metadata = if self.config.include_metadata {
            capture_metadata(self.tree, node)
        } else {
            BTreeMap::new()
        };

        self.gathered.records.push(AssetRecord {
            format: url_utils::asset_format(canonical_url.as_str()),
            canonical_url,
            thumbnail_url,
            source_kind: kind,
            natural_dimensions: None,
            displayed_dimensions,
            metadata,
            discovered_at: self.origin.elapsed(),
        });
    }

    fn canonical_asset(&self, raw: &str) -> Option<CanonicalUrl> {
        match url_utils::canonicalize(raw, &self.config.canonicalize) {
            Ok(url) if url_utils::is_likely_asset(url.as_str(), &self.config.allowed_formats) => {
                Some(url)
            }
            Ok(url) => {
                tracing::trace!(url = %url, "not an asset");
                None
            }
            Err(err) => {
                tracing::trace!(error = %err, "skipping URL");
                None
            }
        }
    }

    /// Full-size target of an enclosing link, when `follow_links` is on.
    fn linked_asset(&self, node: NodeHandle) -> Option<CanonicalUrl> {
        if !self.config.follow_links {
            return None;
        }
        let link = self.tree.closest(node, "a")?;
        let href = self.tree.attribute(link, "href")?;
        self.canonical_asset(&href)
    }
}

fn resolve_scopes(tree: &dyn ContentTree, config: &GatherConfig) -> Option<Vec<NodeHandle>> {
    let selector = config.container_selector.as_deref()?;
    match tree.query_all(selector) {
        Ok(scopes) => Some(scopes),
        Err(err) => {
            tracing::warn!(%selector, error = %err, "ignoring container selector");
            None
        }
    }
}

/// Matches of `selector` inside the scopes (or the whole document), deduplicated,
/// invalid selectors yielding nothing.
fn query_scoped(tree: &dyn ContentTree, scopes: Option<&[NodeHandle]>, selector: &str) -> Vec<NodeHandle> {
    let result = match scopes {
        None => tree.query_all(selector),
        Some(scopes) => scopes
            .iter()
            .map(|&scope| tree.query_within(scope, selector))
            .collect::<Result<Vec<_>>>()
            .map(|nested| {
                let mut seen = HashSet::new();
                nested.into_iter().flatten().filter(|n| seen.insert(*n)).collect()
            }),
    };

    result.unwrap_or_else(|err| {
        tracing::debug!(%selector, error = %err, "skipping selector");
        Vec::new()
    })
}

/// `picture`/`figure` resolve to their inner `img`/`source` elements.
fn expand_wrapper(tree: &dyn ContentTree, node: NodeHandle) -> Vec<NodeHandle> {
    let is_wrapper = tree
        .tag_name(node)
        .is_some_and(|t| WRAPPER_TAGS.contains(&t.as_str()));
    if !is_wrapper {
        return vec![node];
    }
    match tree.query_within(node, "img, source") {
        Ok(inner) if !inner.is_empty() => inner,
        _ => vec![node],
    }
}

/// Raw URL references of one node, from the highest-priority source that has any.
#[must_use]
pub fn extract_urls(tree: &dyn ContentTree, node: NodeHandle) -> Vec<(String, SourceKind)> {
    let attr = |name: &str| {
        tree.attribute(node, name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let lazy = LAZY_ATTRIBUTES.iter().find_map(|name| attr(name));
    let srcset = SRCSET_ATTRIBUTES
        .iter()
        .find_map(|name| attr(name).and_then(|v| best_srcset_candidate(&v)));

    // a video's own src is the clip, only its poster is an image
    let direct: &[&str] = if tree.tag_name(node).as_deref() == Some("video") {
        &["poster"]
    } else {
        &["src", "poster"]
    };

    for &name in direct {
        if let Some(value) = attr(name) {
            if is_placeholder(&value) && (lazy.is_some() || srcset.is_some()) {
                continue;
            }
            return vec![(value, SourceKind::DirectAttribute)];
        }
    }

    if let Some(value) = lazy {
        if value.contains("url(") {
            return css_urls(&value)
                .into_iter()
                .map(|u| (u, SourceKind::LazyAttribute))
                .collect();
        }
        return vec![(value, SourceKind::LazyAttribute)];
    }

    if let Some(value) = srcset {
        return vec![(value, SourceKind::Srcset)];
    }

    let layers = background_urls(tree, node);
    if !layers.is_empty() {
        return layers
            .into_iter()
            .map(|u| (u, SourceKind::CssBackground))
            .collect();
    }

    tree.attributes(node)
        .into_iter()
        .find(|(name, value)| {
            name.starts_with("data-")
                && !LAZY_ATTRIBUTES.contains(&name.as_str())
                && !SRCSET_ATTRIBUTES.contains(&name.as_str())
                && looks_like_url(value)
        })
        .map(|(_, value)| vec![(value.trim().to_string(), SourceKind::LazyAttribute)])
        .unwrap_or_default()
}

fn background_urls(tree: &dyn ContentTree, node: NodeHandle) -> Vec<String> {
    tree.computed_style(node, "background-image")
        .filter(|v| !v.trim().eq_ignore_ascii_case("none"))
        .map(|v| css_urls(&v))
        .unwrap_or_default()
}

/// Every `url(...)` reference of a CSS value, in order.
#[must_use]
pub fn css_urls(value: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

/// URL of the largest candidate of a `srcset` value.
///
/// Width descriptors (`800w`) beat density descriptors (`2x`); a candidate
/// without descriptor counts as `1x`. Ties keep the first candidate.
#[must_use]
pub fn best_srcset_candidate(srcset: &str) -> Option<String> {
    let mut best: Option<(bool, f64, &str)> = None;

    for candidate in srcset.split(',') {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else { continue };

        let (is_width, value) = parts
            .next()
            .and_then(|d| SRCSET_DESCRIPTOR.captures(d))
            .and_then(|c| {
                let value = c.get(1)?.as_str().parse::<f64>().ok()?;
                Some((c.get(2)?.as_str() == "w", value))
            })
            .unwrap_or((false, 1.0));

        let better = match best {
            None => true,
            Some((best_w, best_v, _)) => (is_width, value) > (best_w, best_v),
        };
        if better {
            best = Some((is_width, value, url));
        }
    }

    best.map(|(_, _, url)| url.to_string())
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("data:") || PLACEHOLDER_HINTS.iter().any(|hint| lower.contains(hint))
}

fn looks_like_url(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return false;
    }
    value.starts_with("http://")
        || value.starts_with("https://")
        || value.starts_with("//")
        || (value.contains('/') && value.contains('.'))
}

fn capture_metadata(tree: &dyn ContentTree, node: NodeHandle) -> BTreeMap<String, String> {
    tree.attributes(node)
        .into_iter()
        .filter(|(name, value)| {
            !value.trim().is_empty()
                && (matches!(name.as_str(), "alt" | "title" | "class" | "id")
                    || name.starts_with("data-"))
        })
        .collect()
}

async fn probe_dimensions(
    ctx: &GatherContext<'_>,
    config: &GatherConfig,
    gathered: &mut Gathered,
) -> Result<()> {
    let prober = ctx.prober;
    let urls: Vec<String> = gathered
        .records
        .iter()
        .map(|r| r.canonical_url.as_str().to_string())
        .collect();

    let outcomes = run_batch(
        urls,
        move |url: String, _| async move { prober.probe(&url).await },
        &config.probe_batch,
        ctx.cancel,
    )
    .await?;

    for (record, outcome) in gathered.records.iter_mut().zip(outcomes) {
        match outcome {
            BatchItem::Ok(dims) => record.natural_dimensions = Some(dims),
            BatchItem::Failed(reason) => {
                tracing::debug!(url = %record.canonical_url, %reason, "dimension probe failed");
                gathered.stats.probe_failures += 1;
                record.natural_dimensions = Some(Dimensions::ZERO);
            }
            BatchItem::Skipped => {}
        }
    }
    Ok(())
}

/// Drop records below the size thresholds or outside the allowed formats.
fn apply_gate(config: &GatherConfig, gathered: &mut Gathered) {
    let before = gathered.records.len();

    gathered.records.retain(|record| {
        let dims = record.best_dimensions();
        if config.min_width.is_some_and(|w| dims.width < w)
            || config.min_height.is_some_and(|h| dims.height < h)
        {
            return false;
        }
        if config.allowed_formats.is_empty() {
            return true;
        }
        // unknown formats cannot be judged and pass
        record.format.as_ref().is_none_or(|format| {
            config
                .allowed_formats
                .iter()
                .any(|f| f.eq_ignore_ascii_case(format))
        })
    });

    gathered.stats.rejected += before - gathered.records.len();
}
