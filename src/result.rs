//! Result types produced by the pipeline.
//!
//! This module defines the asset records handed back to callers along with the
//! transient scoring and traversal state that accompanies them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::{BoundingBox, Dimensions, NodeHandle};
use crate::url_utils::CanonicalUrl;
use crate::Error;

/// Where in the markup an asset URL was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// `src` / `poster` attribute.
    DirectAttribute,
    /// A lazy-load attribute such as `data-src`, or a free-form `data-*` URL.
    LazyAttribute,
    /// A `url(...)` reference in the computed `background-image`.
    CssBackground,
    /// The best candidate of a `srcset` list.
    Srcset,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectAttribute => "direct-attribute",
            Self::LazyAttribute => "lazy-attribute",
            Self::CssBackground => "css-background",
            Self::Srcset => "srcset",
        })
    }
}

/// One media asset discovered on the page.
///
/// Records are created by a single gathering pass and never modified afterwards.
/// Within a deduplicated result set `canonical_url` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Normalized absolute URL, the deduplication key.
    pub canonical_url: CanonicalUrl,

    /// Smaller preview of the same asset, when the page links a full-size version.
    pub thumbnail_url: Option<CanonicalUrl>,

    /// Which markup source produced the URL.
    pub source_kind: SourceKind,

    /// Lowercase file format (`jpg`, `webp`, ...), when it can be told.
    pub format: Option<String>,

    /// Intrinsic pixel size. `None` when not probed, zero when probing failed.
    pub natural_dimensions: Option<Dimensions>,

    /// Rendered size on the page.
    pub displayed_dimensions: Dimensions,

    /// Free-form attributes: alt, title, class, id and `data-*`.
    pub metadata: BTreeMap<String, String>,

    /// Time since the session started when the record was created.
    pub discovered_at: Duration,
}

impl AssetRecord {
    /// Larger of natural and displayed width/height.
    #[must_use]
    pub fn best_dimensions(&self) -> Dimensions {
        let natural = self.natural_dimensions.unwrap_or_default();
        Dimensions::new(
            natural.width.max(self.displayed_dimensions.width),
            natural.height.max(self.displayed_dimensions.height),
        )
    }
}

/// Counters of one gathering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherStats {
    /// Distinct nodes inspected.
    pub nodes_visited: usize,
    /// URLs dropped as invalid or not asset-like.
    pub skipped: usize,
    /// Records dropped because their canonical URL was already present.
    pub duplicates: usize,
    /// Records dropped by the size/format gate.
    pub rejected: usize,
    /// Dimension probes that failed (record kept with zero natural size).
    pub probe_failures: usize,
}

/// Records and counters of one gathering pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gathered {
    pub records: Vec<AssetRecord>,
    pub stats: GatherStats,
}

/// Boolean features the candidate scorer looked at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureFlags {
    pub has_image: bool,
    pub has_video: bool,
    pub has_link: bool,
    pub has_text: bool,
    pub has_class: bool,
    pub has_id: bool,
    pub has_data_attribute: bool,
    pub media_vocabulary: bool,
}

/// A node ranked by how likely it is to be a content container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub node: NodeHandle,
    /// Weighted feature sum in `[0, 1]`.
    pub score: f64,
    pub feature_flags: FeatureFlags,
    pub bounding_box: BoundingBox,
}

/// Why a pagination traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    NoNextControl,
    NoNewRecords,
    MaxRounds,
    ActuationFailed,
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoNextControl => "no-next-control",
            Self::NoNewRecords => "no-new-records",
            Self::MaxRounds => "max-rounds",
            Self::ActuationFailed => "actuation-failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Progress of a pagination traversal, updated once per round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    /// Rounds started so far (1-based once traversal begins).
    pub round_index: u32,
    /// Selector (or `text:` match) of the last control activated.
    pub last_control_selector_used: Option<String>,
    /// Asset-bearing nodes inspected in the latest round.
    pub seen_container_count: usize,
    pub termination_reason: Option<TerminationReason>,
}

/// Accumulated records and final state of a traversal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traversal {
    pub records: Vec<AssetRecord>,
    pub state: PaginationState,
    /// Why the last activation or scroll failed, for `actuation-failed`.
    pub actuation_error: Option<Error>,
}
