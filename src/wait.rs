//! Selector wait/retry engine.
//!
//! Polls the content tree for the first candidate selector that has a qualifying
//! match. An outer loop runs `retries` independent attempts of `timeout` each,
//! backing off linearly (`interval * attempt`) between them. Every sleep races the
//! caller's cancellation token.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::host::{ContentTree, NodeHandle};
use crate::options::WaitOptions;
use crate::predicates;
use crate::{Error, Result};

/// Filters a match must pass to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Default: `true`
    pub require_visible: bool,
    /// Default: `false`
    pub require_enabled: bool,
    /// Return every qualifying match of the winning selector, not only the first.
    ///
    /// Default: `false`
    pub expect_multiple: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            require_visible: true,
            require_enabled: false,
            expect_multiple: false,
        }
    }
}

/// What to look for: ordered candidate selectors plus constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorQuery {
    pub candidate_selectors: Vec<String>,
    pub constraints: Constraints,
}

impl SelectorQuery {
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidate_selectors: selectors.into_iter().map(Into::into).collect(),
            constraints: Constraints::default(),
        }
    }

    #[must_use]
    pub fn visible(mut self, required: bool) -> Self {
        self.constraints.require_visible = required;
        self
    }

    #[must_use]
    pub fn enabled(mut self, required: bool) -> Self {
        self.constraints.require_enabled = required;
        self
    }

    #[must_use]
    pub fn multiple(mut self, expected: bool) -> Self {
        self.constraints.expect_multiple = expected;
        self
    }
}

/// Terminal outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResult {
    Found {
        matched_selector: String,
        elements: Vec<NodeHandle>,
        attempts: u32,
        elapsed: Duration,
    },
    NotFound {
        attempts: u32,
        elapsed: Duration,
    },
}

impl WaitResult {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    #[must_use]
    pub fn elements(&self) -> &[NodeHandle] {
        match self {
            Self::Found { elements, .. } => elements,
            Self::NotFound { .. } => &[],
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<NodeHandle> {
        self.elements().first().copied()
    }

    #[must_use]
    pub fn matched_selector(&self) -> Option<&str> {
        match self {
            Self::Found {
                matched_selector, ..
            } => Some(matched_selector),
            Self::NotFound { .. } => None,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Found { attempts, .. } | Self::NotFound { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Found { elapsed, .. } | Self::NotFound { elapsed, .. } => *elapsed,
        }
    }
}

/// Sleep for `duration` unless `cancel` fires first.
///
/// # Errors
///
/// [`Error::Cancelled`] when the token is (or becomes) cancelled.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

fn qualifies(tree: &dyn ContentTree, node: NodeHandle, constraints: &Constraints) -> bool {
    (!constraints.require_visible || predicates::is_visible(tree, node))
        && (!constraints.require_enabled || predicates::is_enabled(tree, node))
}

/// One synchronous pass over the candidate selectors.
///
/// Returns the first selector with qualifying matches together with the match
/// (or all matches when `expect_multiple`). Malformed selectors count as no match.
#[must_use]
pub fn poll_once(
    tree: &dyn ContentTree,
    query: &SelectorQuery,
) -> Option<(String, Vec<NodeHandle>)> {
    for selector in &query.candidate_selectors {
        let nodes = match tree.query_all(selector) {
            Ok(nodes) => nodes,
            Err(err) => {
                tracing::debug!(%selector, error = %err, "skipping selector");
                continue;
            }
        };

        let mut qualifying = nodes
            .into_iter()
            .filter(|&n| qualifies(tree, n, &query.constraints));

        if query.constraints.expect_multiple {
            let all: Vec<NodeHandle> = qualifying.collect();
            if !all.is_empty() {
                return Some((selector.clone(), all));
            }
        } else if let Some(first) = qualifying.next() {
            return Some((selector.clone(), vec![first]));
        }
    }
    None
}

/// Wait until one of the query's selectors has a qualifying match.
///
/// # Errors
///
/// - [`Error::ResolutionTimeout`] when every attempt ran out and
///   `options.throw_on_timeout` is set.
/// - [`Error::Cancelled`] when `cancel` fires during a wait.
pub async fn resolve_selector(
    tree: &dyn ContentTree,
    query: &SelectorQuery,
    options: &WaitOptions,
    cancel: &CancellationToken,
) -> Result<WaitResult> {
    let started = Instant::now();
    let retries = options.retries.max(1);
    let timeout = options.timeout();
    let interval = options.interval();

    for attempt in 1..=retries {
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if let Some((matched_selector, elements)) = poll_once(tree, query) {
                tracing::debug!(
                    selector = %matched_selector,
                    matches = elements.len(),
                    attempt,
                    "selector resolved"
                );
                return Ok(WaitResult::Found {
                    matched_selector,
                    elements,
                    attempts: attempt,
                    elapsed: started.elapsed(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            pause(interval.min(deadline - now), cancel).await?;
        }

        if attempt < retries {
            let backoff = interval * attempt;
            tracing::debug!(attempt, ?backoff, "no qualifying match, backing off");
            pause(backoff, cancel).await?;
        }
    }

    let elapsed = started.elapsed();
    tracing::debug!(
        selectors = ?query.candidate_selectors,
        attempts = retries,
        ?elapsed,
        "selector resolution timed out"
    );

    if options.throw_on_timeout {
        Err(Error::ResolutionTimeout {
            selectors: query.candidate_selectors.clone(),
            attempts: retries,
            elapsed,
        })
    } else {
        Ok(WaitResult::NotFound {
            attempts: retries,
            elapsed,
        })
    }
}
