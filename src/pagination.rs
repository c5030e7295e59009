//! Pagination and infinite-scroll traversal.
//!
//! Rounds run strictly one after another: gather, merge the new records, find and
//! activate a "next" control (or scroll), wait for the content to settle, repeat.
//! The first termination condition met ends the traversal; records collected up to
//! that point are always returned.

use std::collections::HashSet;

use tokio::time::Instant;

use crate::gather::{gather, GatherContext};
use crate::host::{Actuator, ContentTree, NodeHandle};
use crate::options::PaginationConfig;
use crate::patterns::NEXT_CONTROL_TEXT;
use crate::predicates;
use crate::result::{PaginationState, TerminationReason, Traversal};
use crate::url_utils::CanonicalUrl;
use crate::wait::{pause, resolve_selector, SelectorQuery, WaitResult};
use crate::{Error, Result};

/// Elements searched by the text fallback for a "next" control.
const TEXT_FALLBACK_SELECTOR: &str = "a, button, [role=\"button\"], input[type=\"button\"], input[type=\"submit\"]";

/// Label recorded when the traversal advanced by scrolling.
pub const SCROLL_LABEL: &str = "scroll";

/// How a round tried to reach more content.
enum Advance {
    Activated,
    NoControl,
    Failed(Error),
}

/// Run a traversal until a termination condition is met.
///
/// # Errors
///
/// Only errors that are not termination conditions propagate, namely
/// [`Error::BatchItemFailed`] from a gathering pass that probes with
/// `continue_on_error = false`. Cancellation ends the traversal normally with
/// [`TerminationReason::Cancelled`].
pub async fn traverse(
    ctx: &GatherContext<'_>,
    actuator: &dyn Actuator,
    config: &PaginationConfig,
) -> Result<Traversal> {
    let max_rounds = config.max_rounds.max(1);
    let mut state = PaginationState::default();
    let mut records = Vec::new();
    let mut seen: HashSet<CanonicalUrl> = HashSet::new();
    let mut actuation_error = None;

    let reason = loop {
        if ctx.cancel.is_cancelled() {
            break TerminationReason::Cancelled;
        }
        state.round_index += 1;

        let gathered = gather(ctx, &config.gather).await?;
        state.seen_container_count = gathered.stats.nodes_visited;

        let before = records.len();
        records.extend(
            gathered
                .records
                .into_iter()
                .filter(|r| seen.insert(r.canonical_url.clone())),
        );
        let fresh = records.len() - before;
        tracing::debug!(round = state.round_index, fresh, total = records.len(), "pagination round gathered");

        if fresh == 0 {
            break TerminationReason::NoNewRecords;
        }
        if state.round_index >= max_rounds {
            break TerminationReason::MaxRounds;
        }

        match advance(ctx, actuator, config, &mut state).await {
            Ok(Advance::Activated) => {}
            Ok(Advance::NoControl) => break TerminationReason::NoNextControl,
            Ok(Advance::Failed(err)) => {
                actuation_error = Some(err);
                break TerminationReason::ActuationFailed;
            }
            Err(Error::Cancelled) => break TerminationReason::Cancelled,
            Err(err) => return Err(err),
        }

        if let Err(Error::Cancelled) = settle(ctx.tree, config, ctx.cancel).await {
            break TerminationReason::Cancelled;
        }
    };

    tracing::info!(
        rounds = state.round_index,
        records = records.len(),
        reason = %reason,
        "pagination finished"
    );
    state.termination_reason = Some(reason);
    Ok(Traversal {
        records,
        state,
        actuation_error,
    })
}

async fn advance(
    ctx: &GatherContext<'_>,
    actuator: &dyn Actuator,
    config: &PaginationConfig,
    state: &mut PaginationState,
) -> Result<Advance> {
    if let Some((label, node)) = locate_next_control(ctx, config).await? {
        tracing::debug!(control = %label, "activating next control");
        let outcome = match actuator.activate(node).await {
            Ok(true) => Advance::Activated,
            Ok(false) => Advance::Failed(Error::ActuationFailed(format!("{label} was not activated"))),
            Err(err) => {
                tracing::warn!(error = %err, "next control activation failed");
                Advance::Failed(Error::ActuationFailed(format!("{label}: {err}")))
            }
        };
        state.last_control_selector_used = Some(label);
        return Ok(outcome);
    }

    if !config.allow_infinite_scroll {
        return Ok(Advance::NoControl);
    }

    match actuator.scroll_to_end().await {
        Ok(true) => {
            state.last_control_selector_used = Some(SCROLL_LABEL.to_string());
            Ok(Advance::Activated)
        }
        Ok(false) => Ok(Advance::NoControl),
        Err(err) => {
            tracing::warn!(error = %err, "scroll failed");
            Ok(Advance::Failed(Error::ActuationFailed(format!("{SCROLL_LABEL}: {err}"))))
        }
    }
}

/// The configured selectors first (visible and enabled), then the text fallback.
async fn locate_next_control(
    ctx: &GatherContext<'_>,
    config: &PaginationConfig,
) -> Result<Option<(String, NodeHandle)>> {
    let query = SelectorQuery::new(&config.next_selectors)
        .visible(true)
        .enabled(true);

    match resolve_selector(ctx.tree, &query, &config.control_wait, ctx.cancel).await {
        Ok(WaitResult::Found {
            matched_selector,
            elements,
            ..
        }) => {
            if let Some(&node) = elements.first() {
                return Ok(Some((matched_selector, node)));
            }
        }
        Ok(WaitResult::NotFound { .. }) | Err(Error::ResolutionTimeout { .. }) => {}
        Err(err) => return Err(err),
    }

    if config.use_text_fallback {
        return Ok(find_by_text(ctx.tree));
    }
    Ok(None)
}

/// First actionable element whose text reads like "next" / "load more".
#[must_use]
pub fn find_by_text(tree: &dyn ContentTree) -> Option<(String, NodeHandle)> {
    let nodes = tree.query_all(TEXT_FALLBACK_SELECTOR).ok()?;
    nodes.into_iter().find_map(|node| {
        let text = tree.text_content(node);
        let text = if text.trim().is_empty() {
            tree.attribute(node, "value").unwrap_or_default()
        } else {
            text
        };
        let text = text.trim();
        (NEXT_CONTROL_TEXT.is_match(text) && predicates::is_actionable(tree, node))
            .then(|| (format!("text:{text}"), node))
    })
}

/// Wait until the element count stops changing for `stable_polls` polls, or the
/// settle timeout passes.
async fn settle(
    tree: &dyn ContentTree,
    config: &PaginationConfig,
    cancel: &tokio_util::sync::CancellationToken,
) -> Result<()> {
    let deadline = Instant::now() + config.settle_timeout();
    let mut last = tree.elements().len();
    let mut stable = 0u32;

    while stable < config.stable_polls {
        if Instant::now() >= deadline {
            tracing::debug!("content did not settle before timeout");
            break;
        }
        pause(config.settle_interval(), cancel).await?;

        let current = tree.elements().len();
        if current == last {
            stable += 1;
        } else {
            stable = 0;
            last = current;
        }
    }
    Ok(())
}
