use std::collections::BTreeMap;

use spanlearn_core::{extract_diff, DiffPair, Example, ToiDict};
use spanlearn_embed::EmbeddingEngine;

use crate::config::LearnConfig;
use crate::error::Result;
use crate::horizontal::{generate_candidates, Candidate, ObservedTois};
use crate::store::ToiStore;
use crate::vertical::resolve;

/// One learning pass over a set of examples: strip the syntactic context
/// from each pair, generate per-example candidates horizontally, resolve
/// them vertically across examples, then checkpoint the TOI store and the
/// embedding cache.
///
/// Returns the tokens of interest resolved in this pass, keyed by input.
/// Duplicate inputs keep the last example's diff.
pub fn learn_tois(
    examples: &[Example],
    engine: &mut EmbeddingEngine,
    store: &mut ToiStore,
    config: &LearnConfig,
) -> Result<ToiDict> {
    let mut diffs: BTreeMap<String, DiffPair> = BTreeMap::new();
    for example in examples {
        diffs.insert(
            example.input.clone(),
            extract_diff(&example.input, &example.output),
        );
    }

    let mut observed = ObservedTois::default();
    let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
    for (input, diff) in &diffs {
        let (ranked, next) =
            generate_candidates(&diff.left, &diff.right, observed, engine, config)?;
        tracing::debug!(input = %input, count = ranked.len(), "horizontal candidates");
        observed = next;
        candidates.insert(input.clone(), ranked);
    }

    let resolved = resolve(&candidates, &mut observed, engine)?;
    tracing::debug!(count = resolved.len(), "vertical resolution complete");

    store.merge(resolved.clone());
    store.flush()?;
    engine.flush()?;
    Ok(resolved)
}
