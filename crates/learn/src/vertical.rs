use std::collections::BTreeMap;

use itertools::Itertools;

use spanlearn_core::{cosine, Toi, ToiDict};
use spanlearn_embed::EmbeddingEngine;

use crate::error::Result;
use crate::horizontal::{Candidate, ObservedTois};

/// Cross-example consistency resolution: pick one candidate per example so
/// that the summed pairwise embedding similarity between all picks is
/// maximal.
///
/// Examples whose candidates are all the sentinel resolve to the sentinel;
/// an example contributing no candidates at all resolves to the sentinel and
/// is left out of the cross-product. Iteration is in sorted-input order, so
/// the result does not depend on how the caller assembled the map and ties
/// break deterministically.
pub fn resolve(
    candidates: &BTreeMap<String, Vec<Candidate>>,
    observed: &mut ObservedTois,
    engine: &mut EmbeddingEngine,
) -> Result<ToiDict> {
    let mut resolved = ToiDict::new();

    if candidates
        .values()
        .all(|list| list.iter().all(|c| c.toi.is_empty()))
    {
        for input in candidates.keys() {
            resolved.insert(input.clone(), Toi::empty());
        }
        return Ok(resolved);
    }

    for (input, list) in candidates {
        if list.is_empty() {
            tracing::debug!(input = %input, "no candidates, resolving to the sentinel");
            resolved.insert(input.clone(), Toi::empty());
        }
    }
    let contributing: Vec<(&String, &Vec<Candidate>)> = candidates
        .iter()
        .filter(|(_, list)| !list.is_empty())
        .collect();

    if contributing.len() == 1 {
        let (input, list) = contributing[0];
        if let Some(best) = longest_candidate(list) {
            resolved.insert(input.clone(), best.toi.clone());
        }
        return Ok(resolved);
    }

    let mut best_sum = f32::NEG_INFINITY;
    let mut best_assignment: Option<Vec<&Candidate>> = None;
    for assignment in contributing
        .iter()
        .map(|(_, list)| list.iter())
        .multi_cartesian_product()
    {
        let mut sum = 0.0f32;
        for pair in assignment.iter().combinations(2) {
            let (a, b) = (&pair[0].toi, &pair[1].toi);
            if a.is_empty() && b.is_empty() {
                continue;
            }
            let emb_a = observed_embedding(observed, engine, &a.joined())?;
            let emb_b = observed_embedding(observed, engine, &b.joined())?;
            sum += cosine(&emb_a, &emb_b);
        }
        if sum > best_sum {
            best_sum = sum;
            best_assignment = Some(assignment);
        }
    }

    if let Some(picks) = best_assignment {
        for ((input, _), pick) in contributing.iter().zip(picks) {
            resolved.insert((*input).clone(), pick.toi.clone());
        }
    }
    Ok(resolved)
}

/// First candidate with the largest combined token length.
fn longest_candidate(list: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for candidate in list {
        match best {
            Some(current) if candidate.toi.total_len() <= current.toi.total_len() => {}
            _ => best = Some(candidate),
        }
    }
    best
}

fn observed_embedding(
    observed: &mut ObservedTois,
    engine: &mut EmbeddingEngine,
    key: &str,
) -> Result<Vec<f32>> {
    if let Some(hit) = observed.get(key) {
        return Ok(hit.clone());
    }
    let vector = engine.embed(key)?;
    observed.insert(key.to_string(), vector.clone());
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(left: &str, right: &str, score: f32) -> Candidate {
        Candidate {
            toi: Toi::new(left, right),
            score,
        }
    }

    #[test]
    fn all_sentinels_resolve_to_sentinels() {
        let mut candidates = BTreeMap::new();
        candidates.insert("in1".to_string(), vec![Candidate::sentinel()]);
        candidates.insert("in2".to_string(), vec![Candidate::sentinel()]);

        let mut engine = EmbeddingEngine::offline();
        let mut observed = ObservedTois::default();
        let resolved = resolve(&candidates, &mut observed, &mut engine).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.values().all(Toi::is_empty));
    }

    #[test]
    fn single_example_takes_the_longest_candidate() {
        let mut candidates = BTreeMap::new();
        candidates.insert(
            "in1".to_string(),
            vec![candidate("a", "b", 1.0), candidate("long left", "side", 0.5)],
        );

        let mut engine = EmbeddingEngine::offline();
        let mut observed = ObservedTois::default();
        let resolved = resolve(&candidates, &mut observed, &mut engine).unwrap();
        assert_eq!(resolved["in1"], Toi::new("long left", "side"));
    }

    #[test]
    fn empty_candidate_list_resolves_to_sentinel() {
        let mut candidates = BTreeMap::new();
        candidates.insert("none".to_string(), Vec::new());
        candidates.insert(
            "one".to_string(),
            vec![candidate("served", "fresh", 1.0)],
        );

        let mut engine = EmbeddingEngine::offline();
        let mut observed = ObservedTois::default();
        let resolved = resolve(&candidates, &mut observed, &mut engine).unwrap();
        assert!(resolved["none"].is_empty());
        assert_eq!(resolved["one"], Toi::new("served", "fresh"));
    }

    #[test]
    fn mutually_similar_picks_win() {
        // both examples offer the shared pick and a decoy; the shared picks
        // embed identically, so the maximizing assignment selects them
        let mut candidates = BTreeMap::new();
        candidates.insert(
            "in1".to_string(),
            vec![candidate("served", "fresh", 1.0), candidate("zq", "xv", 1.0)],
        );
        candidates.insert(
            "in2".to_string(),
            vec![candidate("served", "fresh", 1.0), candidate("mm", "kk", 1.0)],
        );

        let mut engine = EmbeddingEngine::offline();
        let mut observed = ObservedTois::default();
        let resolved = resolve(&candidates, &mut observed, &mut engine).unwrap();
        assert_eq!(resolved["in1"], Toi::new("served", "fresh"));
        assert_eq!(resolved["in2"], Toi::new("served", "fresh"));
    }

    #[test]
    fn resolution_ignores_map_assembly_order() {
        let mut forward = BTreeMap::new();
        forward.insert("a".to_string(), vec![candidate("x", "y", 1.0)]);
        forward.insert("b".to_string(), vec![candidate("p", "q", 1.0)]);

        let mut backward = BTreeMap::new();
        backward.insert("b".to_string(), vec![candidate("p", "q", 1.0)]);
        backward.insert("a".to_string(), vec![candidate("x", "y", 1.0)]);

        let mut engine = EmbeddingEngine::offline();
        let mut obs1 = ObservedTois::default();
        let mut obs2 = ObservedTois::default();
        let first = resolve(&forward, &mut obs1, &mut engine).unwrap();
        let second = resolve(&backward, &mut obs2, &mut engine).unwrap();
        assert_eq!(first, second);
    }
}
