use std::collections::BTreeMap;

use itertools::Itertools;

use crate::example::{Toi, ToiDict};
use crate::similarity::toi_dominant_similarity;

/// Greedy row clustering: seed one cluster per element of the widest row,
/// then assign every remaining row's elements to clusters by repeatedly
/// taking the highest-similarity (cluster, element) pair among clusters not
/// yet served this row. Ties break on the first pair met in row-major scan,
/// so the result is deterministic for a deterministic similarity function.
///
/// An element may serve more than one cluster within a row; see
/// [`cluster_rows_exclusive`] for the bijective variant.
pub fn cluster_rows<F>(rows: &[Vec<String>], similarity: F) -> Vec<Vec<String>>
where
    F: Fn(&str, &str) -> f64,
{
    let Some(seed_idx) = widest_row(rows) else {
        return Vec::new();
    };
    let seed = &rows[seed_idx];
    let mut clusters: Vec<Vec<String>> = seed.iter().map(|s| vec![s.clone()]).collect();

    for (idx, row) in rows.iter().enumerate() {
        if idx == seed_idx {
            continue;
        }
        let mut sims: Vec<Vec<f64>> = seed
            .iter()
            .map(|rep| row.iter().map(|el| similarity(el, rep)).collect())
            .collect();
        for _ in 0..sims.len() {
            let (cluster, option) = arg_max(&sims);
            if let Some(element) = row.get(option) {
                clusters[cluster].push(element.clone());
            }
            sims[cluster].clear();
        }
    }
    clusters
}

/// Variant of [`cluster_rows`] that seeds from the narrowest row and consumes
/// each element once assigned: for rows of equal length the result is a
/// bijection between every row and the clusters.
pub fn cluster_rows_exclusive<F>(rows: &[Vec<String>], similarity: F) -> Vec<Vec<String>>
where
    F: Fn(&str, &str) -> f64,
{
    let Some(seed_idx) = narrowest_row(rows) else {
        return Vec::new();
    };
    let seed = &rows[seed_idx];
    let mut clusters: Vec<Vec<String>> = seed.iter().map(|s| vec![s.clone()]).collect();

    for (idx, row) in rows.iter().enumerate() {
        if idx == seed_idx {
            continue;
        }
        let mut remaining = row.clone();
        let mut sims: Vec<Vec<f64>> = seed
            .iter()
            .map(|rep| remaining.iter().map(|el| similarity(el, rep)).collect())
            .collect();
        for _ in 0..sims.len() {
            let (cluster, option) = arg_max(&sims);
            if option >= remaining.len() {
                break;
            }
            clusters[cluster].push(remaining.remove(option));
            for sim in sims.iter_mut() {
                if sim.len() > option {
                    sim.remove(option);
                }
            }
            sims[cluster].clear();
        }
    }
    clusters
}

/// Every combination taking one element from each row.
pub fn exhaustive_rows(rows: &[Vec<String>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().cloned())
        .multi_cartesian_product()
        .collect()
}

/// TOI-aware clustering over `(input, candidates)` rows. Before generic
/// clustering each row is filtered against its own resolved token of
/// interest so candidates overlapping the change region do not get clustered
/// as boilerplate; clustering then runs with the TOI-dominant similarity.
///
/// Only meaningful when every contributing input has a non-empty entry in
/// `tois`; rows without one pass through unfiltered.
pub fn cluster_rows_toi(rows: &[(String, Vec<String>)], tois: &ToiDict) -> Vec<Vec<String>> {
    let filtered: Vec<Vec<String>> = rows
        .iter()
        .map(|(input, elements)| match tois.get(input) {
            Some(toi) if !toi.is_empty() => filter_row(input, elements, toi),
            _ => elements.clone(),
        })
        .collect();
    cluster_rows(&filtered, |a, b| toi_dominant_similarity(a, b, tois))
}

/// One grouped few-shot query: for each input row, the first of its options
/// present in `cluster`.
pub fn grouped_query(
    cluster: &[String],
    options: &BTreeMap<String, Vec<String>>,
) -> Vec<(String, Option<String>)> {
    options
        .iter()
        .map(|(input, opts)| {
            let pick = opts.iter().find(|o| cluster.contains(*o)).cloned();
            (input.clone(), pick)
        })
        .collect()
}

/// Drop row elements that overlap the row's own TOI span, unless dropping
/// would separate two elements sharing a boundary with it; those are
/// retained as a pair.
fn filter_row(input: &str, elements: &[String], toi: &Toi) -> Vec<String> {
    let all_in_input = elements.iter().all(|el| input.contains(el.as_str()));
    let guarded = if all_in_input { toi.left() } else { toi.right() };
    let forward = forward_substrings(guarded);
    let backward = backward_substrings(guarded);

    let mut kept: Vec<String> = Vec::new();
    let mut suppressed: Option<&String> = None;
    for element in elements {
        let ends_with_right = element.ends_with(toi.right());
        let ends_with_left_inside = element.ends_with(toi.left())
            && !ends_with_right
            && toi.left().contains(element.as_str());
        if ends_with_right || ends_with_left_inside {
            kept.push(element.clone());
            suppressed = None;
        } else if !forward.iter().any(|s| element.ends_with(*s))
            && !backward.iter().any(|s| element.starts_with(*s))
        {
            if let Some(prev) = suppressed.take() {
                kept.push(prev.clone());
            }
            kept.push(element.clone());
        } else {
            suppressed = Some(element);
        }
    }
    if let Some(prev) = suppressed {
        if !prev.is_empty() {
            kept.push(prev.clone());
        }
    }
    kept
}

/// All prefixes of `s`, shortest first.
fn forward_substrings(s: &str) -> Vec<&str> {
    s.char_indices()
        .skip(1)
        .map(|(i, _)| &s[..i])
        .chain(if s.is_empty() { None } else { Some(s) })
        .collect()
}

/// All suffixes of `s`, longest first.
fn backward_substrings(s: &str) -> Vec<&str> {
    s.char_indices().map(|(i, _)| &s[i..]).collect()
}

fn widest_row(rows: &[Vec<String>]) -> Option<usize> {
    let width = rows.iter().map(Vec::len).max()?;
    rows.iter().position(|r| r.len() == width)
}

fn narrowest_row(rows: &[Vec<String>]) -> Option<usize> {
    let width = rows.iter().map(Vec::len).min()?;
    rows.iter().position(|r| r.len() == width)
}

/// Position of the largest value, first-encountered in row-major order.
fn arg_max(items: &[Vec<f64>]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut max = -1.0;
    for (i, row) in items.iter().enumerate() {
        for (j, &value) in row.iter().enumerate() {
            if value > max {
                best = (i, j);
                max = value;
            }
        }
    }
    best
}
