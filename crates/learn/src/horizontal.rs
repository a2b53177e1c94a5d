use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use spanlearn_core::{cosine, extract_diff, Toi};
use spanlearn_embed::EmbeddingEngine;

use crate::config::LearnConfig;
use crate::error::Result;

/// Embeddings of tokens of interest seen so far, keyed `"left right"`.
pub type ObservedTois = FxHashMap<String, Vec<f32>>;

/// A token-of-interest candidate with its similarity score against the
/// observed-TOI set at the time it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub toi: Toi,
    pub score: f32,
}

impl Candidate {
    pub fn sentinel() -> Self {
        Self {
            toi: Toi::empty(),
            score: 0.0,
        }
    }
}

/// Strings made up entirely of symbols: no letters, digits, whitespace,
/// commas or dots.
static SYMBOLS_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^a-zA-Z0-9\s,.]*$").expect("symbols pattern"));
/// A token of digits, commas and hyphens.
static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9\s,\- ]*$").expect("numeric pattern"));
static STRIP_SYMBOLS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9+\- ]").expect("strip pattern"));
static STRIP_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("non-word pattern"));

/// Scores below this are treated as provider noise when seeding.
const MIN_PAIR_SCORE: f32 = 1e-5;

/// Per-example TOI candidates: seed on the most dissimilar cross pair of
/// diff words, then greedily widen in all four directions while embedding
/// similarity against the opposite side keeps improving. Returns the top
/// candidates (best first) and the observed-TOI set extended with their
/// embeddings.
///
/// Degenerate diffs yield the single sentinel candidate and leave the
/// observed set untouched.
pub fn generate_candidates(
    left: &str,
    right: &str,
    mut observed: ObservedTois,
    engine: &mut EmbeddingEngine,
    config: &LearnConfig,
) -> Result<(Vec<Candidate>, ObservedTois)> {
    let diff = extract_diff(left, right);
    let (lsub, rsub) = (diff.left.as_str(), diff.right.as_str());

    if lsub.is_empty()
        || rsub.is_empty()
        || SYMBOLS_ONLY.is_match(lsub)
        || SYMBOLS_ONLY.is_match(rsub)
        || is_numeric(&strip_symbols(lsub))
        || is_numeric(&strip_symbols(rsub))
        || strip_symbols(lsub) == rsub
        || strip_symbols(rsub) == lsub
    {
        tracing::debug!(lsub, rsub, "degenerate diff, returning the sentinel");
        return Ok((vec![Candidate::sentinel()], observed));
    }

    let left_words = engine.word_embeddings(lsub)?;
    let right_words = engine.word_embeddings(rsub)?;

    // insertion-ordered so ranking ties stay deterministic
    let mut candidates: Vec<(Toi, f32)> = Vec::new();
    let seed_score = observed_average(engine, &observed, &Toi::new(lsub, rsub).joined())?;
    record(&mut candidates, Toi::new(lsub, rsub), seed_score);

    // the most dissimilar cross pair seeds the search
    let mut best_score = 2.0f32;
    let mut curr_left = first_token(left).to_string();
    let mut curr_right = first_token(right).to_string();
    for i in lsub.split_whitespace() {
        for j in rsub.split_whitespace() {
            if strip_non_word(i) == strip_non_word(j) {
                continue;
            }
            let left_emb = match left_words.get(i) {
                Some(v) => v.clone(),
                None => engine.embed(i)?,
            };
            let right_emb = match right_words.get(j) {
                Some(v) => v.clone(),
                None => engine.embed(j)?,
            };
            let mut score = cosine(&left_emb, &right_emb);
            if config.is_stop_word(i) || config.is_stop_word(j) {
                score *= config.stopword_penalty;
            }
            if score > MIN_PAIR_SCORE && score < best_score {
                best_score = score;
                curr_left = i.to_string();
                curr_right = j.to_string();
            }
        }
    }

    let mut curr_left_emb = engine.embed(&curr_left)?;
    let mut curr_right_emb = engine.embed(&curr_right)?;
    let score = expansion_score(engine, &observed, &join(&curr_left, &curr_right))?;
    record(&mut candidates, Toi::new(curr_left.as_str(), curr_right.as_str()), score);

    let left_tokens: Vec<&str> = left.split_whitespace().collect();
    let right_tokens: Vec<&str> = right.split_whitespace().collect();

    let mut left_grew_left = false;
    let mut left_grew_right = false;
    let mut right_grew_left = false;
    let mut right_grew_right = false;
    loop {
        if !left_grew_left {
            if left.starts_with(&curr_left) {
                left_grew_left = true;
                continue;
            }
            let idx = previous_index(&left_tokens, first_token(&curr_left));
            if idx == 0 {
                left_grew_left = true;
                continue;
            }
            let added = left_tokens[idx];
            let widened = join(added, &curr_left);
            let widened_emb = engine.embed(&widened)?;
            let mut score = cosine(&widened_emb, &curr_right_emb);
            if config.is_stop_word(added) {
                score *= config.stopword_penalty;
            }
            if score < best_score {
                best_score = score;
                curr_left_emb = widened_emb;
                curr_left = widened;
                let score = expansion_score(engine, &observed, &join(&curr_left, &curr_right))?;
                record(&mut candidates, Toi::new(curr_left.as_str(), curr_right.as_str()), score);
            } else {
                left_grew_left = true;
            }
        }
        if !left_grew_right {
            if left.ends_with(&curr_left) {
                left_grew_right = true;
                continue;
            }
            let Some(added) = next_token(&left_tokens, last_token(&curr_left)) else {
                left_grew_right = true;
                continue;
            };
            let widened = join(&curr_left, added);
            let widened_emb = engine.embed(&widened)?;
            let mut score = cosine(&widened_emb, &curr_right_emb);
            if config.is_stop_word(added) {
                score *= config.stopword_penalty;
            }
            if score < best_score {
                best_score = score;
                curr_left_emb = widened_emb;
                curr_left = widened;
                let score = expansion_score(engine, &observed, &join(&curr_left, &curr_right))?;
                record(&mut candidates, Toi::new(curr_left.as_str(), curr_right.as_str()), score);
            } else {
                left_grew_right = true;
            }
        }
        if !right_grew_left {
            if right.starts_with(&curr_right) {
                right_grew_left = true;
                continue;
            }
            let idx = previous_index(&right_tokens, first_token(&curr_right));
            if idx == 0 {
                right_grew_left = true;
                continue;
            }
            let added = right_tokens[idx];
            let widened = join(added, &curr_right);
            let widened_emb = engine.embed(&widened)?;
            let mut score = cosine(&widened_emb, &curr_left_emb);
            if config.is_stop_word(added) {
                score *= config.stopword_penalty;
            }
            if score < best_score {
                best_score = score;
                curr_right_emb = widened_emb;
                curr_right = widened;
                let score = expansion_score(engine, &observed, &join(&curr_left, &curr_right))?;
                record(&mut candidates, Toi::new(curr_left.as_str(), curr_right.as_str()), score);
            } else {
                right_grew_left = true;
            }
        }
        if !right_grew_right {
            if right.ends_with(&curr_right) {
                right_grew_right = true;
                continue;
            }
            let Some(added) = next_token(&right_tokens, last_token(&curr_right)) else {
                right_grew_right = true;
                continue;
            };
            let widened = join(&curr_right, added);
            let widened_emb = engine.embed(&widened)?;
            let mut score = cosine(&widened_emb, &curr_left_emb);
            if config.is_stop_word(added) {
                score *= config.stopword_penalty;
            }
            if score < best_score {
                best_score = score;
                curr_right_emb = widened_emb;
                curr_right = widened;
                let score = expansion_score(engine, &observed, &join(&curr_left, &curr_right))?;
                record(&mut candidates, Toi::new(curr_left.as_str(), curr_right.as_str()), score);
            } else {
                right_grew_right = true;
            }
        }
        if left_grew_left && left_grew_right && right_grew_left && right_grew_right {
            break;
        }
    }

    candidates.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.total_len().cmp(&a.0.total_len()))
    });
    candidates.truncate(config.max_candidates);

    for (toi, _) in &candidates {
        let key = toi.joined();
        let vector = engine.embed(&key)?;
        observed.insert(key, vector);
    }

    let ranked = candidates
        .into_iter()
        .map(|(toi, score)| Candidate { toi, score })
        .collect();
    Ok((ranked, observed))
}

/// Average cosine similarity of `key`'s embedding against the observed set;
/// 0 when nothing has been observed yet.
fn observed_average(
    engine: &mut EmbeddingEngine,
    observed: &ObservedTois,
    key: &str,
) -> Result<f32> {
    let embedding = engine.embed(key)?;
    if observed.is_empty() {
        return Ok(0.0);
    }
    let sum: f32 = observed.values().map(|v| cosine(&embedding, v)).sum();
    Ok(sum / observed.len() as f32)
}

/// Widenings score 1 until something has been observed.
fn expansion_score(
    engine: &mut EmbeddingEngine,
    observed: &ObservedTois,
    key: &str,
) -> Result<f32> {
    if observed.is_empty() {
        return Ok(1.0);
    }
    observed_average(engine, observed, key)
}

fn record(candidates: &mut Vec<(Toi, f32)>, toi: Toi, score: f32) {
    if let Some(entry) = candidates.iter_mut().find(|(t, _)| *t == toi) {
        entry.1 = score;
    } else {
        candidates.push((toi, score));
    }
}

fn is_numeric(s: &str) -> bool {
    let mut tokens = s.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return true;
    }
    tokens.any(|t| NUMERIC_TOKEN.is_match(t))
}

fn strip_symbols(s: &str) -> String {
    STRIP_SYMBOLS.replace_all(s, "").into_owned()
}

fn strip_non_word(s: &str) -> String {
    STRIP_NON_WORD.replace_all(s, "").into_owned()
}

fn join(a: &str, b: &str) -> String {
    format!("{a} {b}")
}

fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or_default()
}

fn last_token(s: &str) -> &str {
    s.split_whitespace().last().unwrap_or_default()
}

/// Index of the token before `word`'s first occurrence; 0 when `word` is
/// missing or already first, which callers treat as exhaustion.
fn previous_index(tokens: &[&str], word: &str) -> usize {
    match tokens.iter().position(|t| *t == word) {
        Some(idx) if idx > 0 => idx - 1,
        _ => 0,
    }
}

/// Token after `word`'s first occurrence. A missing `word` falls back to the
/// leading token, the historical default.
fn next_token<'a>(tokens: &[&'a str], word: &str) -> Option<&'a str> {
    let idx = match tokens.iter().position(|t| *t == word) {
        Some(idx) => idx + 1,
        None => 0,
    };
    tokens.get(idx).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(left: &str, right: &str) -> Vec<Candidate> {
        let mut engine = EmbeddingEngine::offline();
        let config = LearnConfig::default();
        let (candidates, _) =
            generate_candidates(left, right, ObservedTois::default(), &mut engine, &config)
                .unwrap();
        candidates
    }

    fn assert_sentinel(candidates: &[Candidate]) {
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].toi.is_empty());
    }

    #[test]
    fn empty_diff_side_yields_sentinel() {
        // identical strings diff to ("", "")
        assert_sentinel(&run("same text", "same text"));
    }

    #[test]
    fn numeric_diff_yields_sentinel() {
        // "Item #42" vs "42" diffs to the whole strings, and "42" is numeric
        assert_sentinel(&run("Item #42", "42"));
    }

    #[test]
    fn symbols_only_diff_yields_sentinel() {
        assert_sentinel(&run("--- >>>", "### <<<"));
    }

    #[test]
    fn vacuous_diff_yields_sentinel() {
        // sides equal after stripping non-alphanumerics
        assert_sentinel(&run("(alpha)", "alpha"));
    }

    #[test]
    fn plain_rewrite_produces_candidates() {
        let candidates = run("served", "fresh");
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 3);
        assert!(candidates.iter().any(|c| !c.toi.is_empty()));
        assert!(candidates
            .iter()
            .any(|c| c.toi == Toi::new("served", "fresh")));
    }

    #[test]
    fn at_most_three_candidates_survive() {
        let candidates = run(
            "the quick brown fox jumps over fences",
            "ein schneller brauner fuchs springt",
        );
        assert!(candidates.len() <= 3);
    }

    #[test]
    fn observed_set_gains_returned_candidates() {
        let mut engine = EmbeddingEngine::offline();
        let config = LearnConfig::default();
        let (candidates, observed) = generate_candidates(
            "served",
            "fresh",
            ObservedTois::default(),
            &mut engine,
            &config,
        )
        .unwrap();
        for candidate in &candidates {
            assert!(observed.contains_key(&candidate.toi.joined()));
        }
    }

    #[test]
    fn numeric_check_covers_tokens() {
        assert!(is_numeric("42"));
        assert!(is_numeric("1,200"));
        assert!(is_numeric(""));
        assert!(is_numeric("total 42"));
        assert!(!is_numeric("total"));
    }

    #[test]
    fn strip_symbols_keeps_alphanumerics() {
        assert_eq!(strip_symbols("(alpha)"), "alpha");
        assert_eq!(strip_symbols("a+b-c."), "a+b-c");
    }
}
