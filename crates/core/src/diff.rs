use crate::example::DiffPair;

/// Common-substring anchors between `left` and `right`.
///
/// Whitespace tokens of `left` that are prefixes of some token of `right`
/// (order preserved, duplicates removed) are greedily joined into maximal
/// runs that remain verified contiguous substrings of both strings; a new
/// run starts whenever extension breaks containment. The trailing run is
/// kept only when it sits on a word boundary in both strings.
pub fn anchor_runs(left: &str, right: &str) -> Vec<String> {
    let left_tokens: Vec<&str> = left.split_whitespace().collect();
    let right_tokens: Vec<&str> = right.split_whitespace().collect();

    let mut prefix_tokens: Vec<&str> = Vec::new();
    for &tok in &left_tokens {
        if right_tokens.iter().any(|r| r.starts_with(tok)) && !prefix_tokens.contains(&tok) {
            prefix_tokens.push(tok);
        }
    }

    let mut runs: Vec<String> = Vec::new();
    let mut current = String::new();
    for tok in &prefix_tokens {
        if current.is_empty() {
            current = (*tok).to_string();
        } else {
            current = format!("{current} {tok}");
        }
        if !left.contains(&current) || !right.contains(&current) {
            let words: Vec<&str> = current.split(' ').collect();
            let kept = words[..words.len() - 1].join(" ");
            if !kept.is_empty() {
                runs.push(kept);
            }
            current = (*tok).to_string();
        }
    }
    if !current.is_empty()
        && left.contains(&current)
        && right.contains(&current)
        && !runs.contains(&current)
        && starts_on_word_boundary(left, &current)
        && starts_on_word_boundary(right, &current)
    {
        runs.push(current);
    }
    runs
}

/// Flanking diff regions between `left` and `right`, one `DiffPair` per gap.
///
/// With no anchors the whole strings are the diff. With a single anchor run
/// the diffs are the prefixes before it (the run anchored at the start of
/// `right` leaves the right side empty). With two or more runs, each
/// consecutive run pair contributes the region between them in both strings,
/// including the boundary words the runs share, yielding parallel ordered
/// diff lists.
pub fn extract_diffs(left: &str, right: &str) -> Vec<DiffPair> {
    if left == right {
        return vec![DiffPair::default()];
    }
    let runs = anchor_runs(left, right);
    if runs.is_empty() {
        return vec![DiffPair::new(left, right)];
    }
    if runs.len() == 1 {
        let run = runs[0].as_str();
        let at = right.find(run).unwrap_or(0);
        if at > 0 {
            let left_diff = if left.split_whitespace().count() == 1 {
                left.to_string()
            } else {
                prefix_before(left, run)
            };
            return vec![DiffPair::new(left_diff, prefix_before_at(right, at))];
        }
        return vec![DiffPair::new(prefix_before(left, run), "")];
    }
    let mut pairs = Vec::with_capacity(runs.len() - 1);
    for window in runs.windows(2) {
        let (run, next) = (window[0].as_str(), window[1].as_str());
        pairs.push(DiffPair::new(
            between_runs(left, run, next),
            between_runs(right, run, next),
        ));
    }
    pairs
}

/// First diff pair; the learning pass only consumes the leading gap.
pub fn extract_diff(left: &str, right: &str) -> DiffPair {
    extract_diffs(left, right).into_iter().next().unwrap_or_default()
}

fn prefix_before(s: &str, run: &str) -> String {
    // A missing run defaults to position 0. This silently yields an empty
    // diff when the anchor cannot be located; kept for compatibility.
    let idx = s.find(run).unwrap_or(0);
    prefix_before_at(s, idx)
}

fn prefix_before_at(s: &str, idx: usize) -> String {
    s[..clamp_boundary(s, idx)].trim().to_string()
}

/// Region of `s` spanning the last word of `run` through the first word of
/// `next`. Missing anchors default to position 0 and the span is clamped to
/// stay within `s`; both defaults can misalign the region, matching the
/// historical behavior.
fn between_runs(s: &str, run: &str, next: &str) -> String {
    let base = s.find(run).unwrap_or(0);
    let lo = clamp_boundary(s, base + run.len() - last_word_chunk(run).len());
    let hi = match s[lo..].find(next) {
        Some(pos) => lo + pos + first_word_chunk(next).len(),
        None => first_word_chunk(next).len(),
    };
    let hi = clamp_boundary(s, hi.max(lo));
    s[lo..hi].trim().to_string()
}

fn starts_on_word_boundary(haystack: &str, needle: &str) -> bool {
    match haystack.find(needle) {
        Some(0) => true,
        Some(idx) => haystack[..idx].ends_with(' '),
        None => false,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn first_word_chunk(s: &str) -> &str {
    let end = s.find(|c| !is_word_char(c)).unwrap_or(s.len());
    &s[..end]
}

fn last_word_chunk(s: &str) -> &str {
    let start = s.rfind(|c| !is_word_char(c)).map(|i| {
        // step past the non-word character
        i + s[i..].chars().next().map_or(1, char::len_utf8)
    });
    &s[start.unwrap_or(0)..]
}

fn clamp_boundary(s: &str, idx: usize) -> usize {
    let mut idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
