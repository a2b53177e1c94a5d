use once_cell::sync::Lazy;
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::example::ToiDict;

/// Token classes counted when comparing strings structurally: word shapes,
/// grouped numbers, and the individual separator symbols.
static TOKEN_CLASSES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b\p{Lu}\p{Ll}+\b",                   // Capitalized word
        r"\b\p{Ll}+\b",                         // Lowercase word
        r"\b\p{Lu}\p{Lu}+\b",                   // Uppercase word
        r"\b[0-9]+(,[0-9]{3})*(\.[0-9]+)?\b",   // Number
        r" ",
        r"\t",
        r",",
        r"\.",
        r":",
        r";",
        r"!",
        r"\)",
        r"\(",
        "\"",
        r"'",
        r"/",
        r"\\",
        r"-",
        r"\*",
        r"\+",
        r"_",
        r"=",
        r">",
        r"<",
        r"\]",
        r"\[",
        r"\}",
        r"\{",
        r"\|",
        r"&",
        r"#",
        r"\$",
        r"\^",
        r"@",
        r"%",
        r"\?",
        r"~",
        r"`",
        "\u{2192}",
        "\u{2190}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("token class pattern"))
    .collect()
});

static LOWERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Ll}").expect("lowercase pattern"));
static UPPERCASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Lu}").expect("uppercase pattern"));
static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("digit pattern"));

/// Similarity between strings by counting token-class occurrences and
/// comparing the count vectors by cosine. Two all-zero vectors are maximally
/// similar; one zero and one non-zero vector are minimally similar.
pub fn token_count_similarity(a: &str, b: &str) -> f64 {
    count_cosine(&class_counts(a), &class_counts(b))
}

/// Similarity that lets resolved tokens of interest dominate: strings that
/// both terminate in a resolved token compare as more similar than any
/// structural match, keeping change regions out of boilerplate clusters.
pub fn toi_dominant_similarity(a: &str, b: &str, tois: &ToiDict) -> f64 {
    const DOMINANT: f64 = 2.0;

    let lefts: Vec<&str> = tois
        .values()
        .map(|t| t.left())
        .filter(|s| !s.is_empty())
        .collect();
    let rights: Vec<&str> = tois
        .values()
        .map(|t| t.right())
        .filter(|s| !s.is_empty())
        .collect();

    let ends_right = |s: &str| rights.iter().any(|r| s.ends_with(r));
    let ends_left = |s: &str| lefts.iter().any(|l| s.ends_with(l));

    if ends_right(a) && ends_right(b) {
        return DOMINANT;
    }
    if ends_left(a) && !ends_right(a) && ends_left(b) && !ends_right(b) {
        return DOMINANT;
    }
    if lefts.iter().any(|l| a == *l) && lefts.iter().any(|l| b == *l) {
        return DOMINANT * DOMINANT;
    }
    token_count_similarity(a, b)
}

/// Normalized edit similarity over a coarsened alphabet: lowercase letters
/// collapse to `a`, uppercase to `A`, digits to `0`.
pub fn character_edit_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&characterize(a), &characterize(b))
}

pub fn characterize(s: &str) -> String {
    let lowered = LOWERCASE.replace_all(s, "a");
    let uppered = UPPERCASE.replace_all(&lowered, "A");
    DIGIT.replace_all(&uppered, "0").into_owned()
}

/// Cosine similarity between embedding vectors; zero-norm inputs score 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

fn class_counts(s: &str) -> Vec<f64> {
    TOKEN_CLASSES
        .iter()
        .map(|re| re.find_iter(s).count() as f64)
        .collect()
}

fn count_cosine(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 {
        return if b_norm == 0.0 { 1.0 } else { 0.0 };
    }
    if b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::Toi;

    #[test]
    fn identical_shape_is_maximal() {
        assert!((token_count_similarity("Total: 42", "Count: 17") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_vector_conventions() {
        // neither string matches any token class
        assert_eq!(token_count_similarity("", ""), 1.0);
        // one matches, the other does not
        assert_eq!(token_count_similarity("abc", ""), 0.0);
    }

    #[test]
    fn disjoint_shapes_score_zero() {
        assert_eq!(token_count_similarity("abc", "42"), 0.0);
    }

    #[test]
    fn characterize_collapses_alphabet() {
        assert_eq!(characterize("Ab3 x"), "Aa0 a");
        assert_eq!(characterize("ID-42"), "AA-00");
    }

    #[test]
    fn edit_similarity_sees_shape_not_letters() {
        assert!((character_edit_similarity("Foo42", "Bar17") - 1.0).abs() < 1e-9);
        assert!(character_edit_similarity("Foo42", "foo") < 1.0);
    }

    #[test]
    fn toi_endings_dominate() {
        let mut tois = ToiDict::new();
        tois.insert("k".into(), Toi::new("Total:", "sum"));

        assert_eq!(toi_dominant_similarity("the sum", "a sum", &tois), 2.0);
        assert_eq!(
            toi_dominant_similarity("Grand Total:", "Sub Total:", &tois),
            2.0
        );
        // equality is shadowed by the ends-with check when neither side
        // terminates in a right token
        assert_eq!(toi_dominant_similarity("Total:", "Total:", &tois), 2.0);
    }

    #[test]
    fn equal_left_tokens_score_doubly_dominant() {
        let mut tois = ToiDict::new();
        tois.insert("k1".into(), Toi::new("total sum", "sum"));
        tois.insert("k2".into(), Toi::new("Count:", "num"));

        // "total sum" ends with a right token, so the ends-with rules pass
        // over it, and both strings equal resolved left tokens
        assert_eq!(toi_dominant_similarity("total sum", "Count:", &tois), 4.0);
    }

    #[test]
    fn toi_fallback_is_token_count() {
        let tois = ToiDict::new();
        let plain = toi_dominant_similarity("abc", "xyz", &tois);
        assert_eq!(plain, token_count_similarity("abc", "xyz"));
    }

    #[test]
    fn cosine_zero_norm_guard() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
