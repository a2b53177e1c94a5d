mod cluster;
mod diff;
mod example;
mod similarity;

pub use cluster::{
    cluster_rows, cluster_rows_exclusive, cluster_rows_toi, exhaustive_rows, grouped_query,
};
pub use diff::{anchor_runs, extract_diff, extract_diffs};
pub use example::{DiffPair, Example, Toi, ToiDict};
pub use similarity::{
    character_edit_similarity, characterize, cosine, toi_dominant_similarity,
    token_count_similarity,
};
