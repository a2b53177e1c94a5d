mod config;
mod error;
mod horizontal;
mod pass;
mod store;
mod vertical;

pub use config::LearnConfig;
pub use error::{LearnError, Result};
pub use horizontal::{generate_candidates, Candidate, ObservedTois};
pub use pass::learn_tois;
pub use store::ToiStore;
pub use vertical::resolve;
