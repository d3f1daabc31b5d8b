//! Concrete model architectures.
//!
//! Classifiers and rewriters are wired to their roles in
//! `crate::models::registry`.

pub mod classifier;
pub mod t5;

pub use classifier::{rank_scores, ClassifierHeader, ScoreFunction, SequenceClassifier};
pub use t5::T5Rewriter;
