// Scoring — corpus-wide keyword weights, per-company posture scores, fixed
// keyword frequencies and year summaries.
//
// Everything here is a pure function of one year's data; the pipeline module
// loads the inputs from the database and persists the outputs.

pub mod frequency;
pub mod posture;
pub mod summary;
pub mod tfidf;

pub use posture::{score_year, PostureWeights};
pub use tfidf::TfIdfEngine;
