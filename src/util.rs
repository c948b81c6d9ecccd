//! Small helpers shared across the pipeline.

pub mod levenshtein;
pub mod timer;
