//! paperwatch science: source adapters, deduplication, classification and listing output.

pub mod aggregate;
pub mod classify;
pub mod dedup;
pub mod error;
pub mod formats;
pub mod http;
pub mod identifiers;
pub mod pipeline;
pub mod sources;
pub mod sync;

pub use aggregate::PaperAggregator;
pub use classify::{Classifier, DefaultClassifier, OpenAiClassifier, classify_or_default};
pub use dedup::{IdentitySet, is_duplicate, normalize_title};
pub use error::{FailureKind, Result, ScienceError};
pub use pipeline::{Pipeline, RunReport};
