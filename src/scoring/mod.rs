pub mod aggregator;
pub mod dimensions;
pub mod fallback;
pub mod oracle_scorer;
pub mod traits;

pub use aggregator::ScoringAggregator;
pub use dimensions::{Dimension, DimensionScores, ScoringWeights};
pub use fallback::LocalAestheticScorer;
pub use oracle_scorer::OracleScorer;
pub use traits::Scorer;
