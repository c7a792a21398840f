pub mod schema;

pub use schema::{
    ConcurrencyConfig, Config, ConsistencyThresholds, ObservabilityConfig, OracleConfig,
    ScoringConfig,
};
