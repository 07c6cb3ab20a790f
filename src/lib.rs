pub mod align;
pub mod config;
pub mod error;
pub mod filters;
pub mod grid;
pub mod hours;
pub mod pipeline;
pub mod reducers;
pub mod report;
pub mod safety;
pub mod series;
pub mod stats;
pub mod summary;
pub mod traits;

pub use config::EngineConfig;
pub use error::{BasalError, Result};
pub use pipeline::Recommender;
pub use reducers::Strategy;
pub use report::{JsonReportProvider, Report};
pub use summary::RecommendationSummary;
