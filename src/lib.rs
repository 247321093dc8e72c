use thiserror::Error;

pub type Result<T> = std::result::Result<T, InsightsError>;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dataset error: {0}")]
    Dataset(#[from] dataset::DatasetError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(
        "Invalid report type: {0}. Options: revenue_trends, cancellation_rate, top_locations, lead_time_distribution"
    )]
    UnknownReport(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Retrieval unavailable: {0}")]
    Retrieval(#[from] retrieval::RetrievalError),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<analytics::AnalyticsError> for InsightsError {
    #[inline]
    fn from(err: analytics::AnalyticsError) -> Self {
        match err {
            analytics::AnalyticsError::NoData(what) => Self::NoData(what),
            analytics::AnalyticsError::UnknownReport(name) => Self::UnknownReport(name),
            analytics::AnalyticsError::InvalidMonth(month) => {
                Self::InvalidQuery(format!("'{}' is not a month name", month))
            }
        }
    }
}

impl From<config::ConfigError> for InsightsError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod analytics;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod engine;
pub mod generator;
pub mod index;
pub mod retrieval;
