// Query engine
// Routes each question to analytics or to retrieval plus generation


use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analytics::{self, Report, ReportType};
use crate::classifier::{self, Intent, MonthYear};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::embeddings::OllamaClient;
use crate::generator::AnswerGenerator;
use crate::index::{self, PassageIndex, UnavailableIndex};
use crate::retrieval::{DEFAULT_TOP_K, Retriever};
use crate::{InsightsError, Result};

/// Exactly one of a structured report or generated text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    Report(Report),
    Text { answer: String },
}

impl Answer {
    #[inline]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

/// Answers questions against a read-only dataset and passage index.
///
/// Shared freely between concurrent callers; nothing is mutated after
/// construction apart from the retriever's one-time encoder setup.
#[derive(Debug)]
pub struct QueryEngine {
    dataset: Arc<Dataset>,
    retriever: Retriever,
    generator: AnswerGenerator,
    top_k: usize,
}

impl QueryEngine {
    #[inline]
    pub fn new(dataset: Arc<Dataset>, retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            dataset,
            retriever,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Load the dataset and open the index named by `config`.
    ///
    /// A missing index does not prevent startup; open-ended questions then
    /// fail with a retrieval error.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let dataset_path = config.dataset_path();
        let dataset = tokio::task::spawn_blocking(move || Dataset::load(dataset_path))
            .await
            .map_err(|e| InsightsError::Other(e.into()))??;
        info!("Loaded {} bookings", dataset.len());

        let index: Arc<dyn PassageIndex> = match index::open_index(config).await {
            Ok(index) => index,
            Err(e) => {
                warn!("Retrieval index unavailable: {}", e);
                Arc::new(UnavailableIndex::new(e.to_string()))
            }
        };

        let retriever = Retriever::from_config(config, index);
        let client = OllamaClient::new(config)?;
        let generator = AnswerGenerator::new(Arc::new(client));

        Ok(Self::new(Arc::new(dataset), retriever, generator).with_top_k(config.retrieval.top_k))
    }

    #[inline]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer a free-text question.
    ///
    /// Recognised analytics questions return their report directly. Anything
    /// else is answered from the nearest stored passages by the generator.
    #[inline]
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(InsightsError::InvalidQuery("query is empty".to_string()));
        }

        if let Some(intent) = classifier::classify(query) {
            info!("Answering with analytics: {:?}", intent);
            return self.run_intent(intent).map(Answer::Report);
        }

        debug!("No analytics intent, retrieving {} passages", self.top_k);
        let context = self.retriever.retrieve(query, self.top_k).await?;
        let answer = self
            .generator
            .generate_blocking(query, &context.context_block())
            .await;

        Ok(Answer::Text { answer })
    }

    /// Run one of the named reports, matched case-insensitively
    #[inline]
    pub fn report(&self, report_type: &str) -> Result<Report> {
        let report_type: ReportType = report_type.parse()?;
        Ok(analytics::generate_report(&self.dataset, report_type)?)
    }

    fn run_intent(&self, intent: Intent) -> Result<Report> {
        match intent {
            Intent::TotalRevenue(Some(period)) => Self::total_revenue(&self.dataset, period),
            Intent::TotalRevenue(None) => Err(InsightsError::InvalidQuery(
                "total revenue needs a month and year, e.g. 'total revenue for July 2017'"
                    .to_string(),
            )),
            Intent::CancellationRate => Ok(Report::CancellationRate(
                analytics::cancellation_rate(&self.dataset)?,
            )),
            Intent::HighestCancellations => {
                let location = analytics::highest_cancellation_location(&self.dataset)?;
                Ok(Report::HighestCancellations {
                    country: location.country,
                    cancellations: location.bookings,
                })
            }
            Intent::AveragePrice => Ok(Report::AverageRevenue(analytics::average_revenue(
                &self.dataset,
            )?)),
        }
    }

    fn total_revenue(dataset: &Dataset, period: MonthYear) -> Result<Report> {
        let month = period.month_name();
        let total = analytics::total_revenue(dataset, month, period.year)?;
        Ok(Report::TotalRevenue {
            total,
            month: month.to_string(),
            year: period.year,
        })
    }
}
