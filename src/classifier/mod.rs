//! Query classification for deterministic analytics routing.
//!
//! A query is matched against an ordered list of [`Rule`]s; the first rule
//! whose predicate accepts the lower-cased query wins. Order matters because
//! the trigger phrases can overlap within one question.


use fancy_regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::dataset::{month_name, month_number};

static MONTH_YEAR_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(\w+)\s(\d{4})")
        .inspect_err(|e| warn!("Failed to compile month/year pattern: {}", e))
        .ok()
});

/// A calendar month resolved from a query, e.g. "July 2016"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthYear {
    pub month: u32,
    pub year: i32,
}

impl MonthYear {
    /// Canonical English name of the month
    #[inline]
    pub fn month_name(&self) -> &'static str {
        month_name(self.month).unwrap_or("Unknown")
    }
}

/// Structured analytics intent recognised in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Revenue for one month. `None` when the query named no resolvable month and year.
    TotalRevenue(Option<MonthYear>),
    CancellationRate,
    HighestCancellations,
    AveragePrice,
}

/// One entry of the ordered classification table
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    trigger: &'static str,
    build: fn(&str) -> Intent,
}

impl Rule {
    /// Whether the rule fires for an already lower-cased query
    #[inline]
    pub fn matches(&self, lowered: &str) -> bool {
        lowered.contains(self.trigger)
    }

    /// Build the intent from the original (not lower-cased) query
    #[inline]
    pub fn intent(&self, query: &str) -> Intent {
        (self.build)(query)
    }
}

static RULES: [Rule; 4] = [
    Rule {
        name: "total_revenue",
        trigger: "total revenue",
        build: total_revenue_intent,
    },
    Rule {
        name: "cancellation_rate",
        trigger: "cancellation rate",
        build: |_| Intent::CancellationRate,
    },
    Rule {
        name: "highest_cancellations",
        trigger: "highest booking cancellations",
        build: |_| Intent::HighestCancellations,
    },
    Rule {
        name: "average_price",
        trigger: "average price",
        build: |_| Intent::AveragePrice,
    },
];

fn total_revenue_intent(query: &str) -> Intent {
    Intent::TotalRevenue(parse_month_year(query))
}

/// The classification table, in evaluation order
#[inline]
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// Classify a free-text query. `None` means the query should be answered by retrieval.
#[inline]
pub fn classify(query: &str) -> Option<Intent> {
    let lowered = query.to_lowercase();

    let intent = rules()
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| {
            debug!("Query matched rule '{}'", rule.name);
            rule.intent(query)
        });

    if intent.is_none() {
        debug!("Query matched no analytics rule");
    }
    intent
}

/// Extract the first `<word> <4-digit year>` pair and resolve the word as a month.
///
/// Only the first pattern match is considered. Returns `None` when there is no
/// match or the word is not a full English month name.
#[inline]
pub fn parse_month_year(query: &str) -> Option<MonthYear> {
    let pattern = MONTH_YEAR_PATTERN.as_ref()?;
    let captures = pattern.captures(query).ok().flatten()?;

    let word = captures.get(1)?.as_str();
    let year = captures.get(2)?.as_str().parse::<i32>().ok()?;

    let Some(month) = month_number(word) else {
        debug!("'{}' is not a month name", word);
        return None;
    };

    Some(MonthYear { month, year })
}
