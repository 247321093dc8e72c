//! Deterministic analytics over the booking dataset.
//!
//! Every report is recomputed from the shared [`Dataset`] snapshot on each
//! call. Reports over an empty eligible subset fail with
//! [`AnalyticsError::NoData`] instead of producing `NaN` or panicking.


use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::dataset::{BookingRecord, Dataset, month_name, month_number};

/// Number of countries returned by the top locations report
pub const TOP_LOCATIONS_LIMIT: usize = 10;

/// Number of equal-width bins in the lead time histogram
pub const LEAD_TIME_BINS: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("no data available for {0}")]
    NoData(String),
    #[error("unknown report type: {0}")]
    UnknownReport(String),
    #[error("'{0}' is not a month name")]
    InvalidMonth(String),
}

/// Reports that can be requested by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    RevenueTrends,
    CancellationRate,
    TopLocations,
    LeadTimeDistribution,
}

impl ReportType {
    pub const ALL: [Self; 4] = [
        Self::RevenueTrends,
        Self::CancellationRate,
        Self::TopLocations,
        Self::LeadTimeDistribution,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RevenueTrends => "revenue_trends",
            Self::CancellationRate => "cancellation_rate",
            Self::TopLocations => "top_locations",
            Self::LeadTimeDistribution => "lead_time_distribution",
        }
    }
}

impl FromStr for ReportType {
    type Err = AnalyticsError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|report| report.as_str() == name)
            .ok_or_else(|| AnalyticsError::UnknownReport(s.to_string()))
    }
}

impl fmt::Display for ReportType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Revenue summed over one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
}

/// Number of bookings attributed to a country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationCount {
    pub country: String,
    pub bookings: u64,
}

/// One right-closed bin `(lower, upper]` of the lead time histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeBin {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Result of an analytics computation, one variant per report shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Report {
    RevenueTrends(Vec<MonthlyRevenue>),
    CancellationRate(String),
    TopLocations(Vec<LocationCount>),
    LeadTimeDistribution(Vec<LeadTimeBin>),
    TotalRevenue {
        total: String,
        month: String,
        year: i32,
    },
    HighestCancellations {
        country: String,
        cancellations: u64,
    },
    AverageRevenue(String),
}

/// Run one of the named reports
#[inline]
pub fn generate_report(dataset: &Dataset, report_type: ReportType) -> Result<Report, AnalyticsError> {
    debug!("Generating {} report", report_type);
    match report_type {
        ReportType::RevenueTrends => revenue_trends(dataset).map(Report::RevenueTrends),
        ReportType::CancellationRate => cancellation_rate(dataset).map(Report::CancellationRate),
        ReportType::TopLocations => top_locations(dataset).map(Report::TopLocations),
        ReportType::LeadTimeDistribution => {
            lead_time_distribution(dataset).map(Report::LeadTimeDistribution)
        }
    }
}

/// Revenue of non-canceled bookings grouped by arrival month, oldest first
#[inline]
pub fn revenue_trends(dataset: &Dataset) -> Result<Vec<MonthlyRevenue>, AnalyticsError> {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for record in dataset.non_canceled() {
        let key = (record.arrival_year(), record.arrival_month());
        *by_month.entry(key).or_insert(0.0) += record.revenue();
    }

    if by_month.is_empty() {
        return Err(AnalyticsError::NoData(
            "revenue trends (no non-canceled bookings)".to_string(),
        ));
    }

    Ok(by_month
        .into_iter()
        .map(|((year, month), revenue)| MonthlyRevenue {
            year,
            month,
            revenue,
        })
        .collect())
}

/// Share of all bookings that were canceled, e.g. `"37.04%"`
#[inline]
pub fn cancellation_rate(dataset: &Dataset) -> Result<String, AnalyticsError> {
    if dataset.is_empty() {
        return Err(AnalyticsError::NoData(
            "cancellation rate (dataset is empty)".to_string(),
        ));
    }

    let canceled = dataset.canceled().count();
    let rate = canceled as f64 / dataset.len() as f64 * 100.0;
    Ok(format_percentage(rate))
}

/// The ten countries with the most non-canceled bookings.
///
/// Sorted by descending count. Countries with equal counts keep the order
/// in which they first appear in the dataset.
#[inline]
pub fn top_locations(dataset: &Dataset) -> Result<Vec<LocationCount>, AnalyticsError> {
    let mut counts = count_by_country(dataset.non_canceled());
    if counts.is_empty() {
        return Err(AnalyticsError::NoData(
            "top locations (no non-canceled bookings)".to_string(),
        ));
    }

    counts.sort_by(|a, b| b.bookings.cmp(&a.bookings));
    counts.truncate(TOP_LOCATIONS_LIMIT);
    Ok(counts)
}

/// Histogram of lead times over all bookings in [`LEAD_TIME_BINS`] equal-width bins
#[inline]
pub fn lead_time_distribution(dataset: &Dataset) -> Result<Vec<LeadTimeBin>, AnalyticsError> {
    let lead_times: Vec<f64> = dataset
        .records()
        .iter()
        .map(|r| f64::from(r.lead_time()))
        .collect();

    let Some(&first) = lead_times.first() else {
        return Err(AnalyticsError::NoData(
            "lead time distribution (dataset is empty)".to_string(),
        ));
    };

    let (min, max) = lead_times
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let edges = bin_edges(min, max, LEAD_TIME_BINS);
    let mut counts = vec![0_u64; LEAD_TIME_BINS];

    for value in lead_times {
        let index = edges[1..]
            .partition_point(|&upper| upper < value)
            .min(LEAD_TIME_BINS - 1);
        counts[index] += 1;
    }

    Ok(edges
        .windows(2)
        .zip(counts)
        .map(|(bounds, count)| LeadTimeBin {
            label: format!("({}, {}]", format_edge(bounds[0]), format_edge(bounds[1])),
            lower: bounds[0],
            upper: bounds[1],
            count,
        })
        .collect())
}

/// Revenue of non-canceled bookings arriving in the given month and year, e.g. `"$425.00"`
#[inline]
pub fn total_revenue(
    dataset: &Dataset,
    month: &str,
    year: i32,
) -> Result<String, AnalyticsError> {
    let month_number =
        month_number(month).ok_or_else(|| AnalyticsError::InvalidMonth(month.to_string()))?;
    let canonical = month_name(month_number).unwrap_or(month);

    let mut matched = 0_usize;
    let mut total = 0.0;
    for record in dataset
        .non_canceled()
        .filter(|r| r.arrival_year() == year && r.arrival_month() == month_number)
    {
        matched += 1;
        total += record.revenue();
    }

    debug!(
        "Total revenue for {} {} over {} bookings",
        canonical, year, matched
    );

    if matched == 0 {
        return Err(AnalyticsError::NoData(format!(
            "total revenue (no non-canceled bookings in {} {})",
            canonical, year
        )));
    }

    Ok(format_currency(total))
}

/// Country with the most canceled bookings, and that count.
///
/// When several countries share the maximum, the one whose first canceled
/// booking appears earliest in the dataset wins.
#[inline]
pub fn highest_cancellation_location(
    dataset: &Dataset,
) -> Result<LocationCount, AnalyticsError> {
    count_by_country(dataset.canceled())
        .into_iter()
        .reduce(|best, candidate| {
            if candidate.bookings > best.bookings {
                candidate
            } else {
                best
            }
        })
        .ok_or_else(|| {
            AnalyticsError::NoData("highest cancellations (no canceled bookings)".to_string())
        })
}

/// Mean revenue per non-canceled booking, e.g. `"$312.40"`
#[inline]
pub fn average_revenue(dataset: &Dataset) -> Result<String, AnalyticsError> {
    let (count, total) = dataset
        .non_canceled()
        .fold((0_usize, 0.0), |(count, total), r| (count + 1, total + r.revenue()));

    if count == 0 {
        return Err(AnalyticsError::NoData(
            "average revenue (no non-canceled bookings)".to_string(),
        ));
    }

    Ok(format_currency(total / count as f64))
}

#[inline]
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

#[inline]
pub fn format_percentage(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Count bookings per country, in order of first appearance
fn count_by_country<'a>(records: impl Iterator<Item = &'a BookingRecord>) -> Vec<LocationCount> {
    let mut counts: Vec<LocationCount> = Vec::new();
    let mut positions: HashMap<&'a str, usize> = HashMap::new();

    for record in records {
        if let Some(&position) = positions.get(record.country()) {
            counts[position].bookings += 1;
        } else {
            positions.insert(record.country(), counts.len());
            counts.push(LocationCount {
                country: record.country().to_string(),
                bookings: 1,
            });
        }
    }

    counts
}

/// `bins + 1` edges spanning `[min, max]`.
///
/// The lowest edge is pushed down by 0.1% of the range so the minimum lands
/// in the first right-closed bin. A zero-width range is widened by 0.1% of
/// its magnitude on both sides.
fn bin_edges(min: f64, max: f64, bins: usize) -> Vec<f64> {
    let (lo, hi, degenerate) = if (max - min).abs() < f64::EPSILON {
        let adjust = if min == 0.0 { 0.001 } else { 0.001 * min.abs() };
        (min - adjust, max + adjust, true)
    } else {
        (min, max, false)
    };

    let width = hi - lo;
    let mut edges: Vec<f64> = (0..=bins)
        .map(|i| {
            if i == bins {
                hi
            } else {
                lo + width * i as f64 / bins as f64
            }
        })
        .collect();

    if !degenerate {
        edges[0] -= width * 0.001;
    }
    edges
}

fn format_edge(value: f64) -> String {
    let text = format!("{:.3}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
