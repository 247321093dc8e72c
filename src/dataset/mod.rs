//! Booking dataset store.
//!
//! Bookings are loaded once from the cleaned hotel-bookings CSV and served as
//! an immutable snapshot. Derived columns (`total_nights`, `revenue`,
//! `arrival_date`) are always computed here and never read from input.


use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Country assigned to bookings whose source country is missing
pub const UNKNOWN_COUNTRY: &str = "Unknown";

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Source markers that pandas would have read as a missing value
const MISSING_MARKERS: [&str; 4] = ["", "NA", "NULL", "nan"];

/// Resolve a full English month name (case-insensitive) to its 1-based number.
#[inline]
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim();
    MONTH_NAMES
        .iter()
        .position(|month| month.eq_ignore_ascii_case(name))
        .map(|index| index as u32 + 1)
}

/// Canonical month name for a 1-based month number
#[inline]
pub fn month_name(number: u32) -> Option<&'static str> {
    number
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("Malformed booking at row {row}: {source}")]
    Malformed {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid arrival month '{month}' at row {row}")]
    InvalidMonth { row: usize, month: String },
    #[error("Invalid arrival date {year}-{month}-{day} at row {row}")]
    InvalidDate {
        row: usize,
        year: i32,
        month: String,
        day: u32,
    },
}

/// One row of the cleaned bookings CSV, before derived columns are computed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBooking {
    #[serde(default)]
    pub hotel: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_canceled: bool,
    pub lead_time: u32,
    pub arrival_date_year: i32,
    pub arrival_date_month: String,
    pub arrival_date_day_of_month: u32,
    pub stays_in_weekend_nights: u32,
    pub stays_in_week_nights: u32,
    pub adr: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match u8::deserialize(deserializer)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "expected 0 or 1 for cancellation flag, found {}",
            other
        ))),
    }
}

/// A single reservation with its derived columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRecord {
    hotel: String,
    is_canceled: bool,
    country: String,
    arrival_date: NaiveDate,
    lead_time: u32,
    adr: f64,
    total_nights: u32,
    revenue: f64,
    text: String,
}

impl BookingRecord {
    /// Build a record from a raw CSV row.
    ///
    /// `row` is the 1-based data row, used only for error reporting. Fails if
    /// the month name or day of month do not form a real calendar date.
    #[inline]
    pub fn from_raw(row: usize, raw: RawBooking) -> Result<Self, DatasetError> {
        let month = month_number(&raw.arrival_date_month).ok_or_else(|| {
            DatasetError::InvalidMonth {
                row,
                month: raw.arrival_date_month.clone(),
            }
        })?;

        let arrival_date =
            NaiveDate::from_ymd_opt(raw.arrival_date_year, month, raw.arrival_date_day_of_month)
                .ok_or_else(|| DatasetError::InvalidDate {
                    row,
                    year: raw.arrival_date_year,
                    month: raw.arrival_date_month.clone(),
                    day: raw.arrival_date_day_of_month,
                })?;

        let country = raw
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !MISSING_MARKERS.contains(&c.as_str()))
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        let total_nights = raw.stays_in_weekend_nights + raw.stays_in_week_nights;
        let revenue = raw.adr * f64::from(total_nights);

        let mut record = Self {
            hotel: raw.hotel,
            is_canceled: raw.is_canceled,
            country,
            arrival_date,
            lead_time: raw.lead_time,
            adr: raw.adr,
            total_nights,
            revenue,
            text: String::new(),
        };

        record.text = match raw.text {
            Some(text) if !text.trim().is_empty() => text,
            _ => record.describe(),
        };

        Ok(record)
    }

    #[inline]
    pub fn hotel(&self) -> &str {
        &self.hotel
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.is_canceled
    }

    #[inline]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[inline]
    pub fn arrival_date(&self) -> NaiveDate {
        self.arrival_date
    }

    #[inline]
    pub fn arrival_year(&self) -> i32 {
        self.arrival_date.year()
    }

    /// 1-based arrival month
    #[inline]
    pub fn arrival_month(&self) -> u32 {
        self.arrival_date.month()
    }

    /// Canonical English name of the arrival month
    #[inline]
    pub fn arrival_month_name(&self) -> &'static str {
        MONTH_NAMES[self.arrival_date.month0() as usize]
    }

    #[inline]
    pub fn lead_time(&self) -> u32 {
        self.lead_time
    }

    /// Average daily rate
    #[inline]
    pub fn adr(&self) -> f64 {
        self.adr
    }

    #[inline]
    pub fn total_nights(&self) -> u32 {
        self.total_nights
    }

    #[inline]
    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    /// Free-text passage describing the booking
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn describe(&self) -> String {
        let hotel = if self.hotel.is_empty() {
            "Hotel"
        } else {
            self.hotel.as_str()
        };
        format!(
            "{} booking from {} arriving {} for {} nights at ${:.2} per night (revenue ${:.2}), booked {} days in advance, {}.",
            hotel,
            self.country,
            self.arrival_date.format("%Y-%m-%d"),
            self.total_nights,
            self.adr,
            self.revenue,
            self.lead_time,
            if self.is_canceled {
                "canceled"
            } else {
                "not canceled"
            }
        )
    }
}

/// Read-only snapshot of every booking, in source order
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<BookingRecord>,
}

impl Dataset {
    /// Load the dataset from a cleaned bookings CSV file
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        info!("Loading bookings from {}", path.display());

        let reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let dataset = Self::from_csv(reader)?;
        info!(
            "Loaded {} bookings ({} canceled)",
            dataset.len(),
            dataset.canceled().count()
        );
        Ok(dataset)
    }

    /// Parse bookings from any CSV source with a header row
    #[inline]
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, DatasetError> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: io::Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let mut records = Vec::new();

        for (index, row) in reader.deserialize::<RawBooking>().enumerate() {
            let row_number = index + 1;
            let raw = row.map_err(|source| DatasetError::Malformed {
                row: row_number,
                source,
            })?;
            records.push(BookingRecord::from_raw(row_number, raw)?);
        }

        debug!("Parsed {} booking rows", records.len());
        Ok(Self { records })
    }

    #[inline]
    pub fn from_records(records: Vec<BookingRecord>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn records(&self) -> &[BookingRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bookings that were not canceled, in source order
    #[inline]
    pub fn non_canceled(&self) -> impl Iterator<Item = &BookingRecord> {
        self.records.iter().filter(|r| !r.is_canceled())
    }

    /// Canceled bookings, in source order
    #[inline]
    pub fn canceled(&self) -> impl Iterator<Item = &BookingRecord> {
        self.records.iter().filter(|r| r.is_canceled())
    }
}
