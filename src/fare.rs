//! Flight fares - the record type this store was built around.
//!
//! Fares are edited concurrently by back-office staff, which is why they are
//! only ever changed through version-checked updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::Searchable;
use crate::validation::{Validate, ValidationError};
use crate::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FareClass {
    Economy,
    Business,
    First,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityStatus {
    #[default]
    Available,
    #[serde(rename = "Sold Out")]
    SoldOut,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "flight_fares")]
pub struct FlightFare {
    pub flight_number: String,
    pub departure_airport_code: String,
    pub arrival_airport_code: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub airline_code: String,
    pub fare_class: FareClass,
    pub base_price: f64,
    #[serde(default)]
    pub taxes: f64,
    #[serde(default)]
    pub availability_status: AvailabilityStatus,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl FlightFare {
    /// Derived, never stored.
    pub fn total_price(&self) -> f64 {
        self.base_price + self.taxes
    }
}

fn check_flight_number(err: &mut ValidationError, value: &str) {
    err.check(!value.trim().is_empty(), "flight_number", "must not be empty");
}

fn check_airport(err: &mut ValidationError, field: &str, value: &str) {
    err.check(
        value.chars().count() == 3,
        field,
        "must be a 3-letter airport code",
    );
}

fn check_airline(err: &mut ValidationError, value: &str) {
    err.check(
        value.chars().count() >= 2,
        "airline_code",
        "must be at least 2 characters",
    );
}

fn check_prices(err: &mut ValidationError, base_price: Option<f64>, taxes: Option<f64>) {
    if let Some(base_price) = base_price {
        err.check(
            base_price.is_finite() && base_price > 0.0,
            "base_price",
            "must be positive",
        );
    }
    if let Some(taxes) = taxes {
        err.check(
            taxes.is_finite() && taxes >= 0.0,
            "taxes",
            "must not be negative",
        );
    }
}

fn check_schedule(
    err: &mut ValidationError,
    departure: Option<DateTime<Utc>>,
    arrival: Option<DateTime<Utc>>,
) {
    if let (Some(departure), Some(arrival)) = (departure, arrival) {
        err.check(
            arrival > departure,
            "arrival_time",
            "must be after departure_time",
        );
    }
}

fn check_effective(
    err: &mut ValidationError,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) {
    if let (Some(from), Some(to)) = (from, to) {
        err.check(to >= from, "effective_to", "must not be before effective_from");
    }
}

impl Validate for FlightFare {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::default();
        check_flight_number(&mut err, &self.flight_number);
        check_airport(&mut err, "departure_airport_code", &self.departure_airport_code);
        check_airport(&mut err, "arrival_airport_code", &self.arrival_airport_code);
        check_airline(&mut err, &self.airline_code);
        check_prices(&mut err, Some(self.base_price), Some(self.taxes));
        check_schedule(&mut err, Some(self.departure_time), Some(self.arrival_time));
        check_effective(&mut err, self.effective_from, self.effective_to);
        err.into_result()
    }
}

/// Only the fields present in the patch are checked; cross-field rules apply
/// when both sides are in the same patch. The merged fare is checked by
/// `VersionedRecordStore::update_validated`.
impl Validate for FlightFarePatch {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut err = ValidationError::default();
        if let Some(flight_number) = &self.flight_number {
            check_flight_number(&mut err, flight_number);
        }
        if let Some(code) = &self.departure_airport_code {
            check_airport(&mut err, "departure_airport_code", code);
        }
        if let Some(code) = &self.arrival_airport_code {
            check_airport(&mut err, "arrival_airport_code", code);
        }
        if let Some(airline) = &self.airline_code {
            check_airline(&mut err, airline);
        }
        check_prices(&mut err, self.base_price, self.taxes);
        check_schedule(&mut err, self.departure_time, self.arrival_time);
        check_effective(&mut err, self.effective_from, self.effective_to);
        err.into_result()
    }
}

/// Listing filters, decoded from `?departure=&arrival=&airline=&minPrice=...`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareQuery {
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub airline: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn contains_ignore_case(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

impl Searchable for FlightFare {
    type Query = FareQuery;

    fn matches(&self, query: &FareQuery) -> bool {
        let total = self.total_price();
        contains_ignore_case(&self.departure_airport_code, &query.departure)
            && contains_ignore_case(&self.arrival_airport_code, &query.arrival)
            && contains_ignore_case(&self.airline_code, &query.airline)
            && query.min_price.map_or(true, |min| total >= min)
            && query.max_price.map_or(true, |max| total <= max)
            && query.start_date.map_or(true, |start| self.departure_time >= start)
            && query.end_date.map_or(true, |end| self.departure_time <= end)
    }
}
